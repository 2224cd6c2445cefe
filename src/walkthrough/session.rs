//! Async host for one walkthrough. Owns the playback controller, the
//! narrator and the particle field, and turns controller commands into
//! scene updates, narration futures and bursts. Timer-driven and
//! narration-driven advancement both come back through the same wakeup
//! loop, so the controller's cancellation rules hold for either path.

use super::celebration::{Particle, ParticleField, SurfaceSize};
use super::narration::Narrator;
use super::overlay::{self, OverlayScene};
use super::player::{Player, PlayerCommand};
use super::timeline::{self, TimelineScene};
use crate::model::Step;
use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Rendering surface provided by the embedding shell. Implementations are
/// free to ignore callbacks; a missing target degrades to [`NullView`].
pub trait WalkthroughView: Send {
    fn render_overlay(&mut self, scene: &OverlayScene);
    fn render_timeline(&mut self, scene: &TimelineScene);
    fn show_step(&mut self, step: &Step, index: usize, total: usize);
    fn celebration_frame(&mut self, particles: &[Particle]);
}

/// No-op target; rendering degrades gracefully when nothing is attached.
pub struct NullView;

impl WalkthroughView for NullView {
    fn render_overlay(&mut self, _scene: &OverlayScene) {}
    fn render_timeline(&mut self, _scene: &TimelineScene) {}
    fn show_step(&mut self, _step: &Step, _index: usize, _total: usize) {}
    fn celebration_frame(&mut self, _particles: &[Particle]) {}
}

/// Text rendering for terminal playback.
pub struct ConsoleView;

impl WalkthroughView for ConsoleView {
    fn render_overlay(&mut self, _scene: &OverlayScene) {}

    fn render_timeline(&mut self, _scene: &TimelineScene) {}

    fn show_step(&mut self, step: &Step, index: usize, total: usize) {
        println!(
            "[{}/{} {:>3}%] {}",
            index + 1,
            total,
            timeline::progress(total, index),
            step.label,
        );
        if !step.narration.is_empty() {
            println!("        {}", step.narration);
        }
    }

    fn celebration_frame(&mut self, _particles: &[Particle]) {}
}

type NarrationFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

enum Wakeup {
    NarrationDone,
    Timer,
}

pub struct Session {
    player: Player,
    narrator: Arc<Narrator>,
    particles: ParticleField,
    surface: SurfaceSize,
    view: Box<dyn WalkthroughView>,
    origin: Instant,
    narration: Option<NarrationFuture>,
}

impl Session {
    pub fn new(narrator: Arc<Narrator>, view: Box<dyn WalkthroughView>, surface: SurfaceSize) -> Self {
        let mut player = Player::new();
        player.set_voice_enabled(narrator.is_enabled(), 0);
        player.drain_commands();
        Self {
            player,
            narrator,
            particles: ParticleField::new(),
            surface,
            view,
            origin: Instant::now(),
            narration: None,
        }
    }

    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    /// Loads the step sequence and activates the first step. Fails on an
    /// empty sequence; the shell shows its error screen for that.
    pub fn load(&mut self, steps: Vec<Step>) -> Result<()> {
        let now = self.now_ms();
        self.player.load(steps, now)?;
        self.pump();
        Ok(())
    }

    /// Manual jump (timeline or overlay click). Manual navigation always
    /// wins over autoplay, so autoplay stops before the jump.
    pub fn go_to_step(&mut self, index: usize) {
        self.player.stop_auto_play();
        self.player.go_to_step(index, self.now_ms());
        self.pump();
    }

    pub fn next_step(&mut self) {
        self.player.stop_auto_play();
        self.player.next_step(self.now_ms());
        self.pump();
    }

    pub fn prev_step(&mut self) {
        self.player.stop_auto_play();
        self.player.prev_step(self.now_ms());
        self.pump();
    }

    pub fn start_auto_play(&mut self) {
        self.player.start_auto_play(self.now_ms());
        self.pump();
    }

    pub fn stop_auto_play(&mut self) {
        self.player.stop_auto_play();
        self.pump();
    }

    pub fn toggle_voice(&mut self) -> bool {
        let enabled = self.narrator.toggle();
        self.player.set_voice_enabled(enabled, self.now_ms());
        self.pump();
        enabled
    }

    pub fn is_auto_playing(&self) -> bool {
        self.player.is_auto_playing()
    }

    pub fn is_voice_enabled(&self) -> bool {
        self.player.is_voice_enabled()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.player.current_index()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.player.current_step()
    }

    pub fn steps(&self) -> &[Step] {
        self.player.steps()
    }

    /// Runs autoplay until it stops on the last step, then drains remaining
    /// celebration frames.
    pub async fn run_auto_play(&mut self) -> Result<()> {
        self.player.start_auto_play(self.now_ms());
        self.pump();

        loop {
            let mut wake: Option<Instant> = self
                .player
                .next_deadline()
                .map(|ms| self.origin + Duration::from_millis(ms));
            if !self.particles.is_empty() {
                let frame = Instant::now() + FRAME_INTERVAL;
                wake = Some(wake.map_or(frame, |w| w.min(frame)));
            }

            if wake.is_none() && self.narration.is_none() {
                break;
            }
            let wake_at = wake.unwrap_or_else(Instant::now);

            let has_narration = self.narration.is_some();
            let narration = &mut self.narration;
            let event = tokio::select! {
                _ = async { narration.as_mut().expect("guarded by branch condition").await },
                    if has_narration => Wakeup::NarrationDone,
                _ = tokio::time::sleep_until(wake_at), if wake.is_some() => Wakeup::Timer,
            };

            match event {
                Wakeup::NarrationDone => {
                    self.narration = None;
                    let now = self.now_ms();
                    self.player.narration_finished(now);
                }
                Wakeup::Timer => {
                    let now = self.now_ms();
                    self.player.tick(now);
                    if !self.particles.is_empty() {
                        self.particles.step();
                        self.view.celebration_frame(self.particles.particles());
                    }
                }
            }
            self.pump();
        }

        Ok(())
    }

    /// Executes queued controller commands in order. Rendering for a step
    /// always completes here before its narration future is created.
    fn pump(&mut self) {
        for command in self.player.drain_commands() {
            match command {
                PlayerCommand::StopNarration => self.halt_narration(),
                PlayerCommand::Render { index } => {
                    let steps = self.player.steps();
                    let overlay_scene = overlay::render(steps, index);
                    let timeline_scene = timeline::render(steps, index);
                    self.view.render_overlay(&overlay_scene);
                    self.view.render_timeline(&timeline_scene);
                    if let Some(step) = steps.get(index) {
                        self.view.show_step(step, index, steps.len());
                    }
                }
                PlayerCommand::Speak { text } => {
                    self.halt_narration();
                    let narrator = self.narrator.clone();
                    self.narration = Some(Box::pin(async move {
                        narrator.speak(&text).await;
                    }));
                }
                PlayerCommand::Celebrate { region } => {
                    self.particles.burst(&region, self.surface);
                }
            }
        }
    }

    /// Cancels in-flight narration by dropping its future; a cancelled call
    /// never reports completion.
    fn halt_narration(&mut self) {
        if self.narration.take().is_some() {
            self.narrator.stop();
        }
    }
}
