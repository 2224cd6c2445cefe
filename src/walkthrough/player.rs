//! Playback controller for one walkthrough session. All state lives on the
//! `Player` instance; nothing is ambient, so several sessions can coexist
//! and tests can drive the clock by hand.
//!
//! The controller never touches timers or audio itself. Mutations enqueue
//! [`PlayerCommand`]s for the host to execute, and the host reports time
//! (`tick`) and narration completion back in. Both advancement paths, the
//! fixed no-voice delay and the narration-completion pause, funnel through
//! the single `advance` slot, which is what guarantees at most one pending
//! advance at any moment.

use crate::model::{Region, Step};
use anyhow::{bail, Result};

/// Pause between a step becoming active and its celebration burst.
pub const CELEBRATION_DELAY_MS: u64 = 400;
/// Breathing room after narration ends before autoplay moves on.
pub const INTER_STEP_PAUSE_MS: u64 = 800;
/// Time on each step when autoplay runs without narration.
pub const STEP_DELAY_MS: u64 = 1500;

/// Side effects requested by the controller, drained and executed by the
/// host. Order within one drain is significant: narration is stopped and the
/// new step fully rendered before any `Speak` is issued.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    StopNarration,
    Render { index: usize },
    Speak { text: String },
    Celebrate { region: Region },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AdvanceKind {
    /// 800 ms pause, then step forward.
    InterStepPause,
    /// 1500 ms dwell on the current step, then begin the pause.
    NoVoiceDelay,
}

#[derive(Debug, Clone, Copy)]
struct Advance {
    due_ms: u64,
    kind: AdvanceKind,
}

#[derive(Debug, Clone, Copy)]
struct PendingBurst {
    due_ms: u64,
    region: Region,
}

pub struct Player {
    steps: Vec<Step>,
    loaded: bool,
    current: usize,
    auto_playing: bool,
    voice_enabled: bool,
    advance: Option<Advance>,
    bursts: Vec<PendingBurst>,
    commands: Vec<PlayerCommand>,
}

impl Default for Player {
    fn default() -> Self {
        Self::new()
    }
}

impl Player {
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            loaded: false,
            current: 0,
            auto_playing: false,
            voice_enabled: true,
            advance: None,
            bursts: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Installs a step sequence and activates the first step. An empty
    /// sequence is a load failure the shell should surface; the player
    /// itself stays usable.
    pub fn load(&mut self, steps: Vec<Step>, now_ms: u64) -> Result<()> {
        if steps.is_empty() {
            bail!("analysis has no steps");
        }

        self.steps = steps;
        self.loaded = true;
        self.current = 0;
        self.auto_playing = false;
        self.advance = None;
        self.bursts.clear();
        self.commands.clear();

        self.go_to_step(0, now_ms);
        Ok(())
    }

    /// Jumps to step `index`. Out-of-range indices are ignored. Cancels the
    /// pending advance and any in-progress narration first, re-renders, then
    /// queues celebration and narration for the new step.
    pub fn go_to_step(&mut self, index: usize, now_ms: u64) {
        if !self.loaded || index >= self.steps.len() {
            return;
        }

        self.advance = None;
        self.commands.push(PlayerCommand::StopNarration);

        self.current = index;
        self.commands.push(PlayerCommand::Render { index });

        let step = &self.steps[index];
        if step.celebrate {
            self.bursts.push(PendingBurst {
                due_ms: now_ms + CELEBRATION_DELAY_MS,
                region: step.region,
            });
        }

        if self.voice_enabled {
            self.commands.push(PlayerCommand::Speak {
                text: step.narration.clone(),
            });
        }
    }

    pub fn next_step(&mut self, now_ms: u64) {
        if self.loaded && self.current + 1 < self.steps.len() {
            self.go_to_step(self.current + 1, now_ms);
        }
    }

    pub fn prev_step(&mut self, now_ms: u64) {
        if self.loaded && self.current > 0 {
            self.go_to_step(self.current - 1, now_ms);
        }
    }

    /// Turns autoplay on. With narration enabled, advancement rides on
    /// narration completion; otherwise a fixed dwell timer is armed. Calling
    /// this while already running does not re-arm the timer.
    pub fn start_auto_play(&mut self, now_ms: u64) {
        self.auto_playing = true;
        if !self.voice_enabled && self.advance.is_none() {
            self.advance = Some(Advance {
                due_ms: now_ms + STEP_DELAY_MS,
                kind: AdvanceKind::NoVoiceDelay,
            });
        }
    }

    /// Turns autoplay off, disarms the advance timer and silences narration.
    pub fn stop_auto_play(&mut self) {
        self.auto_playing = false;
        self.advance = None;
        self.commands.push(PlayerCommand::StopNarration);
    }

    /// Host callback for the end of a step's narration (natural end, error
    /// recovery, or backend-unsupported completion all look the same here).
    pub fn narration_finished(&mut self, now_ms: u64) {
        if !self.auto_playing {
            return;
        }
        if self.current + 1 < self.steps.len() {
            self.advance = Some(Advance {
                due_ms: now_ms + INTER_STEP_PAUSE_MS,
                kind: AdvanceKind::InterStepPause,
            });
        } else {
            self.stop_auto_play();
        }
    }

    /// Flips the narration toggle. Switching voice off while autoplay is
    /// narration-driven would otherwise strand the session, so the fixed
    /// dwell timer takes over.
    pub fn set_voice_enabled(&mut self, enabled: bool, now_ms: u64) {
        if self.voice_enabled == enabled {
            return;
        }
        self.voice_enabled = enabled;
        if !enabled {
            self.commands.push(PlayerCommand::StopNarration);
            if self.auto_playing && self.advance.is_none() {
                self.advance = Some(Advance {
                    due_ms: now_ms + STEP_DELAY_MS,
                    kind: AdvanceKind::NoVoiceDelay,
                });
            }
        }
    }

    pub fn toggle_voice(&mut self, now_ms: u64) -> bool {
        self.set_voice_enabled(!self.voice_enabled, now_ms);
        self.voice_enabled
    }

    /// Fires whatever is due at `now_ms`: at most one advance, plus any
    /// celebration bursts. Celebrations are fire-and-forget; navigation does
    /// not cancel them.
    pub fn tick(&mut self, now_ms: u64) {
        if let Some(advance) = self.advance {
            if now_ms >= advance.due_ms {
                self.advance = None;
                match advance.kind {
                    AdvanceKind::InterStepPause => {
                        let next = self.current + 1;
                        self.go_to_step(next, now_ms);
                        if self.auto_playing && !self.voice_enabled {
                            self.advance = Some(Advance {
                                due_ms: now_ms + STEP_DELAY_MS,
                                kind: AdvanceKind::NoVoiceDelay,
                            });
                        }
                    }
                    AdvanceKind::NoVoiceDelay => {
                        if self.current + 1 < self.steps.len() {
                            self.advance = Some(Advance {
                                due_ms: now_ms + INTER_STEP_PAUSE_MS,
                                kind: AdvanceKind::InterStepPause,
                            });
                        } else {
                            self.stop_auto_play();
                        }
                    }
                }
            }
        }

        let mut i = 0;
        while i < self.bursts.len() {
            if now_ms >= self.bursts[i].due_ms {
                let burst = self.bursts.remove(i);
                self.commands.push(PlayerCommand::Celebrate {
                    region: burst.region,
                });
            } else {
                i += 1;
            }
        }
    }

    /// Earliest instant the host must call [`tick`](Self::tick) again, if any.
    pub fn next_deadline(&self) -> Option<u64> {
        let advance = self.advance.map(|a| a.due_ms);
        let burst = self.bursts.iter().map(|b| b.due_ms).min();
        match (advance, burst) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn drain_commands(&mut self) -> Vec<PlayerCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn current_index(&self) -> Option<usize> {
        self.loaded.then_some(self.current)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.loaded.then(|| &self.steps[self.current])
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn is_auto_playing(&self) -> bool {
        self.auto_playing
    }

    pub fn is_voice_enabled(&self) -> bool {
        self.voice_enabled
    }
}
