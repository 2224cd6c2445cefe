//! Confetti bursts for correct answers. One shared simulation holds the
//! particles of every in-flight burst; the host steps it once per frame and
//! stops asking once the field is empty.

use crate::model::Region;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Particles spawned per burst.
pub const BURST_COUNT: usize = 60;

/// Downward acceleration applied to vertical velocity each frame.
const GRAVITY: f64 = 0.15;

const PALETTE: [&str; 6] = [
    "#48bb78", "#d4a853", "#e8553d", "#4a9ead", "#f0ece4", "#f6e05e",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleShape {
    Rect,
    Circle,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub size: f64,
    pub color: &'static str,
    /// Doubles as opacity; the particle dies when it reaches zero.
    pub life: f64,
    pub decay: f64,
    pub rotation: f64,
    pub rotation_speed: f64,
    pub shape: ParticleShape,
}

/// Pixel dimensions of the rendering surface; regions are converted from
/// percentage space against this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

pub struct ParticleField {
    particles: Vec<Particle>,
    rng: StdRng,
}

impl Default for ParticleField {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleField {
    pub fn new() -> Self {
        Self {
            particles: Vec::new(),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic field for tests.
    pub fn seeded(seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Spawns one burst at the pixel-space center of `region`. Bursts may
    /// overlap; all particles share this field.
    pub fn burst(&mut self, region: &Region, surface: SurfaceSize) {
        let cx = (region.x + region.w / 2.0) / 100.0 * surface.width;
        let cy = (region.y + region.h / 2.0) / 100.0 * surface.height;

        for _ in 0..BURST_COUNT {
            let angle = self.rng.random_range(0.0..std::f64::consts::TAU);
            let speed = self.rng.random_range(2.0..8.0);
            self.particles.push(Particle {
                x: cx,
                y: cy,
                vx: angle.cos() * speed,
                // Upward bias so bursts fountain before gravity wins.
                vy: angle.sin() * speed - 2.0,
                size: self.rng.random_range(3.0..8.0),
                color: PALETTE[self.rng.random_range(0..PALETTE.len())],
                life: 1.0,
                decay: self.rng.random_range(0.015..0.035),
                rotation: self.rng.random_range(0.0..360.0),
                rotation_speed: (self.rng.random::<f64>() - 0.5) * 10.0,
                shape: if self.rng.random::<bool>() {
                    ParticleShape::Rect
                } else {
                    ParticleShape::Circle
                },
            });
        }
    }

    /// Advances the simulation one frame and drops expired particles.
    pub fn step(&mut self) {
        for p in &mut self.particles {
            p.x += p.vx;
            p.y += p.vy;
            p.vy += GRAVITY;
            p.life -= p.decay;
            p.rotation += p.rotation_speed;
        }
        self.particles.retain(|p| p.life > 0.0);
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    /// The host stops its frame loop when this returns true.
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }
}
