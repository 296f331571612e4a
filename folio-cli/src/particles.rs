//! Decorative particle field: points drift toward the pointer when it is
//! close, spring back to their home position otherwise, and are linked to
//! nearby neighbours.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldConfig {
    /// Square units of surface per particle; sets the particle count.
    pub area_per_particle: f32,
    pub link_distance: f32,
    pub pointer_radius: f32,
    /// Pull toward the pointer at zero distance, per frame.
    pub follow_strength: f32,
    /// Pull back toward the home position, per frame.
    pub return_strength: f32,
    pub damping: f32,
    pub max_speed: f32,
    pub color: (u8, u8, u8),
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            area_per_particle: 15_000.0,
            link_distance: 120.0,
            pointer_radius: 150.0,
            follow_strength: 0.6,
            return_strength: 0.02,
            damping: 0.9,
            max_speed: 4.0,
            color: (0, 200, 255),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub home_x: f32,
    pub home_y: f32,
    pub vx: f32,
    pub vy: f32,
    /// 1..=31; heavier particles react more strongly to the pointer.
    pub weight: f32,
}

impl Particle {
    pub fn speed(&self) -> f32 {
        self.vx.hypot(self.vy)
    }
}

/// Segment between two particles (or a particle and the pointer), with an
/// opacity that fades to zero at the cut-off distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub from: (f32, f32),
    pub to: (f32, f32),
    pub alpha: f32,
}

pub struct ParticleField {
    config: FieldConfig,
    width: f32,
    height: f32,
    particles: Vec<Particle>,
    pointer: Option<(f32, f32)>,
    rng: StdRng,
}

impl ParticleField {
    pub fn new(config: FieldConfig, width: f32, height: f32) -> Self {
        Self::with_rng(config, width, height, StdRng::from_os_rng())
    }

    pub fn seeded(config: FieldConfig, width: f32, height: f32, seed: u64) -> Self {
        Self::with_rng(config, width, height, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: FieldConfig, width: f32, height: f32, rng: StdRng) -> Self {
        let mut field = Self {
            config,
            width,
            height,
            particles: Vec::new(),
            pointer: None,
            rng,
        };
        field.populate();
        field
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn pointer(&self) -> Option<(f32, f32)> {
        self.pointer
    }

    fn populate(&mut self) {
        let area = (self.width.max(0.0) * self.height.max(0.0)) as f64;
        let count = (area / self.config.area_per_particle.max(1.0) as f64).ceil() as usize;

        self.particles.clear();
        self.particles.reserve(count);
        for _ in 0..count {
            let x = self.rng.random::<f32>() * self.width;
            let y = self.rng.random::<f32>() * self.height;
            self.particles.push(Particle {
                x,
                y,
                home_x: x,
                home_y: y,
                vx: 0.0,
                vy: 0.0,
                weight: self.rng.random_range(1.0..31.0),
            });
        }
    }

    /// Re-seeds the field for a new surface size.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.populate();
    }

    pub fn set_pointer(&mut self, x: f32, y: f32) {
        self.pointer = Some((x, y));
    }

    pub fn clear_pointer(&mut self) {
        self.pointer = None;
    }

    /// Advances every particle by one frame.
    pub fn step(&mut self) {
        let config = self.config;
        let pointer = self.pointer;
        let (width, height) = (self.width, self.height);

        for p in &mut self.particles {
            let pull = pointer.and_then(|(px, py)| {
                let (dx, dy) = (px - p.x, py - p.y);
                let distance = dx.hypot(dy);
                (distance < config.pointer_radius && distance > f32::EPSILON).then(|| {
                    let falloff = 1.0 - distance / config.pointer_radius;
                    let strength = config.follow_strength * falloff * (p.weight / 31.0);
                    (dx / distance * strength, dy / distance * strength)
                })
            });

            let (ax, ay) = pull.unwrap_or((
                (p.home_x - p.x) * config.return_strength,
                (p.home_y - p.y) * config.return_strength,
            ));

            p.vx = (p.vx + ax) * config.damping;
            p.vy = (p.vy + ay) * config.damping;

            let speed = p.speed();
            if speed > config.max_speed {
                let scale = config.max_speed / speed;
                p.vx *= scale;
                p.vy *= scale;
            }

            p.x = (p.x + p.vx).clamp(0.0, width);
            p.y = (p.y + p.vy).clamp(0.0, height);
        }
    }

    pub fn links(&self) -> Vec<Link> {
        let max = self.config.link_distance;
        let mut links = Vec::new();
        for (i, a) in self.particles.iter().enumerate() {
            for b in &self.particles[i + 1..] {
                let distance = (a.x - b.x).hypot(a.y - b.y);
                if distance < max {
                    links.push(Link {
                        from: (a.x, a.y),
                        to: (b.x, b.y),
                        alpha: 1.0 - distance / max,
                    });
                }
            }
        }
        links
    }

    pub fn pointer_links(&self) -> Vec<Link> {
        let Some((px, py)) = self.pointer else {
            return Vec::new();
        };
        let radius = self.config.pointer_radius;
        self.particles
            .iter()
            .filter_map(|p| {
                let distance = (px - p.x).hypot(py - p.y);
                (distance < radius).then(|| Link {
                    from: (p.x, p.y),
                    to: (px, py),
                    alpha: 1.0 - distance / radius,
                })
            })
            .collect()
    }
}
