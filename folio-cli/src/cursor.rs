/// Visual state of the cursor ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorVariant {
    Default,
    Hover,
    Click,
    MusicPulse,
}

impl CursorVariant {
    /// Click wins over hover, hover over the idle pulse of music mode.
    pub fn resolve(clicked: bool, hovering: bool, music_mode: bool) -> Self {
        if clicked {
            CursorVariant::Click
        } else if hovering {
            CursorVariant::Hover
        } else if music_mode {
            CursorVariant::MusicPulse
        } else {
            CursorVariant::Default
        }
    }

    pub fn ring_diameter(self) -> f32 {
        match self {
            CursorVariant::Default => 24.0,
            CursorVariant::Hover => 64.0,
            CursorVariant::Click => 40.0 * 1.35,
            CursorVariant::MusicPulse => 32.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub stiffness: f32,
    pub damping: f32,
    pub mass: f32,
}

impl Default for Spring {
    fn default() -> Self {
        Self {
            stiffness: 300.0,
            damping: 20.0,
            mass: 0.5,
        }
    }
}

/// Inner dot that sits on the pointer and an outer ring trailing it on a
/// damped spring.
#[derive(Debug, Clone)]
pub struct CursorTrail {
    spring: Spring,
    dot: (f32, f32),
    ring: (f32, f32),
    velocity: (f32, f32),
    clicked: bool,
    hovering: bool,
    music_mode: bool,
    visible: bool,
}

impl CursorTrail {
    pub fn new(spring: Spring) -> Self {
        Self {
            spring,
            dot: (0.0, 0.0),
            ring: (0.0, 0.0),
            velocity: (0.0, 0.0),
            clicked: false,
            hovering: false,
            music_mode: false,
            visible: false,
        }
    }

    pub fn dot(&self) -> (f32, f32) {
        self.dot
    }

    pub fn ring(&self) -> (f32, f32) {
        self.ring
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn variant(&self) -> CursorVariant {
        CursorVariant::resolve(self.clicked, self.hovering, self.music_mode)
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        if !self.visible {
            // First sighting: no trail from the origin.
            self.ring = (x, y);
            self.velocity = (0.0, 0.0);
        }
        self.dot = (x, y);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn set_clicked(&mut self, clicked: bool) {
        self.clicked = clicked;
    }

    pub fn set_hovering(&mut self, hovering: bool) {
        self.hovering = hovering;
    }

    pub fn set_music_mode(&mut self, music_mode: bool) {
        self.music_mode = music_mode;
    }

    /// Integrates the ring spring over `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        // Fixed substeps keep the trail independent of the frame rate.
        const MAX_STEP: f32 = 0.002;
        let mut remaining = dt.max(0.0);
        while remaining > 0.0 {
            let h = remaining.min(MAX_STEP);
            self.integrate(h);
            remaining -= h;
        }
    }

    fn integrate(&mut self, h: f32) {
        let Spring {
            stiffness,
            damping,
            mass,
        } = self.spring;
        let ax = (-stiffness * (self.ring.0 - self.dot.0) - damping * self.velocity.0) / mass;
        let ay = (-stiffness * (self.ring.1 - self.dot.1) - damping * self.velocity.1) / mass;
        self.velocity.0 += ax * h;
        self.velocity.1 += ay * h;
        self.ring.0 += self.velocity.0 * h;
        self.ring.1 += self.velocity.1 * h;
    }
}

impl Default for CursorTrail {
    fn default() -> Self {
        Self::new(Spring::default())
    }
}
