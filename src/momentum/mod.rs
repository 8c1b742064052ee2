//! Inertial tail that follows a released (cancelled) ramp.
//!
//! The tail starts at `release_speed * RELEASE_FRICTION` and decays exponentially
//! over `TAIL_TICKS` ticks, ending at exactly `base_speed * e^(-DECAY_RATE)`.

/// Speed lost at the moment of release.
pub const RELEASE_FRICTION: f64 = 0.8;
pub const DECAY_RATE: f64 = 3.0;
pub const TAIL_TICKS: u32 = 30;
pub const DEFAULT_MOMENTUM_THRESHOLD: f64 = 0.1;

/// Whether a ramp cancelled at `speed` is fast enough to leave a tail.
pub fn qualifies(speed: f64, threshold: f64) -> bool {
    speed.abs() > threshold
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumStep {
    /// Zero-based tail tick, always below `TAIL_TICKS`.
    pub index: u32,
    pub speed: f64,
    pub is_last: bool,
}

#[derive(Debug, Clone)]
pub struct MomentumTail {
    base_speed: f64,
    emitted: u32,
}

impl MomentumTail {
    pub fn new(release_speed: f64) -> Self {
        Self {
            base_speed: release_speed * RELEASE_FRICTION,
            emitted: 0,
        }
    }

    pub fn base_speed(&self) -> f64 {
        self.base_speed
    }

    pub fn decay_factor(tick: u32) -> f64 {
        (-DECAY_RATE * tick as f64 / TAIL_TICKS as f64).exp()
    }

    pub fn is_finished(&self) -> bool {
        self.emitted >= TAIL_TICKS
    }
}

impl Iterator for MomentumTail {
    type Item = MomentumStep;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_finished() {
            return None;
        }
        let index = self.emitted;
        self.emitted += 1;
        // The release event already carried factor 1, so tail ticks start one step in.
        let speed = self.base_speed * Self::decay_factor(index + 1);
        Some(MomentumStep {
            index,
            speed,
            is_last: self.emitted == TAIL_TICKS,
        })
    }
}
