/// Seconds counted down before a countdown-started gesture begins.
pub const COUNTDOWN_SECONDS: u32 = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum CountdownTick<T> {
    Remaining(u32),
    /// Carries the pending payload. Produced exactly once per countdown.
    Finished(T),
    Idle,
}

/// `idle -> counting(n) -> idle`, one step per tick. Holds the request that will
/// run once the count reaches zero.
#[derive(Debug, Clone)]
pub struct CountdownScheduler<T> {
    start_count: u32,
    remaining: u32,
    pending: Option<T>,
}

impl<T> Default for CountdownScheduler<T> {
    fn default() -> Self {
        Self::new(COUNTDOWN_SECONDS)
    }
}

impl<T> CountdownScheduler<T> {
    pub fn new(start_count: u32) -> Self {
        Self {
            start_count: start_count.max(1),
            remaining: 0,
            pending: None,
        }
    }

    /// Starts (or restarts) from the fixed count. Returns the pending payload it replaced.
    pub fn start(&mut self, payload: T) -> Option<T> {
        self.remaining = self.start_count;
        self.pending.replace(payload)
    }

    pub fn tick(&mut self) -> CountdownTick<T> {
        if !self.is_counting() {
            return CountdownTick::Idle;
        }
        self.remaining -= 1;
        if self.remaining > 0 {
            return CountdownTick::Remaining(self.remaining);
        }
        match self.pending.take() {
            Some(payload) => CountdownTick::Finished(payload),
            None => CountdownTick::Idle,
        }
    }

    /// Interrupts the countdown without completing it.
    pub fn cancel(&mut self) -> Option<T> {
        self.remaining = 0;
        self.pending.take()
    }

    pub fn is_counting(&self) -> bool {
        self.remaining > 0 && self.pending.is_some()
    }

    pub fn remaining(&self) -> u32 {
        if self.is_counting() {
            self.remaining
        } else {
            0
        }
    }

    pub fn pending(&self) -> Option<&T> {
        self.pending.as_ref()
    }
}
