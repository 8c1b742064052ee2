use crate::injection::{MomentumPhase, ScrollEvent, ScrollPhase};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GesturePhase {
    #[default]
    Idle,
    CountingDown,
    Ramping,
    Decaying,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition {
        from: GesturePhase,
        action: &'static str,
    },
}

/// Gesture lifecycle. Each transition returns the events the OS expects for it.
#[derive(Debug, Clone, Default)]
pub struct PhaseStateMachine {
    phase: GesturePhase,
}

impl PhaseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> GesturePhase {
        self.phase
    }

    pub fn begin_countdown(&mut self) -> Result<(), PhaseError> {
        self.require(&[GesturePhase::Idle, GesturePhase::CountingDown], "begin countdown")?;
        self.phase = GesturePhase::CountingDown;
        Ok(())
    }

    pub fn abort_countdown(&mut self) -> Result<(), PhaseError> {
        self.require(&[GesturePhase::CountingDown], "abort countdown")?;
        self.phase = GesturePhase::Idle;
        Ok(())
    }

    pub fn begin_ramp(&mut self, start_speed: f64) -> Result<[ScrollEvent; 2], PhaseError> {
        self.require(&[GesturePhase::Idle, GesturePhase::CountingDown], "begin ramp")?;
        self.phase = GesturePhase::Ramping;
        Ok([
            ScrollEvent::new(start_speed, ScrollPhase::Initial, MomentumPhase::None),
            ScrollEvent::new(start_speed, ScrollPhase::Began, MomentumPhase::None),
        ])
    }

    pub fn ramp_tick(&mut self, speed: f64) -> Result<ScrollEvent, PhaseError> {
        self.require(&[GesturePhase::Ramping], "advance ramp")?;
        Ok(ScrollEvent::new(
            speed,
            ScrollPhase::Changed,
            MomentumPhase::None,
        ))
    }

    /// Natural completion. Never followed by momentum.
    pub fn complete_ramp(&mut self) -> Result<ScrollEvent, PhaseError> {
        self.require(&[GesturePhase::Ramping], "complete ramp")?;
        self.phase = GesturePhase::Idle;
        Ok(ScrollEvent::new(0.0, ScrollPhase::Ended, MomentumPhase::None))
    }

    /// External stop mid-ramp. With `momentum_base` set, the tail's release event
    /// follows the cancel event and the machine moves to `Decaying`.
    pub fn cancel_ramp(
        &mut self,
        speed: f64,
        momentum_base: Option<f64>,
    ) -> Result<Vec<ScrollEvent>, PhaseError> {
        self.require(&[GesturePhase::Ramping], "cancel ramp")?;
        let mut events = vec![ScrollEvent::new(
            speed,
            ScrollPhase::Cancel,
            MomentumPhase::None,
        )];
        match momentum_base {
            Some(base) => {
                events.push(ScrollEvent::new(
                    base,
                    ScrollPhase::Ended,
                    MomentumPhase::Began,
                ));
                self.phase = GesturePhase::Decaying;
            }
            None => self.phase = GesturePhase::Idle,
        }
        Ok(events)
    }

    pub fn momentum_tick(&mut self, speed: f64, is_last: bool) -> Result<ScrollEvent, PhaseError> {
        self.require(&[GesturePhase::Decaying], "advance momentum")?;
        let momentum = if is_last {
            MomentumPhase::Ended
        } else {
            MomentumPhase::Changed
        };
        Ok(ScrollEvent::new(speed, ScrollPhase::Ended, momentum))
    }

    pub fn finish_momentum(&mut self) -> Result<ScrollEvent, PhaseError> {
        self.require(&[GesturePhase::Decaying], "finish momentum")?;
        self.phase = GesturePhase::Idle;
        Ok(closing_momentum_event())
    }

    /// Forces the machine to idle from any phase, returning the closing event for
    /// whatever was in flight. Countdown and idle close silently.
    pub fn stop_all(&mut self, current_speed: f64) -> Option<ScrollEvent> {
        let closing = match self.phase {
            GesturePhase::Ramping => Some(ScrollEvent::new(
                current_speed,
                ScrollPhase::Cancel,
                MomentumPhase::None,
            )),
            GesturePhase::Decaying => Some(closing_momentum_event()),
            GesturePhase::Idle | GesturePhase::CountingDown => None,
        };
        self.phase = GesturePhase::Idle;
        closing
    }

    fn require(&self, allowed: &[GesturePhase], action: &'static str) -> Result<(), PhaseError> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(PhaseError::InvalidTransition {
                from: self.phase,
                action,
            })
        }
    }
}

fn closing_momentum_event() -> ScrollEvent {
    ScrollEvent::new(0.0, ScrollPhase::Ended, MomentumPhase::Ended)
}
