use serde::{Deserialize, Serialize};

/// Progress is `index / (step_count - 1)`, so a ramp needs at least two steps.
pub const MIN_STEP_COUNT: u32 = 2;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum RampCurve {
    #[default]
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl RampCurve {
    pub const ALL: [RampCurve; 4] = [
        RampCurve::Linear,
        RampCurve::EaseIn,
        RampCurve::EaseOut,
        RampCurve::EaseInOut,
    ];

    /// Maps progress in [0, 1] onto curved progress in [0, 1]. Input is clamped first.
    pub fn apply(self, progress: f64) -> f64 {
        let p = progress.clamp(0.0, 1.0);
        match self {
            Self::Linear => p,
            Self::EaseIn => p * p,
            Self::EaseOut => 1.0 - (1.0 - p) * (1.0 - p),
            Self::EaseInOut => {
                if p < 0.5 {
                    2.0 * p * p
                } else {
                    let tail = -2.0 * p + 2.0;
                    1.0 - tail * tail / 2.0
                }
            }
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "linear" => Some(Self::Linear),
            "easein" => Some(Self::EaseIn),
            "easeout" => Some(Self::EaseOut),
            "easeinout" => Some(Self::EaseInOut),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RequestError {
    #[error("step count must be at least {MIN_STEP_COUNT}, got {0}")]
    TooFewSteps(u32),
    #[error("{field} must be a finite number")]
    NonFiniteSpeed { field: &'static str },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GestureRequest {
    pub start_speed: f64,
    pub end_speed: f64,
    pub step_count: u32,
    #[serde(default)]
    pub curve: RampCurve,
}

impl GestureRequest {
    pub fn new(start_speed: f64, end_speed: f64, step_count: u32) -> Self {
        Self {
            start_speed,
            end_speed,
            step_count,
            curve: RampCurve::Linear,
        }
    }

    pub fn with_curve(mut self, curve: RampCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if self.step_count < MIN_STEP_COUNT {
            return Err(RequestError::TooFewSteps(self.step_count));
        }
        if !self.start_speed.is_finite() {
            return Err(RequestError::NonFiniteSpeed {
                field: "startSpeed",
            });
        }
        if !self.end_speed.is_finite() {
            return Err(RequestError::NonFiniteSpeed { field: "endSpeed" });
        }
        Ok(())
    }

    /// Speed of ramp tick `index`. Exact at both ends: startSpeed at 0, endSpeed at the last step.
    pub fn speed_at(&self, index: u32) -> f64 {
        let last = self.step_count.saturating_sub(1).max(1) as f64;
        let curved = self.curve.apply(index as f64 / last);
        self.start_speed * (1.0 - curved) + self.end_speed * curved
    }
}

/// Walks a validated request from tick 0 to tick `step_count - 1`.
#[derive(Debug, Clone)]
pub struct RampGenerator {
    request: GestureRequest,
    next_index: u32,
}

impl RampGenerator {
    pub fn new(request: GestureRequest) -> Result<Self, RequestError> {
        request.validate()?;
        Ok(Self {
            request,
            next_index: 0,
        })
    }

    pub fn request(&self) -> &GestureRequest {
        &self.request
    }

    /// Index of the most recently produced tick.
    pub fn current_index(&self) -> Option<u32> {
        self.next_index.checked_sub(1)
    }

    pub fn is_exhausted(&self) -> bool {
        self.next_index >= self.request.step_count
    }

    pub fn next_speed(&mut self) -> Option<f64> {
        if self.is_exhausted() {
            return None;
        }
        let speed = self.request.speed_at(self.next_index);
        self.next_index += 1;
        Some(speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_pin_both_endpoints() {
        for curve in RampCurve::ALL {
            assert_eq!(curve.apply(0.0), 0.0, "{curve:?} at 0");
            assert_eq!(curve.apply(1.0), 1.0, "{curve:?} at 1");
        }
    }

    #[test]
    fn ease_in_out_is_exactly_half_at_midpoint() {
        assert_eq!(RampCurve::EaseInOut.apply(0.5), 0.5);
    }

    #[test]
    fn ease_in_stays_below_linear_below_ease_out() {
        for step in 1..100 {
            let p = step as f64 / 100.0;
            let ease_in = RampCurve::EaseIn.apply(p);
            let linear = RampCurve::Linear.apply(p);
            let ease_out = RampCurve::EaseOut.apply(p);
            assert!(ease_in <= linear, "easeIn({p}) = {ease_in}");
            assert!(linear <= ease_out, "easeOut({p}) = {ease_out}");
        }
    }

    #[test]
    fn progress_outside_unit_range_is_clamped() {
        assert_eq!(RampCurve::EaseOut.apply(-0.5), 0.0);
        assert_eq!(RampCurve::EaseIn.apply(1.7), 1.0);
    }

    #[test]
    fn linear_ramp_matches_reference_points() {
        let request = GestureRequest::new(1.0, 80.0, 80);
        assert_eq!(request.speed_at(0), 1.0);
        assert!((request.speed_at(39) - 40.0).abs() < 1e-9);
        assert_eq!(request.speed_at(79), 80.0);
    }

    #[test]
    fn every_curve_hits_start_and_end_exactly() {
        for curve in RampCurve::ALL {
            let request = GestureRequest::new(0.1, 0.3, 7).with_curve(curve);
            assert_eq!(request.speed_at(0), 0.1);
            assert_eq!(request.speed_at(6), 0.3);
        }
    }

    #[test]
    fn decreasing_ramp_is_supported() {
        let mut ramp = RampGenerator::new(GestureRequest::new(50.0, 10.0, 5)).expect("valid");
        let speeds: Vec<f64> = std::iter::from_fn(|| ramp.next_speed()).collect();
        assert_eq!(speeds, vec![50.0, 40.0, 30.0, 20.0, 10.0]);
        assert!(ramp.is_exhausted());
        assert_eq!(ramp.current_index(), Some(4));
    }

    #[test]
    fn single_step_request_is_rejected() {
        assert_eq!(
            GestureRequest::new(1.0, 2.0, 1).validate(),
            Err(RequestError::TooFewSteps(1))
        );
        assert!(RampGenerator::new(GestureRequest::new(1.0, 2.0, 0)).is_err());
    }

    #[test]
    fn non_finite_speeds_are_rejected() {
        assert_eq!(
            GestureRequest::new(f64::NAN, 2.0, 4).validate(),
            Err(RequestError::NonFiniteSpeed {
                field: "startSpeed"
            })
        );
        assert_eq!(
            GestureRequest::new(1.0, f64::INFINITY, 4).validate(),
            Err(RequestError::NonFiniteSpeed { field: "endSpeed" })
        );
    }

    #[test]
    fn curve_names_parse_loosely() {
        assert_eq!(RampCurve::parse("ease-in-out"), Some(RampCurve::EaseInOut));
        assert_eq!(RampCurve::parse("EaseIn"), Some(RampCurve::EaseIn));
        assert_eq!(RampCurve::parse(" linear "), Some(RampCurve::Linear));
        assert_eq!(RampCurve::parse("bounce"), None);
    }
}
