//! Engine speed smoothing generator

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Span;
use crate::codec::encode_rpm;

/// How far the engine speed may move in one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum StepPolicy {
    /// Same bound every tick
    Fixed { step: f64 },
    /// Bound redrawn uniformly each tick
    Random { min: f64, max: f64 },
}

impl StepPolicy {
    pub fn bound<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match *self {
            StepPolicy::Fixed { step } => step,
            StepPolicy::Random { min, max } => Span::new(min, max).draw(rng),
        }
    }

    /// Largest step this policy can produce.
    pub fn max_bound(&self) -> f64 {
        match *self {
            StepPolicy::Fixed { step } => step,
            StepPolicy::Random { min, max } => min.max(max),
        }
    }

    pub fn is_valid(&self) -> bool {
        match *self {
            StepPolicy::Fixed { step } => step.is_finite() && step > 0.0,
            StepPolicy::Random { min, max } => {
                min.is_finite() && max.is_finite() && min > 0.0 && min <= max
            }
        }
    }
}

impl Default for StepPolicy {
    fn default() -> Self {
        StepPolicy::Fixed { step: 50.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpmParams {
    pub initial: Span<f64>,
    /// Target range while the PTO is engaged
    pub engaged_target: Span<f64>,
    pub disengaged_target: Span<f64>,
    pub step: StepPolicy,
}

impl Default for RpmParams {
    fn default() -> Self {
        Self {
            initial: Span::new(1000.0, 1300.0),
            engaged_target: Span::new(900.0, 1300.0),
            disengaged_target: Span::new(1200.0, 2500.0),
            step: StepPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RpmGenerator {
    pub current: f64,
}

impl RpmGenerator {
    pub fn new<R: Rng + ?Sized>(params: &RpmParams, rng: &mut R) -> Self {
        Self {
            current: params.initial.draw(rng),
        }
    }

    pub fn starting_at(rpm: f64) -> Self {
        Self { current: rpm }
    }

    /// Draw a target for the PTO state and step toward it.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        pto_engaged: bool,
        params: &RpmParams,
        rng: &mut R,
    ) -> (Self, String) {
        let range = if pto_engaged {
            params.engaged_target
        } else {
            params.disengaged_target
        };
        let target = range.draw(rng);
        let step = params.step.bound(rng);
        let next = Self {
            current: step_toward(self.current, target, step),
        };
        (next, encode_rpm(next.current))
    }
}

/// Move `current` toward `target` by at most `step`, snapping when within reach.
pub fn step_toward(current: f64, target: f64, step: f64) -> f64 {
    if (current - target).abs() > step {
        if target > current {
            current + step
        } else {
            current - step
        }
    } else {
        target
    }
}
