//! Synthetic telemetry generation
//!
//! Three small state machines (engine speed, PTO engagement, fault emission)
//! composed by [`simulator::TelemetrySimulator`] into one row set per tick.
//! Every transition is a pure `advance(&self, ..., rng)` returning the next
//! state, so tests drive them with a seeded RNG and no clock.

pub mod fault;
pub mod pto;
pub mod rpm;
pub mod simulator;

pub use fault::{EmissionPolicy, FaultCode, FaultMachine, FaultParams, FaultState};
pub use pto::{PtoMachine, PtoParams, PtoState, PtoTick};
pub use rpm::{RpmGenerator, RpmParams, StepPolicy};
pub use simulator::{SimulatedTick, SimulationParams, TelemetrySimulator};

use rand::distributions::uniform::SampleUniform;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Inclusive range a value is drawn from uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span<T> {
    pub min: T,
    pub max: T,
}

impl<T> Span<T>
where
    T: SampleUniform + PartialOrd + Copy,
{
    pub const fn new(min: T, max: T) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }

    /// Uniform draw from `[min, max]`. An inverted span yields `min`.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        if self.is_valid() {
            rng.gen_range(self.min..=self.max)
        } else {
            self.min
        }
    }
}
