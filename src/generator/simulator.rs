//! Composes the three generators into one set of telemetry rows per tick

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::{FaultCode, FaultMachine, FaultParams, PtoMachine, PtoParams, RpmGenerator, RpmParams};
use crate::types::{Channel, NewTelemetry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub rpm: RpmParams,
    pub pto: PtoParams,
    pub fault: FaultParams,
}

/// Everything produced by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTick {
    pub timestamp: DateTime<Utc>,
    pub pto_engaged: bool,
    pub rpm: f64,
    pub fault: Option<FaultCode>,
    /// PTO row, RPM row, then the fault row when one was emitted
    pub rows: Vec<NewTelemetry>,
}

pub struct TelemetrySimulator<R: Rng = StdRng> {
    params: SimulationParams,
    rng: R,
    rpm: RpmGenerator,
    pto: PtoMachine,
    fault: FaultMachine,
}

impl TelemetrySimulator<StdRng> {
    /// Reproducible simulator for tests and batch runs.
    pub fn seeded(params: SimulationParams, seed: u64) -> Self {
        Self::new(params, StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy(params: SimulationParams) -> Self {
        Self::new(params, StdRng::from_entropy())
    }
}

impl<R: Rng> TelemetrySimulator<R> {
    pub fn new(params: SimulationParams, mut rng: R) -> Self {
        let rpm = RpmGenerator::new(&params.rpm, &mut rng);
        let pto = PtoMachine::new(&params.pto, &mut rng);
        let fault = FaultMachine::new(&params.fault, &mut rng);
        Self {
            params,
            rng,
            rpm,
            pto,
            fault,
        }
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    pub fn current_rpm(&self) -> f64 {
        self.rpm.current
    }

    pub fn pto_engaged(&self) -> bool {
        self.pto.state.is_engaged()
    }

    /// Advance every machine by `elapsed_secs`. PTO goes first so the RPM
    /// target follows the fresh engagement state.
    pub fn tick(&mut self, timestamp: DateTime<Utc>, elapsed_secs: u32) -> SimulatedTick {
        let (pto, pto_tick) = self.pto.advance(elapsed_secs, &self.params.pto, &mut self.rng);
        let (rpm, rpm_payload) = self.rpm.advance(pto_tick.engaged, &self.params.rpm, &mut self.rng);
        let (fault, code) = self.fault.advance(elapsed_secs, &self.params.fault, &mut self.rng);
        self.pto = pto;
        self.rpm = rpm;
        self.fault = fault;

        let mut rows = Vec::with_capacity(3);
        rows.push(NewTelemetry::new(timestamp, Channel::Pto, pto_tick.payload));
        rows.push(NewTelemetry::new(timestamp, Channel::Rpm, rpm_payload));
        if let Some(code) = &code {
            rows.push(NewTelemetry::new(timestamp, Channel::Fault, code.payload.clone()));
        }

        SimulatedTick {
            timestamp: rows[0].timestamp,
            pto_engaged: pto_tick.engaged,
            rpm: rpm.current,
            fault: code,
            rows,
        }
    }

    /// Run `ticks` one-second ticks starting at `start` and collect the rows.
    pub fn generate_batch(&mut self, start: DateTime<Utc>, ticks: usize) -> Vec<NewTelemetry> {
        let mut rows = Vec::with_capacity(ticks * 2);
        for i in 0..ticks {
            let ts = start + Duration::seconds(i as i64);
            rows.extend(self.tick(ts, 1).rows);
        }
        rows
    }
}
