//! PTO engagement state machine

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Span;
use crate::codec::encode_pto;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PtoState {
    Disengaged,
    Engaged,
}

impl PtoState {
    pub fn is_engaged(&self) -> bool {
        matches!(self, PtoState::Engaged)
    }

    fn toggled(self) -> Self {
        match self {
            PtoState::Disengaged => PtoState::Engaged,
            PtoState::Engaged => PtoState::Disengaged,
        }
    }
}

/// Dwell ranges in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PtoParams {
    /// Disengaged dwell before the first engagement
    pub initial: Span<u32>,
    pub engaged: Span<u32>,
    pub disengaged: Span<u32>,
}

impl Default for PtoParams {
    fn default() -> Self {
        Self {
            initial: Span::new(300, 1800),
            engaged: Span::new(60, 180),
            disengaged: Span::new(300, 1800),
        }
    }
}

impl PtoParams {
    fn dwell(&self, state: PtoState) -> Span<u32> {
        match state {
            PtoState::Engaged => self.engaged,
            PtoState::Disengaged => self.disengaged,
        }
    }
}

/// Output of one PTO tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtoTick {
    pub engaged: bool,
    pub payload: String,
    pub toggled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtoMachine {
    pub state: PtoState,
    /// Seconds left in the current state
    pub remaining: i64,
    /// Cached status payload, regenerated only when the state changes
    payload: String,
}

impl PtoMachine {
    pub fn new<R: Rng + ?Sized>(params: &PtoParams, rng: &mut R) -> Self {
        let remaining = i64::from(params.initial.draw(rng));
        Self::with_state(PtoState::Disengaged, remaining, rng)
    }

    pub fn with_state<R: Rng + ?Sized>(state: PtoState, remaining: i64, rng: &mut R) -> Self {
        Self {
            state,
            remaining,
            payload: encode_pto(state.is_engaged(), rng),
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Count down by `elapsed_secs`; at zero or below, toggle and redraw the
    /// dwell for the new state.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        elapsed_secs: u32,
        params: &PtoParams,
        rng: &mut R,
    ) -> (Self, PtoTick) {
        let remaining = self.remaining - i64::from(elapsed_secs);

        let next = if remaining <= 0 {
            let state = self.state.toggled();
            let dwell = i64::from(params.dwell(state).draw(rng));
            Self::with_state(state, dwell, rng)
        } else {
            Self {
                state: self.state,
                remaining,
                payload: self.payload.clone(),
            }
        };

        let tick = PtoTick {
            engaged: next.state.is_engaged(),
            payload: next.payload.clone(),
            toggled: next.state != self.state,
        };
        (next, tick)
    }
}
