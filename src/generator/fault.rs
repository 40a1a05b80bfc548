//! Fault code emission state machine

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::Span;
use crate::codec::encode_fault;

/// SPNs the simulator reports, each with the FMIs it may fail with.
pub const FAULT_TABLE: &[(u16, &[u8])] = &[
    (100, &[0, 1, 4]),
    (110, &[0, 1, 3]),
    (111, &[1, 2]),
    (190, &[0, 2]),
    (91, &[3, 4]),
    (84, &[0, 2]),
    (723, &[2, 5]),
    (639, &[2, 3, 4]),
    (108, &[0, 1]),
];

const FAULT_TABLE_FALLBACK: (u16, u8) = (100, 0);

/// FMIs registered for `spn`, empty for SPNs outside [`FAULT_TABLE`].
pub fn permitted_fmis(spn: u16) -> &'static [u8] {
    FAULT_TABLE
        .iter()
        .find(|(s, _)| *s == spn)
        .map(|(_, fmis)| *fmis)
        .unwrap_or(&[])
}

/// When an active fault is written to the feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionPolicy {
    /// One row on the tick the fault becomes active
    #[default]
    OncePerActivation,
    /// A freshly picked row on every active tick
    EveryTick,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultParams {
    /// Quiet period before the first fault
    pub initial: Span<u32>,
    pub active: Span<u32>,
    pub inactive: Span<u32>,
    pub emission: EmissionPolicy,
}

impl Default for FaultParams {
    fn default() -> Self {
        Self {
            initial: Span::new(300, 2400),
            active: Span::new(5, 30),
            inactive: Span::new(600, 1800),
            emission: EmissionPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultState {
    Inactive,
    Active,
}

/// An emitted fault row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultCode {
    pub spn: u16,
    pub fmi: u8,
    pub payload: String,
}

impl FaultCode {
    pub fn new(spn: u16, fmi: u8) -> Self {
        Self {
            spn,
            fmi,
            payload: encode_fault(spn, fmi),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultMachine {
    pub state: FaultState,
    /// Seconds left in the current state
    pub remaining: i64,
}

impl FaultMachine {
    pub fn new<R: Rng + ?Sized>(params: &FaultParams, rng: &mut R) -> Self {
        Self {
            state: FaultState::Inactive,
            remaining: i64::from(params.initial.draw(rng)),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == FaultState::Active
    }

    /// Count down, toggle at zero or below, and emit according to the
    /// configured policy.
    pub fn advance<R: Rng + ?Sized>(
        &self,
        elapsed_secs: u32,
        params: &FaultParams,
        rng: &mut R,
    ) -> (Self, Option<FaultCode>) {
        let remaining = self.remaining - i64::from(elapsed_secs);

        let next = if remaining <= 0 {
            let (state, dwell) = match self.state {
                FaultState::Inactive => (FaultState::Active, params.active),
                FaultState::Active => (FaultState::Inactive, params.inactive),
            };
            Self {
                state,
                remaining: i64::from(dwell.draw(rng)),
            }
        } else {
            Self {
                state: self.state,
                remaining,
            }
        };

        let activated = !self.is_active() && next.is_active();
        let emit = match params.emission {
            EmissionPolicy::OncePerActivation => activated,
            EmissionPolicy::EveryTick => next.is_active(),
        };

        let code = if emit { Some(pick_fault(rng)) } else { None };
        (next, code)
    }
}

/// Uniform SPN, then a uniform FMI from that SPN's registered subset.
pub fn pick_fault<R: Rng + ?Sized>(rng: &mut R) -> FaultCode {
    let Some(&(spn, fmis)) = FAULT_TABLE.choose(rng) else {
        return FaultCode::new(FAULT_TABLE_FALLBACK.0, FAULT_TABLE_FALLBACK.1);
    };
    let fmi = fmis.choose(rng).copied().unwrap_or(0);
    FaultCode::new(spn, fmi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_fault;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn short_params(emission: EmissionPolicy) -> FaultParams {
        FaultParams {
            initial: Span::new(2, 2),
            active: Span::new(3, 3),
            inactive: Span::new(5, 5),
            emission,
        }
    }

    #[test]
    fn test_never_emits_unregistered_fmi() {
        let params = FaultParams {
            initial: Span::new(1, 5),
            active: Span::new(1, 10),
            inactive: Span::new(1, 10),
            emission: EmissionPolicy::EveryTick,
        };
        let mut rng = StdRng::seed_from_u64(17);
        let mut machine = FaultMachine::new(&params, &mut rng);
        let mut emitted = 0;
        for _ in 0..20_000 {
            let (next, code) = machine.advance(1, &params, &mut rng);
            if let Some(code) = code {
                emitted += 1;
                assert!(permitted_fmis(code.spn).contains(&code.fmi), "{code:?}");
                assert_eq!(decode_fault(&code.payload).ok(), Some((code.spn, code.fmi)));
            }
            machine = next;
        }
        assert!(emitted > 0);
    }

    #[test]
    fn test_once_per_activation() {
        let params = short_params(EmissionPolicy::OncePerActivation);
        let mut rng = StdRng::seed_from_u64(1);
        let mut machine = FaultMachine::new(&params, &mut rng);
        let mut emitted = Vec::new();
        for _ in 0..16 {
            let (next, code) = machine.advance(1, &params, &mut rng);
            emitted.push(code.is_some());
            machine = next;
        }
        // activates on ticks 2 and 10 (2 quiet, 3 active, 5 quiet)
        let hits: Vec<usize> = emitted
            .iter()
            .enumerate()
            .filter_map(|(i, e)| e.then_some(i + 1))
            .collect();
        assert_eq!(hits, vec![2, 10]);
    }

    #[test]
    fn test_every_tick_emits_while_active() {
        let params = short_params(EmissionPolicy::EveryTick);
        let mut rng = StdRng::seed_from_u64(1);
        let mut machine = FaultMachine::new(&params, &mut rng);
        let mut hits = Vec::new();
        for tick in 1..=16 {
            let (next, code) = machine.advance(1, &params, &mut rng);
            if code.is_some() {
                hits.push(tick);
            }
            assert_eq!(code.is_some(), next.is_active());
            machine = next;
        }
        assert_eq!(hits, vec![2, 3, 4, 10, 11, 12]);
    }

    #[test]
    fn test_timer_strictly_decreases_between_toggles() {
        let params = FaultParams {
            initial: Span::new(10, 40),
            active: Span::new(5, 30),
            inactive: Span::new(20, 60),
            emission: EmissionPolicy::OncePerActivation,
        };
        let mut rng = StdRng::seed_from_u64(23);
        let mut machine = FaultMachine::new(&params, &mut rng);
        assert!((10..=40).contains(&machine.remaining));

        let mut toggles = 0;
        for _ in 0..10_000 {
            let (next, _) = machine.advance(1, &params, &mut rng);
            if next.state != machine.state {
                toggles += 1;
                let dwell = match next.state {
                    FaultState::Active => params.active,
                    FaultState::Inactive => params.inactive,
                };
                assert!(next.remaining >= i64::from(dwell.min));
                assert!(next.remaining <= i64::from(dwell.max));
            } else {
                assert!(next.remaining < machine.remaining);
            }
            machine = next;
        }
        assert!(toggles > 100);
    }

    #[test]
    fn test_permitted_fmis_lookup() {
        assert_eq!(permitted_fmis(723), &[2, 5]);
        assert!(permitted_fmis(1).is_empty());
    }

    #[test]
    fn test_emission_policy_serde() {
        let p: EmissionPolicy = serde_json::from_str("\"every_tick\"").unwrap();
        assert_eq!(p, EmissionPolicy::EveryTick);
        assert_eq!(EmissionPolicy::default(), EmissionPolicy::OncePerActivation);
    }
}
