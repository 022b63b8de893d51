//! Injectable fault source for the simulated channel senders.
//!
//! Replaces ad hoc randomness in send paths with an explicit dependency:
//! production wires a seedable RNG, tests wire a scripted sequence so
//! failure/success patterns are reproducible.

use std::collections::VecDeque;
use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether one send attempt fails.
pub trait FaultSource: Send + Sync {
    /// Returns `true` if the current attempt should fail.
    fn roll(&self) -> bool;
}

/// Fails each attempt with a fixed probability.
///
/// Seedable so a run can be replayed; `from_entropy` for production use.
pub struct RandomFaults {
    probability: f64,
    rng: Mutex<StdRng>,
}

impl RandomFaults {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn with_seed(probability: f64, seed: u64) -> Self {
        Self {
            probability,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl FaultSource for RandomFaults {
    fn roll(&self) -> bool {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        rng.gen_range(0.0..1.0) < self.probability
    }
}

/// Never fails. Useful for demos and as a default in tests that only care
/// about the happy path.
pub struct NoFaults;

impl FaultSource for NoFaults {
    fn roll(&self) -> bool {
        false
    }
}

/// Plays back a fixed outcome sequence (`true` = fail), then succeeds once
/// the script is exhausted.
pub struct ScriptedFaults {
    script: Mutex<VecDeque<bool>>,
}

impl ScriptedFaults {
    pub fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            script: Mutex::new(outcomes.into_iter().collect()),
        }
    }
}

impl FaultSource for ScriptedFaults {
    fn roll(&self) -> bool {
        let mut script = self.script.lock().unwrap_or_else(|e| e.into_inner());
        script.pop_front().unwrap_or(false)
    }
}
