use serde::{Deserialize, Serialize};

/// Default number of steps a single spawn may spend on registrations.
pub const DEFAULT_STEP_LIMIT: u64 = 10_000;

/// Whether registration steps are charged against a budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MeteringPolicy {
    /// Plain loop; registrations are never charged.
    Unmetered,
    /// Each registration costs `cost_per_registration` steps out of `step_limit`.
    Metered {
        step_limit: u64,
        cost_per_registration: u64,
    },
}

impl Default for MeteringPolicy {
    fn default() -> Self {
        Self::Metered {
            step_limit: DEFAULT_STEP_LIMIT,
            cost_per_registration: 1,
        }
    }
}

impl MeteringPolicy {
    pub fn is_metered(&self) -> bool {
        matches!(self, Self::Metered { .. })
    }

    /// A fresh meter for one spawn.
    pub fn meter(&self) -> StepMeter {
        match *self {
            Self::Unmetered => StepMeter::unmetered(),
            Self::Metered {
                step_limit,
                cost_per_registration,
            } => StepMeter::new(step_limit, cost_per_registration),
        }
    }
}

/// Raised when a charge does not fit in the remaining budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("step budget exhausted: needed {needed}, {remaining} remaining")]
pub struct Exhausted {
    pub needed: u64,
    pub remaining: u64,
}

/// Remaining-budget counter checked before every chargeable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepMeter {
    remaining: Option<u64>,
    cost: u64,
    spent: u64,
}

impl StepMeter {
    pub fn new(step_limit: u64, cost_per_step: u64) -> Self {
        Self {
            remaining: Some(step_limit),
            cost: cost_per_step,
            spent: 0,
        }
    }

    pub fn unmetered() -> Self {
        Self {
            remaining: None,
            cost: 0,
            spent: 0,
        }
    }

    /// A meter that admits exactly `steps` unit-cost steps.
    pub fn steps(steps: u64) -> Self {
        Self::new(steps, 1)
    }

    /// Charge one step. Fails without charging anything if the budget cannot cover it.
    pub fn charge(&mut self) -> Result<(), Exhausted> {
        let Some(remaining) = self.remaining else {
            self.spent += 1;
            return Ok(());
        };
        if remaining < self.cost {
            return Err(Exhausted {
                needed: self.cost,
                remaining,
            });
        }
        self.remaining = Some(remaining - self.cost);
        self.spent += self.cost;
        Ok(())
    }

    /// Remaining budget; `None` when unmetered.
    pub fn remaining(&self) -> Option<u64> {
        self.remaining
    }

    /// Steps charged so far (one per step when unmetered).
    pub fn spent(&self) -> u64 {
        self.spent
    }
}
