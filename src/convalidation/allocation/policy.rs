use serde::{Deserialize, Serialize};

use crate::convalidation::catalog::ComponentTag;
use super::ledger::CreditLedger;

/// What happens to credits that do not fit under their natural component's cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Bank the excess as free-elective credit up to that component's own cap.
    #[default]
    RedirectToFreeElective,
    /// Drop the excess into the uncounted bucket.
    Uncounted,
}

impl OverflowPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            OverflowPolicy::RedirectToFreeElective => "redirect to free elective",
            OverflowPolicy::Uncounted => "leave uncounted",
        }
    }
}

/// Outcome of routing one subject's overflow.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct OverflowRouting {
    pub redirected: f64,
    pub uncounted: f64,
}

pub(crate) fn route_overflow(
    policy: OverflowPolicy,
    natural: ComponentTag,
    remainder: f64,
    ledger: &mut CreditLedger<'_>,
) -> OverflowRouting {
    let redirected = match policy {
        OverflowPolicy::RedirectToFreeElective if natural != ComponentTag::FreeElective => {
            ledger.deposit(ComponentTag::FreeElective, remainder)
        }
        OverflowPolicy::RedirectToFreeElective | OverflowPolicy::Uncounted => 0.0,
    };

    let uncounted = (remainder - redirected).max(0.0);
    ledger.bank_uncounted(uncounted);

    OverflowRouting {
        redirected,
        uncounted,
    }
}
