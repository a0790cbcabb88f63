use crate::convalidation::catalog::{ComponentTag, CurriculumCatalog};

/// Tolerance for cap comparisons on fractional (equivalence-scaled) credits.
pub(crate) const CREDIT_EPSILON: f64 = 1e-9;

/// Running per-component totals for one allocation pass.
pub(crate) struct CreditLedger<'a> {
    catalog: &'a CurriculumCatalog,
    assigned: [f64; ComponentTag::COUNT],
    uncounted: f64,
}

impl<'a> CreditLedger<'a> {
    pub(crate) fn new(catalog: &'a CurriculumCatalog) -> Self {
        Self {
            catalog,
            assigned: [0.0; ComponentTag::COUNT],
            uncounted: 0.0,
        }
    }

    pub(crate) fn assigned(&self, tag: ComponentTag) -> f64 {
        self.assigned[tag.index()]
    }

    pub(crate) fn uncounted(&self) -> f64 {
        self.uncounted
    }

    /// Room left under the cap; `None` when the component is uncapped.
    pub(crate) fn room(&self, tag: ComponentTag) -> Option<f64> {
        self.catalog
            .cap(tag)
            .map(|cap| (cap - self.assigned(tag)).max(0.0))
    }

    /// Adds as much of `credits` as the cap allows and returns the accepted amount.
    pub(crate) fn deposit(&mut self, tag: ComponentTag, credits: f64) -> f64 {
        let accepted = match self.room(tag) {
            None => credits,
            Some(room) if credits <= room + CREDIT_EPSILON => credits,
            Some(room) => room,
        };

        let accepted = if accepted < CREDIT_EPSILON { 0.0 } else { accepted };
        self.assigned[tag.index()] += accepted;
        accepted
    }

    /// Adds credits ignoring any cap. Used for leveling, which is tracked but never capped.
    pub(crate) fn deposit_unbounded(&mut self, tag: ComponentTag, credits: f64) -> f64 {
        self.assigned[tag.index()] += credits;
        credits
    }

    pub(crate) fn bank_uncounted(&mut self, credits: f64) {
        if credits >= CREDIT_EPSILON {
            self.uncounted += credits;
        }
    }
}
