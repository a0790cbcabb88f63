mod distribution;
mod ledger;
mod policy;

pub use distribution::{ComponentDistribution, ComponentTally, CreditPortion, SubjectAllocation};
pub use policy::OverflowPolicy;

pub(crate) use ledger::CREDIT_EPSILON;

use super::catalog::{ComponentTag, CurriculumCatalog};
use super::domain::{ConvalidationWarning, SubjectRecord, WarningKind};
use ledger::CreditLedger;
use policy::route_overflow;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A classified, credit-bearing subject queued for allocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationInput {
    pub code: String,
    pub name: String,
    pub raw_type: String,
    pub component: Option<ComponentTag>,
    pub credits: f64,
    pub equivalence_scale: f64,
}

impl AllocationInput {
    pub fn from_record(record: &SubjectRecord, component: Option<ComponentTag>) -> Self {
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            raw_type: record.raw_type.clone(),
            component,
            credits: record.credits,
            equivalence_scale: 1.0,
        }
    }

    pub fn with_scale(mut self, equivalence_scale: f64) -> Self {
        self.equivalence_scale = equivalence_scale;
        self
    }

    pub fn effective_credits(&self) -> f64 {
        self.credits * self.equivalence_scale
    }
}

/// Stateless allocator folding subjects into components in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreditAllocator {
    policy: OverflowPolicy,
}

impl CreditAllocator {
    pub fn new(policy: OverflowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    pub fn allocate(
        &self,
        catalog: &CurriculumCatalog,
        inputs: &[AllocationInput],
    ) -> ComponentDistribution {
        let mut ledger = CreditLedger::new(catalog);
        let mut distribution = ComponentDistribution::empty();

        for input in inputs {
            let Some(natural) = input.component else {
                warn!(subject = %input.code, raw_type = %input.raw_type, "excluding unclassifiable subject");
                distribution.warnings.push(ConvalidationWarning::new(
                    WarningKind::UnclassifiableSubject,
                    input.code.clone(),
                    format!("type '{}' does not map to a curriculum component", input.raw_type),
                ));
                continue;
            };

            let allocation = self.allocate_one(input, natural, &mut ledger);
            distribution.record(allocation);
        }

        debug_assert!(
            (distribution.uncounted_credits - ledger.uncounted()).abs() < 1e-6,
            "ledger and distribution disagree on uncounted credits"
        );

        distribution
    }

    fn allocate_one(
        &self,
        input: &AllocationInput,
        natural: ComponentTag,
        ledger: &mut CreditLedger<'_>,
    ) -> SubjectAllocation {
        let effective = input.effective_credits();
        let mut allocation = SubjectAllocation {
            code: input.code.clone(),
            name: input.name.clone(),
            natural_component: natural,
            assigned_component: None,
            portions: Vec::new(),
            effective_credits: effective,
            credits_counted: 0.0,
            credits_uncounted: 0.0,
            redirected: false,
            counts_toward_degree: false,
        };

        if effective < CREDIT_EPSILON {
            return allocation;
        }

        if natural == ComponentTag::Leveling {
            let accepted = ledger.deposit_unbounded(natural, effective);
            allocation.portions.push(CreditPortion {
                component: natural,
                credits: accepted,
            });
            allocation.assigned_component = Some(natural);
            allocation.credits_counted = accepted;
            return allocation;
        }

        let accepted = ledger.deposit(natural, effective);
        if accepted > 0.0 {
            allocation.portions.push(CreditPortion {
                component: natural,
                credits: accepted,
            });
            allocation.assigned_component = Some(natural);
        }

        let remainder = effective - accepted;
        if remainder >= CREDIT_EPSILON {
            let routing = route_overflow(self.policy, natural, remainder, ledger);
            if routing.redirected > 0.0 {
                allocation.portions.push(CreditPortion {
                    component: ComponentTag::FreeElective,
                    credits: routing.redirected,
                });
                allocation.redirected = true;
                if allocation.assigned_component.is_none() {
                    allocation.assigned_component = Some(ComponentTag::FreeElective);
                }
            }
            allocation.credits_uncounted = routing.uncounted;
        }

        allocation.credits_counted = allocation.portions.iter().map(|p| p.credits).sum();
        allocation.counts_toward_degree = allocation.credits_counted > 0.0;
        allocation
    }
}
