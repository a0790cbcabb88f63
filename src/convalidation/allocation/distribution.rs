use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::convalidation::catalog::ComponentTag;
use crate::convalidation::domain::ConvalidationWarning;

/// Credits and subjects that landed in one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentTally {
    pub credits_assigned: f64,
    pub subject_count: usize,
    pub subjects: Vec<String>,
}

impl ComponentTally {
    fn empty() -> Self {
        Self {
            credits_assigned: 0.0,
            subject_count: 0,
            subjects: Vec::new(),
        }
    }
}

/// Share of a subject's credits applied to one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditPortion {
    pub component: ComponentTag,
    pub credits: f64,
}

/// Allocation trail for a single subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectAllocation {
    pub code: String,
    pub name: String,
    pub natural_component: ComponentTag,
    pub assigned_component: Option<ComponentTag>,
    pub portions: Vec<CreditPortion>,
    pub effective_credits: f64,
    pub credits_counted: f64,
    pub credits_uncounted: f64,
    pub redirected: bool,
    pub counts_toward_degree: bool,
}

/// Result of one allocation pass: per-component totals plus the per-subject trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDistribution {
    pub components: BTreeMap<ComponentTag, ComponentTally>,
    pub uncounted_credits: f64,
    pub subjects: Vec<SubjectAllocation>,
    pub warnings: Vec<ConvalidationWarning>,
}

impl Default for ComponentDistribution {
    fn default() -> Self {
        Self::empty()
    }
}

impl ComponentDistribution {
    pub fn empty() -> Self {
        Self {
            components: ComponentTag::ordered()
                .into_iter()
                .map(|tag| (tag, ComponentTally::empty()))
                .collect(),
            uncounted_credits: 0.0,
            subjects: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn credits(&self, tag: ComponentTag) -> f64 {
        self.components
            .get(&tag)
            .map(|tally| tally.credits_assigned)
            .unwrap_or(0.0)
    }

    pub fn subject_count(&self, tag: ComponentTag) -> usize {
        self.components
            .get(&tag)
            .map(|tally| tally.subject_count)
            .unwrap_or(0)
    }

    /// Credits counting toward the degree (every component except leveling).
    pub fn degree_credits(&self) -> f64 {
        ComponentTag::ordered()
            .into_iter()
            .filter(|tag| tag.counts_toward_degree())
            .map(|tag| self.credits(tag))
            .sum()
    }

    /// Credits applied to any component, leveling included.
    pub fn counted_credits(&self) -> f64 {
        self.components
            .values()
            .map(|tally| tally.credits_assigned)
            .sum()
    }

    pub fn subject(&self, code: &str) -> Option<&SubjectAllocation> {
        self.subjects.iter().find(|subject| subject.code == code)
    }

    pub(crate) fn record(&mut self, allocation: SubjectAllocation) {
        for portion in &allocation.portions {
            if let Some(tally) = self.components.get_mut(&portion.component) {
                tally.credits_assigned += portion.credits;
            }
        }

        if let Some(tag) = allocation.assigned_component {
            if let Some(tally) = self.components.get_mut(&tag) {
                tally.subject_count += 1;
                tally.subjects.push(allocation.code.clone());
            }
        }

        self.uncounted_credits += allocation.credits_uncounted;
        self.subjects.push(allocation);
    }
}
