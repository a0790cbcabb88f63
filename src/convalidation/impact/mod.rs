pub mod views;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::allocation::ComponentDistribution;
use super::catalog::ComponentTag;

/// Original versus convalidated credits for one component.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    pub component: ComponentTag,
    pub original: f64,
    pub convalidated: f64,
    pub delta: f64,
}

/// Aggregate effect of a convalidation on a student's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactResult {
    pub original_assigned_credits: f64,
    pub new_convalidated_credits: f64,
    pub credit_difference: f64,
    pub credits_lost: f64,
    pub per_component_breakdown: Vec<ComponentBreakdown>,
    pub additional_subjects_required: usize,
    pub average_progress_change_percent: f64,
}

impl ImpactResult {
    pub fn breakdown(&self, tag: ComponentTag) -> Option<&ComponentBreakdown> {
        self.per_component_breakdown
            .iter()
            .find(|entry| entry.component == tag)
    }

    /// Convalidation left the student with fewer usable credits than before.
    pub fn loses_credits(&self) -> bool {
        self.credit_difference < 0.0
    }
}

/// Diffs the original and convalidated distributions.
pub fn analyze_impact(
    original: &ComponentDistribution,
    convalidated: &ComponentDistribution,
    unconvalidated_count: usize,
    original_total_curriculum_credits: f64,
) -> ImpactResult {
    let original_assigned_credits = original.degree_credits();
    let new_convalidated_credits = convalidated.degree_credits();
    let credit_difference = new_convalidated_credits - original_assigned_credits;

    let per_component_breakdown = ComponentTag::ordered()
        .into_iter()
        .map(|component| {
            let before = original.credits(component);
            let after = convalidated.credits(component);
            ComponentBreakdown {
                component,
                original: before,
                convalidated: after,
                delta: after - before,
            }
        })
        .collect();

    ImpactResult {
        original_assigned_credits,
        new_convalidated_credits,
        credit_difference,
        credits_lost: credit_difference.abs(),
        per_component_breakdown,
        additional_subjects_required: unconvalidated_count,
        average_progress_change_percent: progress_change_percent(
            credit_difference,
            original_total_curriculum_credits,
        ),
    }
}

/// Percentage of the curriculum gained or lost, one decimal. A zero-credit curriculum yields 0.0.
pub fn progress_change_percent(credit_difference: f64, total_curriculum_credits: f64) -> f64 {
    if total_curriculum_credits.abs() < f64::EPSILON || !total_curriculum_credits.is_finite() {
        debug!(
            credit_difference,
            "curriculum has no credits; reporting zero progress change"
        );
        return 0.0;
    }

    round_to(credit_difference / total_curriculum_credits * 100.0, 1)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    let rounded = (value * factor).round() / factor;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
