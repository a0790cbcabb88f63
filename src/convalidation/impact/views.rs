use serde::Serialize;
use std::collections::BTreeMap;

use crate::convalidation::allocation::{ComponentDistribution, SubjectAllocation};
use crate::convalidation::catalog::{ComponentTag, CurriculumCatalog};
use crate::convalidation::domain::ConvalidationWarning;
use super::{round_to, ImpactResult};

fn credits(value: f64) -> f64 {
    round_to(value, 2)
}

fn component_credits(distribution: &ComponentDistribution) -> BTreeMap<ComponentTag, f64> {
    ComponentTag::ordered()
        .into_iter()
        .map(|tag| (tag, credits(distribution.credits(tag))))
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentBreakdownEntry {
    pub component: ComponentTag,
    pub label: &'static str,
    pub original: f64,
    pub convalidated: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WarningView {
    pub kind: &'static str,
    pub label: &'static str,
    pub subject: String,
    pub detail: String,
}

impl From<&ConvalidationWarning> for WarningView {
    fn from(warning: &ConvalidationWarning) -> Self {
        Self {
            kind: warning.kind.as_str(),
            label: warning.kind.label(),
            subject: warning.subject.clone(),
            detail: warning.detail.clone(),
        }
    }
}

/// Impact payload consumed by the UI and report renderers.
#[derive(Debug, Clone, Serialize)]
pub struct ImpactSummaryView {
    pub original_assigned_credits: f64,
    pub new_convalidated_credits: f64,
    pub convalidated_credits_by_component: BTreeMap<ComponentTag, f64>,
    pub original_curriculum_credits: BTreeMap<ComponentTag, f64>,
    pub additional_subjects_required: usize,
    pub average_progress_change: f64,
    pub credit_difference: f64,
    pub credits_lost: f64,
    pub per_component_breakdown: Vec<ComponentBreakdownEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningView>,
}

impl ImpactSummaryView {
    pub fn new(
        impact: &ImpactResult,
        original: &ComponentDistribution,
        convalidated: &ComponentDistribution,
        warnings: &[ConvalidationWarning],
    ) -> Self {
        let per_component_breakdown = impact
            .per_component_breakdown
            .iter()
            .map(|entry| ComponentBreakdownEntry {
                component: entry.component,
                label: entry.component.label(),
                original: credits(entry.original),
                convalidated: credits(entry.convalidated),
                delta: credits(entry.delta),
            })
            .collect();

        Self {
            original_assigned_credits: credits(impact.original_assigned_credits),
            new_convalidated_credits: credits(impact.new_convalidated_credits),
            convalidated_credits_by_component: component_credits(convalidated),
            original_curriculum_credits: component_credits(original),
            additional_subjects_required: impact.additional_subjects_required,
            average_progress_change: impact.average_progress_change_percent,
            credit_difference: credits(impact.credit_difference),
            credits_lost: credits(impact.credits_lost),
            per_component_breakdown,
            warnings: warnings.iter().map(WarningView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentProgressEntry {
    pub component: ComponentTag,
    pub label: String,
    pub credits_assigned: f64,
    pub credit_target: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_cap: Option<f64>,
    pub subject_count: usize,
    pub completion_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubjectAllocationView {
    pub code: String,
    pub name: String,
    pub natural_component: ComponentTag,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_component: Option<ComponentTag>,
    pub credits_counted: f64,
    pub credits_uncounted: f64,
    pub redirected: bool,
    pub counts_toward_degree: bool,
}

impl From<&SubjectAllocation> for SubjectAllocationView {
    fn from(subject: &SubjectAllocation) -> Self {
        Self {
            code: subject.code.clone(),
            name: subject.name.clone(),
            natural_component: subject.natural_component,
            assigned_component: subject.assigned_component,
            credits_counted: credits(subject.credits_counted),
            credits_uncounted: credits(subject.credits_uncounted),
            redirected: subject.redirected,
            counts_toward_degree: subject.counts_toward_degree,
        }
    }
}

/// Distribution payload with per-component progress against the curriculum.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionView {
    pub curriculum: String,
    pub degree_credits: f64,
    pub curriculum_credits: f64,
    pub progress_pct: f64,
    pub uncounted_credits: f64,
    pub components: Vec<ComponentProgressEntry>,
    pub subjects: Vec<SubjectAllocationView>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<WarningView>,
}

impl DistributionView {
    pub fn new(distribution: &ComponentDistribution, catalog: &CurriculumCatalog) -> Self {
        let components = catalog
            .components()
            .map(|component| {
                let assigned = distribution.credits(component.tag);
                ComponentProgressEntry {
                    component: component.tag,
                    label: component.display_name.clone(),
                    credits_assigned: credits(assigned),
                    credit_target: component.credit_target,
                    credit_cap: component.credit_cap,
                    subject_count: distribution.subject_count(component.tag),
                    completion_pct: percent_of(assigned, component.credit_target),
                }
            })
            .collect();

        let degree_credits = distribution.degree_credits();
        let curriculum_credits = catalog.total_credits();

        Self {
            curriculum: catalog.code().to_string(),
            degree_credits: credits(degree_credits),
            curriculum_credits,
            progress_pct: percent_of(degree_credits, curriculum_credits),
            uncounted_credits: credits(distribution.uncounted_credits),
            components,
            subjects: distribution
                .subjects
                .iter()
                .map(SubjectAllocationView::from)
                .collect(),
            warnings: distribution.warnings.iter().map(WarningView::from).collect(),
        }
    }
}

fn percent_of(value: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    round_to((value / total * 100.0).min(100.0), 1)
}
