use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::allocation::{AllocationInput, ComponentDistribution, CreditAllocator, OverflowPolicy};
use super::catalog::{CatalogError, CurriculumCatalog};
use super::classifier::classify;
use super::domain::{
    ConvalidationMapping, ConvalidationType, ConvalidationWarning, SubjectRecord, WarningKind,
};
use super::impact::views::{DistributionView, ImpactSummaryView};
use super::impact::{analyze_impact, ImpactResult};
use super::repository::{CacheError, DistributionCache, DistributionKey};
use super::resolver::{resolve, Resolution};
use crate::config::AllocationConfig;

/// Everything needed to evaluate one student's convalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactRequest {
    #[serde(default)]
    pub student_id: Option<String>,
    pub original_records: Vec<SubjectRecord>,
    pub mappings: Vec<ConvalidationMapping>,
    pub catalog: CurriculumCatalog,
    /// Curriculum the original records belong to; defaults to `catalog`.
    #[serde(default)]
    pub origin_catalog: Option<CurriculumCatalog>,
}

impl ImpactRequest {
    fn origin(&self) -> &CurriculumCatalog {
        self.origin_catalog.as_ref().unwrap_or(&self.catalog)
    }
}

/// Outcome of resolving one mapping, kept per external subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MappingOutcome {
    Resolved {
        convalidation_type: ConvalidationType,
        resolution: Resolution,
    },
    Excluded {
        warning: ConvalidationWarning,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactReport {
    pub student_id: Option<String>,
    pub original: ComponentDistribution,
    pub convalidated: ComponentDistribution,
    pub impact: ImpactResult,
    pub mappings: BTreeMap<String, MappingOutcome>,
    pub warnings: Vec<ConvalidationWarning>,
}

impl ImpactReport {
    pub fn summary(&self) -> ImpactSummaryView {
        ImpactSummaryView::new(
            &self.impact,
            &self.original,
            &self.convalidated,
            &self.warnings,
        )
    }
}

#[derive(Debug, Default, Serialize)]
pub struct BulkImpactReport {
    pub results: BTreeMap<String, ImpactSummaryView>,
    pub failures: Vec<BulkFailure>,
}

/// A request from a bulk run that produced no result. `index` is its position in the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub index: usize,
    pub student_id: Option<String>,
    pub error: String,
}

/// Output of [`ConvalidationService::bulk_resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedMappings {
    pub outcomes: BTreeMap<String, MappingOutcome>,
    pub warnings: Vec<ConvalidationWarning>,
}

/// Hard failures: the input is structurally invalid or a collaborator is down.
#[derive(Debug, thiserror::Error)]
pub enum ConvalidationError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("subject {code} has invalid credits {credits}")]
    NegativeCredits { code: String, credits: f64 },
    #[error("mapping for {external_subject_id} has equivalence {percentage}% outside 0-100")]
    InvalidEquivalence {
        external_subject_id: String,
        percentage: f64,
    },
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("unable to start convalidation workers: {0}")]
    WorkerPool(String),
}

impl ConvalidationError {
    /// Errors caused by the caller's data rather than the service.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ConvalidationError::Catalog(_)
                | ConvalidationError::NegativeCredits { .. }
                | ConvalidationError::InvalidEquivalence { .. }
        )
    }
}

/// Service composing the classifier, allocator, resolver and impact analyzer.
pub struct ConvalidationService<C> {
    cache: Arc<C>,
    allocator: CreditAllocator,
    pool: Arc<ThreadPool>,
}

impl<C> ConvalidationService<C>
where
    C: DistributionCache + 'static,
{
    pub fn new(
        cache: Arc<C>,
        policy: OverflowPolicy,
        workers: NonZeroUsize,
    ) -> Result<Self, ConvalidationError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers.get())
            .thread_name(|index| format!("convalidation-{index}"))
            .build()
            .map_err(|err| ConvalidationError::WorkerPool(err.to_string()))?;

        Ok(Self {
            cache,
            allocator: CreditAllocator::new(policy),
            pool: Arc::new(pool),
        })
    }

    pub fn from_config(cache: Arc<C>, config: &AllocationConfig) -> Result<Self, ConvalidationError> {
        Self::new(cache, config.overflow_policy, config.bulk_workers)
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.allocator.policy()
    }

    /// Classifies and allocates a student's credit-earning records against a curriculum.
    pub fn compute_distribution(
        &self,
        records: &[SubjectRecord],
        catalog: &CurriculumCatalog,
    ) -> Result<ComponentDistribution, ConvalidationError> {
        validate_records(records)?;

        let inputs: Vec<AllocationInput> = records
            .iter()
            .filter(|record| record.status.earns_credit())
            .map(|record| AllocationInput::from_record(record, classify(record, None).ok()))
            .collect();

        Ok(self.allocator.allocate(catalog, &inputs))
    }

    pub fn distribution_view(
        &self,
        records: &[SubjectRecord],
        catalog: &CurriculumCatalog,
    ) -> Result<DistributionView, ConvalidationError> {
        let distribution = self.compute_distribution(records, catalog)?;
        Ok(DistributionView::new(&distribution, catalog))
    }

    /// Read-through variant of [`Self::compute_distribution`] keyed by student.
    pub fn distribution_for_student(
        &self,
        student_id: &str,
        records: &[SubjectRecord],
        catalog: &CurriculumCatalog,
    ) -> Result<ComponentDistribution, ConvalidationError> {
        let key = DistributionKey::new(student_id, catalog, records, self.policy());
        if let Some(cached) = self.cache.get(&key)? {
            debug!(student_id, curriculum = catalog.code(), "distribution cache hit");
            return Ok(cached);
        }

        let distribution = self.compute_distribution(records, catalog)?;
        self.cache.put(key, distribution.clone())?;
        Ok(distribution)
    }

    /// Compares the student's original progress with the convalidated distribution.
    pub fn compute_impact(&self, request: &ImpactRequest) -> Result<ImpactReport, ConvalidationError> {
        validate_mappings(&request.mappings)?;

        let origin = request.origin();
        let original = match request.student_id.as_deref() {
            Some(student_id) => {
                self.distribution_for_student(student_id, &request.original_records, origin)?
            }
            None => self.compute_distribution(&request.original_records, origin)?,
        };

        let mut warnings = Vec::new();
        let selected = select_active_mappings(&request.mappings, &mut warnings);

        let mut resolved: Vec<(&ConvalidationMapping, MappingOutcome)> = selected
            .into_iter()
            .map(|mapping| {
                let outcome = resolve_mapping(mapping, &request.original_records, &request.catalog);
                (mapping, outcome)
            })
            .collect();
        exclude_repeated_internal_subjects(&mut resolved);

        let mut mappings = BTreeMap::new();
        let mut inputs = Vec::new();
        let mut unconvalidated = 0usize;

        for (mapping, outcome) in resolved {
            match &outcome {
                MappingOutcome::Resolved { resolution, .. } => match resolution {
                    Resolution::Credited { .. } => {
                        if let Some(input) = allocation_input(mapping, resolution, &request.original_records) {
                            inputs.push(input);
                        }
                    }
                    Resolution::NotConvalidated => unconvalidated += 1,
                    Resolution::Inactive { .. } => {}
                },
                MappingOutcome::Excluded { warning } => warnings.push(warning.clone()),
            }
            mappings.insert(mapping.external_subject_id.clone(), outcome);
        }

        let convalidated = self.allocator.allocate(&request.catalog, &inputs);
        warnings.extend(original.warnings.iter().cloned());
        warnings.extend(convalidated.warnings.iter().cloned());

        let impact = analyze_impact(
            &original,
            &convalidated,
            unconvalidated,
            origin.total_credits(),
        );

        debug!(
            student = request.student_id.as_deref().unwrap_or("anonymous"),
            credit_difference = impact.credit_difference,
            additional_subjects = impact.additional_subjects_required,
            "convalidation impact computed"
        );

        Ok(ImpactReport {
            student_id: request.student_id.clone(),
            original,
            convalidated,
            impact,
            mappings,
            warnings,
        })
    }

    /// Evaluates many students on the worker pool. Failures are reported per request.
    ///
    /// Results are keyed by `student_id`, or `student-NNNN` (the request index) when absent.
    /// A request reusing an id already claimed earlier in the batch is reported as a failure.
    pub fn bulk_impact(&self, requests: &[ImpactRequest]) -> BulkImpactReport {
        let keys = bulk_keys(requests);
        let outcomes: Vec<Result<(String, ImpactReport), String>> = self.pool.install(|| {
            requests
                .par_iter()
                .zip(keys)
                .map(|(request, key)| {
                    let key = key?;
                    self.compute_impact(request)
                        .map(|impact| (key, impact))
                        .map_err(|err| err.to_string())
                })
                .collect()
        });

        let mut report = BulkImpactReport::default();
        for (index, (request, outcome)) in requests.iter().zip(outcomes).enumerate() {
            match outcome {
                Ok((key, impact)) => {
                    report.results.insert(key, impact.summary());
                }
                Err(error) => {
                    warn!(
                        index,
                        student = request.student_id.as_deref().unwrap_or("anonymous"),
                        %error,
                        "bulk convalidation failed for student"
                    );
                    report.failures.push(BulkFailure {
                        index,
                        student_id: request.student_id.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            succeeded = report.results.len(),
            failed = report.failures.len(),
            "bulk convalidation run finished"
        );
        report
    }

    /// Resolves every mapping on the worker pool, keyed by external subject. Warnings for
    /// discarded duplicates and excluded mappings are returned with the outcomes.
    pub fn bulk_resolve(
        &self,
        mappings: &[ConvalidationMapping],
        records: &[SubjectRecord],
        catalog: &CurriculumCatalog,
    ) -> Result<ResolvedMappings, ConvalidationError> {
        validate_mappings(mappings)?;

        let mut warnings = Vec::new();
        let selected = select_active_mappings(mappings, &mut warnings);

        let mut resolved: Vec<(&ConvalidationMapping, MappingOutcome)> = self.pool.install(|| {
            selected
                .par_iter()
                .map(|mapping| (*mapping, resolve_mapping(mapping, records, catalog)))
                .collect()
        });
        exclude_repeated_internal_subjects(&mut resolved);

        let mut outcomes = BTreeMap::new();
        for (mapping, outcome) in resolved {
            if let MappingOutcome::Excluded { warning } = &outcome {
                warnings.push(warning.clone());
            }
            outcomes.insert(mapping.external_subject_id.clone(), outcome);
        }

        Ok(ResolvedMappings { outcomes, warnings })
    }
}

/// Assigns each bulk request its result key, or the reason it cannot have one.
fn bulk_keys(requests: &[ImpactRequest]) -> Vec<Result<String, String>> {
    let named: HashSet<&str> = requests
        .iter()
        .filter_map(|request| request.student_id.as_deref())
        .collect();
    let mut claimed: HashMap<String, usize> = HashMap::new();

    requests
        .iter()
        .enumerate()
        .map(|(index, request)| {
            let key = match request.student_id.as_deref() {
                Some(student_id) => student_id.to_string(),
                None => {
                    let mut key = format!("student-{index:04}");
                    let mut suffix = 1;
                    while named.contains(key.as_str()) || claimed.contains_key(&key) {
                        key = format!("student-{index:04}-{suffix}");
                        suffix += 1;
                    }
                    key
                }
            };

            if let Some(first) = claimed.get(&key) {
                return Err(format!(
                    "student id {key} already used by request #{first} in this batch"
                ));
            }
            claimed.insert(key.clone(), index);
            Ok(key)
        })
        .collect()
}

fn validate_records(records: &[SubjectRecord]) -> Result<(), ConvalidationError> {
    match records
        .iter()
        .find(|record| !record.credits.is_finite() || record.credits < 0.0)
    {
        Some(record) => Err(ConvalidationError::NegativeCredits {
            code: record.code.clone(),
            credits: record.credits,
        }),
        None => Ok(()),
    }
}

fn validate_mappings(mappings: &[ConvalidationMapping]) -> Result<(), ConvalidationError> {
    match mappings.iter().find(|mapping| {
        !mapping.equivalence_percentage.is_finite()
            || !(0.0..=100.0).contains(&mapping.equivalence_percentage)
    }) {
        Some(mapping) => Err(ConvalidationError::InvalidEquivalence {
            external_subject_id: mapping.external_subject_id.clone(),
            percentage: mapping.equivalence_percentage,
        }),
        None => Ok(()),
    }
}

/// Keeps one approved mapping per external subject, in input order. The latest decision
/// wins; undated or equally dated duplicates keep the first occurrence.
fn select_active_mappings<'a>(
    mappings: &'a [ConvalidationMapping],
    warnings: &mut Vec<ConvalidationWarning>,
) -> Vec<&'a ConvalidationMapping> {
    let mut winners: BTreeMap<&str, usize> = BTreeMap::new();

    for (index, mapping) in mappings.iter().enumerate() {
        if !mapping.is_active() {
            continue;
        }

        let id = mapping.external_subject_id.as_str();
        let Some(current) = winners.get(id).copied() else {
            winners.insert(id, index);
            continue;
        };

        let replaces = match (mappings[current].decided_on, mapping.decided_on) {
            (Some(kept), Some(candidate)) => candidate > kept,
            (None, Some(_)) => true,
            _ => false,
        };

        let discarded = if replaces {
            winners.insert(id, index);
            current
        } else {
            index
        };

        warn!(subject = id, "discarding duplicate approved mapping");
        warnings.push(ConvalidationWarning::new(
            WarningKind::DuplicateMapping,
            id,
            format!(
                "approved mapping #{} superseded by another approved mapping",
                discarded + 1
            ),
        ));
    }

    let mut order: Vec<usize> = winners.into_values().collect();
    order.sort_unstable();
    order.into_iter().map(|index| &mappings[index]).collect()
}

/// The attempt that earns credit for `code`; a failed attempt followed by a pass resolves
/// against the pass.
fn eligible_record<'a>(records: &'a [SubjectRecord], code: &str) -> Option<&'a SubjectRecord> {
    records
        .iter()
        .find(|record| record.code == code && record.status.earns_credit())
}

fn resolve_mapping(
    mapping: &ConvalidationMapping,
    records: &[SubjectRecord],
    catalog: &CurriculumCatalog,
) -> MappingOutcome {
    let id = mapping.external_subject_id.as_str();
    let Some(external) = eligible_record(records, id) else {
        let (kind, detail) = if records.iter().any(|record| record.code == id) {
            (
                WarningKind::IneligibleExternalSubject,
                "the student has no passed or convalidated attempt of this subject",
            )
        } else {
            (
                WarningKind::UnknownExternalSubject,
                "no record in the student's history matches this mapping",
            )
        };
        warn!(subject = id, kind = kind.as_str(), "excluding mapping without an eligible record");
        return MappingOutcome::Excluded {
            warning: ConvalidationWarning::new(kind, id, detail),
        };
    };

    match resolve(mapping, external, catalog) {
        Ok(resolution) => MappingOutcome::Resolved {
            convalidation_type: mapping.convalidation_type,
            resolution,
        },
        Err(err) => {
            warn!(subject = id, error = %err, "excluding mapping");
            MappingOutcome::Excluded {
                warning: err.to_warning(),
            }
        }
    }
}

/// An internal subject is credited once. Later direct mappings onto it, in input order,
/// are excluded with a duplicate warning.
fn exclude_repeated_internal_subjects(resolved: &mut [(&ConvalidationMapping, MappingOutcome)]) {
    let mut credited: HashMap<String, String> = HashMap::new();

    for (mapping, outcome) in resolved.iter_mut() {
        let MappingOutcome::Resolved {
            resolution:
                Resolution::Credited {
                    internal_subject_code: Some(internal),
                    ..
                },
            ..
        } = outcome
        else {
            continue;
        };

        let first = match credited.entry(internal.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(mapping.external_subject_id.clone());
                continue;
            }
            Entry::Occupied(slot) => slot.get().clone(),
        };

        warn!(
            subject = %mapping.external_subject_id,
            internal = %internal,
            "discarding second direct mapping onto the same internal subject"
        );
        let warning = ConvalidationWarning::new(
            WarningKind::DuplicateMapping,
            mapping.external_subject_id.clone(),
            format!("internal subject {internal} is already credited through {first}"),
        );
        *outcome = MappingOutcome::Excluded { warning };
    }
}

fn allocation_input(
    mapping: &ConvalidationMapping,
    resolution: &Resolution,
    records: &[SubjectRecord],
) -> Option<AllocationInput> {
    let Resolution::Credited {
        component,
        credits,
        equivalence_scale,
        raw_type,
        ..
    } = resolution
    else {
        return None;
    };

    let name = eligible_record(records, &mapping.external_subject_id)
        .map(|record| record.name.clone())
        .unwrap_or_default();

    Some(AllocationInput {
        code: mapping.external_subject_id.clone(),
        name,
        raw_type: raw_type.clone(),
        component: Some(*component),
        credits: *credits,
        equivalence_scale: *equivalence_scale,
    })
}
