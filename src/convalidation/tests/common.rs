use std::num::NonZeroUsize;
use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::convalidation::allocation::{AllocationInput, OverflowPolicy};
use crate::convalidation::catalog::{Component, ComponentTag, CurriculumCatalog, InternalSubject};
use crate::convalidation::domain::{
    ConvalidationMapping, ConvalidationType, MappingStatus, SourceType, SubjectRecord,
    SubjectStatus,
};
use crate::convalidation::repository::{
    CacheError, DistributionCache, DistributionKey, NoopDistributionCache,
};
use crate::convalidation::service::{ConvalidationService, ImpactRequest};
use crate::convalidation::ComponentDistribution;

/// Engineering curriculum: 156 degree credits plus 12 leveling.
pub(super) fn catalog() -> CurriculumCatalog {
    catalog_with_caps(6.0, 24.0)
}

/// Same curriculum code as [`catalog`], with its optional-professional and free-elective
/// caps replaced.
pub(super) fn catalog_with_caps(optional_professional: f64, free_elective: f64) -> CurriculumCatalog {
    CurriculumCatalog::new(
        "ING-2020",
        "Ingenieria de sistemas",
        vec![
            Component::new(ComponentTag::FundamentalRequired, 60.0, Some(60.0)),
            Component::new(ComponentTag::ProfessionalRequired, 50.0, Some(50.0)),
            Component::new(ComponentTag::OptionalFundamental, 10.0, Some(10.0)),
            Component::new(
                ComponentTag::OptionalProfessional,
                6.0,
                Some(optional_professional),
            ),
            Component::new(ComponentTag::FreeElective, 24.0, Some(free_elective)),
            Component::new(ComponentTag::Thesis, 6.0, Some(6.0)),
            Component::new(ComponentTag::Leveling, 12.0, None),
        ],
        vec![
            internal_subject("MAT201", "Algebra lineal", 4.0, "fundamental"),
            internal_subject("PRO301", "Gestion de proyectos", 3.0, "profesional"),
            internal_subject("DEP100", "Deporte formativo", 2.0, "actividad_bienestar"),
        ],
    )
    .expect("valid catalog")
}

/// Curriculum whose components require no credits at all.
pub(super) fn empty_catalog() -> CurriculumCatalog {
    let components = ComponentTag::ordered()
        .into_iter()
        .map(|tag| {
            let cap = (tag == ComponentTag::FreeElective).then_some(0.0);
            Component::new(tag, 0.0, cap)
        })
        .collect();
    CurriculumCatalog::new("VACIO", "Plan sin creditos", components, Vec::new())
        .expect("valid catalog")
}

fn internal_subject(code: &str, name: &str, credits: f64, raw_type: &str) -> InternalSubject {
    InternalSubject {
        code: code.to_string(),
        name: name.to_string(),
        credits,
        raw_type: raw_type.to_string(),
    }
}

pub(super) fn record(code: &str, raw_type: &str, credits: f64) -> SubjectRecord {
    SubjectRecord {
        code: code.to_string(),
        name: format!("Asignatura {code}"),
        credits,
        source: SourceType::Internal,
        raw_type: raw_type.to_string(),
        status: SubjectStatus::Passed,
    }
}

pub(super) fn external(code: &str, raw_type: &str, credits: f64) -> SubjectRecord {
    SubjectRecord {
        source: SourceType::External,
        ..record(code, raw_type, credits)
    }
}

pub(super) fn with_status(mut record: SubjectRecord, status: SubjectStatus) -> SubjectRecord {
    record.status = status;
    record
}

pub(super) fn input(code: &str, component: ComponentTag, credits: f64) -> AllocationInput {
    AllocationInput {
        code: code.to_string(),
        name: format!("Asignatura {code}"),
        raw_type: component.as_str().to_string(),
        component: Some(component),
        credits,
        equivalence_scale: 1.0,
    }
}

fn mapping(external_subject_id: &str, convalidation_type: ConvalidationType) -> ConvalidationMapping {
    ConvalidationMapping {
        external_subject_id: external_subject_id.to_string(),
        convalidation_type,
        internal_subject_code: None,
        component_type: None,
        equivalence_percentage: 100.0,
        status: MappingStatus::Approved,
        decided_on: None,
    }
}

pub(super) fn direct(external_subject_id: &str, internal_code: &str) -> ConvalidationMapping {
    ConvalidationMapping {
        internal_subject_code: Some(internal_code.to_string()),
        ..mapping(external_subject_id, ConvalidationType::Direct)
    }
}

pub(super) fn flexible(external_subject_id: &str, component: ComponentTag) -> ConvalidationMapping {
    ConvalidationMapping {
        component_type: Some(component),
        ..mapping(external_subject_id, ConvalidationType::FlexibleComponent)
    }
}

pub(super) fn not_convalidated(external_subject_id: &str) -> ConvalidationMapping {
    mapping(external_subject_id, ConvalidationType::NotConvalidated)
}

pub(super) fn decided(mut mapping: ConvalidationMapping, y: i32, m: u32, d: u32) -> ConvalidationMapping {
    mapping.decided_on = Some(NaiveDate::from_ymd_opt(y, m, d).expect("valid date"));
    mapping
}

pub(super) fn impact_request(
    records: Vec<SubjectRecord>,
    mappings: Vec<ConvalidationMapping>,
) -> ImpactRequest {
    ImpactRequest {
        student_id: None,
        original_records: records,
        mappings,
        catalog: catalog(),
        origin_catalog: None,
    }
}

pub(super) fn service_with<C>(cache: Arc<C>, policy: OverflowPolicy) -> ConvalidationService<C>
where
    C: DistributionCache + 'static,
{
    ConvalidationService::new(cache, policy, NonZeroUsize::new(2).expect("non-zero"))
        .expect("worker pool starts")
}

pub(super) fn build_service() -> ConvalidationService<NoopDistributionCache> {
    service_with(Arc::new(NoopDistributionCache), OverflowPolicy::default())
}

pub(super) struct UnavailableCache;

impl DistributionCache for UnavailableCache {
    fn get(&self, _key: &DistributionKey) -> Result<Option<ComponentDistribution>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    fn put(
        &self,
        _key: DistributionKey,
        _distribution: ComponentDistribution,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

pub(super) fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
