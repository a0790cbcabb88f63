use serde::{Deserialize, Serialize};

use super::catalog::{ComponentTag, CurriculumCatalog};
use super::classifier::component_for_raw_type;
use super::domain::{
    ConvalidationMapping, ConvalidationType, ConvalidationWarning, MappingStatus, SubjectRecord,
    WarningKind,
};

/// How an external subject's credits enter the internal curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Resolution {
    Credited {
        component: ComponentTag,
        credits: f64,
        equivalence_scale: f64,
        raw_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        internal_subject_code: Option<String>,
    },
    NotConvalidated,
    /// Pending or rejected mappings take no part in allocation.
    Inactive { status: MappingStatus },
}

impl Resolution {
    pub fn component(&self) -> Option<ComponentTag> {
        match self {
            Resolution::Credited { component, .. } => Some(*component),
            Resolution::NotConvalidated | Resolution::Inactive { .. } => None,
        }
    }

    pub fn equivalence_scale(&self) -> f64 {
        match self {
            Resolution::Credited {
                equivalence_scale, ..
            } => *equivalence_scale,
            Resolution::NotConvalidated | Resolution::Inactive { .. } => 0.0,
        }
    }

    /// Scaled credits the subject contributes before caps apply.
    pub fn effective_credits(&self) -> f64 {
        match self {
            Resolution::Credited {
                credits,
                equivalence_scale,
                ..
            } => credits * equivalence_scale,
            Resolution::NotConvalidated | Resolution::Inactive { .. } => 0.0,
        }
    }
}

/// Per-mapping failures. Each excludes one subject and becomes a warning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolutionError {
    #[error("direct mapping for {external_subject_id} references unknown internal subject {internal_subject_code}")]
    DirectMappingMissingInternalSubject {
        external_subject_id: String,
        internal_subject_code: String,
    },
    #[error("flexible mapping for {external_subject_id} does not name a component")]
    MissingComponentType { external_subject_id: String },
    #[error("internal subject {internal_subject_code} (mapped from {external_subject_id}) has unclassifiable type '{raw_type}'")]
    UnclassifiableSubject {
        external_subject_id: String,
        internal_subject_code: String,
        raw_type: String,
    },
    #[error("mapping for {external_subject_id} is inconsistent: {detail}")]
    InconsistentMapping {
        external_subject_id: String,
        detail: &'static str,
    },
}

impl ResolutionError {
    pub fn external_subject_id(&self) -> &str {
        match self {
            ResolutionError::DirectMappingMissingInternalSubject {
                external_subject_id,
                ..
            }
            | ResolutionError::MissingComponentType {
                external_subject_id,
            }
            | ResolutionError::UnclassifiableSubject {
                external_subject_id,
                ..
            }
            | ResolutionError::InconsistentMapping {
                external_subject_id,
                ..
            } => external_subject_id,
        }
    }

    pub fn kind(&self) -> WarningKind {
        match self {
            ResolutionError::DirectMappingMissingInternalSubject { .. } => {
                WarningKind::DirectMappingMissingInternalSubject
            }
            ResolutionError::MissingComponentType { .. } => WarningKind::MissingComponentType,
            ResolutionError::UnclassifiableSubject { .. } => WarningKind::UnclassifiableSubject,
            ResolutionError::InconsistentMapping { .. } => WarningKind::InconsistentMapping,
        }
    }

    pub fn to_warning(&self) -> ConvalidationWarning {
        ConvalidationWarning::new(self.kind(), self.external_subject_id(), self.to_string())
    }
}

/// Decides the component, base credits and equivalence scale for one mapping.
pub fn resolve(
    mapping: &ConvalidationMapping,
    external_subject: &SubjectRecord,
    catalog: &CurriculumCatalog,
) -> Result<Resolution, ResolutionError> {
    if !mapping.is_active() {
        return Ok(Resolution::Inactive {
            status: mapping.status,
        });
    }

    let external_subject_id = mapping.external_subject_id.clone();
    let internal_code = mapping
        .internal_subject_code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty());

    match mapping.convalidation_type {
        ConvalidationType::Direct => {
            let Some(internal_code) = internal_code else {
                return Err(ResolutionError::InconsistentMapping {
                    external_subject_id,
                    detail: "direct mapping without internal subject code",
                });
            };

            let internal = catalog.internal_subject(internal_code).ok_or_else(|| {
                ResolutionError::DirectMappingMissingInternalSubject {
                    external_subject_id: external_subject_id.clone(),
                    internal_subject_code: internal_code.to_string(),
                }
            })?;

            let component = component_for_raw_type(&internal.raw_type)
                .or(mapping.component_type)
                .ok_or_else(|| ResolutionError::UnclassifiableSubject {
                    external_subject_id: external_subject_id.clone(),
                    internal_subject_code: internal.code.clone(),
                    raw_type: internal.raw_type.clone(),
                })?;

            Ok(Resolution::Credited {
                component,
                credits: internal.credits,
                equivalence_scale: mapping.equivalence_scale(),
                raw_type: internal.raw_type.clone(),
                internal_subject_code: Some(internal.code.clone()),
            })
        }
        ConvalidationType::FlexibleComponent => {
            if internal_code.is_some() {
                return Err(ResolutionError::InconsistentMapping {
                    external_subject_id,
                    detail: "only direct mappings may name an internal subject",
                });
            }

            let component = mapping
                .component_type
                .ok_or(ResolutionError::MissingComponentType {
                    external_subject_id,
                })?;

            Ok(Resolution::Credited {
                component,
                credits: external_subject.credits,
                equivalence_scale: mapping.equivalence_scale(),
                raw_type: component.as_str().to_string(),
                internal_subject_code: None,
            })
        }
        ConvalidationType::NotConvalidated => {
            if internal_code.is_some() {
                return Err(ResolutionError::InconsistentMapping {
                    external_subject_id,
                    detail: "only direct mappings may name an internal subject",
                });
            }
            Ok(Resolution::NotConvalidated)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convalidation::catalog::{Component, InternalSubject};
    use crate::convalidation::domain::{SourceType, SubjectStatus};

    fn catalog() -> CurriculumCatalog {
        let components = ComponentTag::ordered()
            .into_iter()
            .map(|tag| Component::new(tag, 10.0, Some(10.0)))
            .collect();
        let subjects = vec![
            InternalSubject {
                code: "MAT101".to_string(),
                name: "Calculo diferencial".to_string(),
                credits: 4.0,
                raw_type: "fundamental".to_string(),
            },
            InternalSubject {
                code: "SEM900".to_string(),
                name: "Seminario".to_string(),
                credits: 2.0,
                raw_type: "seminario".to_string(),
            },
        ];
        CurriculumCatalog::new("ING-2020", "Ingenieria", components, subjects).expect("valid")
    }

    fn external(code: &str, credits: f64) -> SubjectRecord {
        SubjectRecord {
            code: code.to_string(),
            name: format!("External {code}"),
            credits,
            source: SourceType::External,
            raw_type: "externa".to_string(),
            status: SubjectStatus::Convalidated,
        }
    }

    fn mapping(
        external_subject_id: &str,
        convalidation_type: ConvalidationType,
        internal: Option<&str>,
        component: Option<ComponentTag>,
    ) -> ConvalidationMapping {
        ConvalidationMapping {
            external_subject_id: external_subject_id.to_string(),
            convalidation_type,
            internal_subject_code: internal.map(str::to_string),
            component_type: component,
            equivalence_percentage: 100.0,
            status: MappingStatus::Approved,
            decided_on: None,
        }
    }

    #[test]
    fn direct_mapping_uses_internal_subject_type_and_credits() {
        let mut direct = mapping("CAL-EXT", ConvalidationType::Direct, Some("MAT101"), None);
        direct.equivalence_percentage = 80.0;

        let resolution =
            resolve(&direct, &external("CAL-EXT", 6.0), &catalog()).expect("resolves");

        assert_eq!(resolution.component(), Some(ComponentTag::FundamentalRequired));
        assert_eq!(resolution.equivalence_scale(), 0.8);
        assert!((resolution.effective_credits() - 3.2).abs() < 1e-9);
    }

    #[test]
    fn direct_mapping_falls_back_to_component_type() {
        let direct = mapping(
            "SEM-EXT",
            ConvalidationType::Direct,
            Some("SEM900"),
            Some(ComponentTag::FreeElective),
        );
        let resolution =
            resolve(&direct, &external("SEM-EXT", 2.0), &catalog()).expect("resolves");
        assert_eq!(resolution.component(), Some(ComponentTag::FreeElective));

        let without_fallback =
            mapping("SEM-EXT", ConvalidationType::Direct, Some("SEM900"), None);
        let error = resolve(&without_fallback, &external("SEM-EXT", 2.0), &catalog())
            .expect_err("unclassifiable");
        assert_eq!(error.kind(), WarningKind::UnclassifiableSubject);
    }

    #[test]
    fn direct_mapping_to_unknown_subject_is_reported() {
        let direct = mapping("ALG-EXT", ConvalidationType::Direct, Some("MAT999"), None);
        let error = resolve(&direct, &external("ALG-EXT", 3.0), &catalog())
            .expect_err("missing internal subject");

        assert_eq!(
            error,
            ResolutionError::DirectMappingMissingInternalSubject {
                external_subject_id: "ALG-EXT".to_string(),
                internal_subject_code: "MAT999".to_string(),
            }
        );
        assert_eq!(error.to_warning().subject, "ALG-EXT");
    }

    #[test]
    fn flexible_mapping_uses_external_credits() {
        let mut flexible = mapping(
            "ART-EXT",
            ConvalidationType::FlexibleComponent,
            None,
            Some(ComponentTag::OptionalProfessional),
        );
        flexible.equivalence_percentage = 50.0;

        let resolution =
            resolve(&flexible, &external("ART-EXT", 4.0), &catalog()).expect("resolves");

        assert_eq!(
            resolution.component(),
            Some(ComponentTag::OptionalProfessional)
        );
        assert_eq!(resolution.effective_credits(), 2.0);
    }

    #[test]
    fn flexible_mapping_requires_component() {
        let flexible = mapping("ART-EXT", ConvalidationType::FlexibleComponent, None, None);
        let error =
            resolve(&flexible, &external("ART-EXT", 4.0), &catalog()).expect_err("missing");
        assert_eq!(error.kind(), WarningKind::MissingComponentType);
    }

    #[test]
    fn not_convalidated_contributes_nothing() {
        let none = mapping("QUI101E", ConvalidationType::NotConvalidated, None, None);
        let resolution =
            resolve(&none, &external("QUI101E", 3.0), &catalog()).expect("resolves");

        assert_eq!(resolution, Resolution::NotConvalidated);
        assert_eq!(resolution.component(), None);
        assert_eq!(resolution.effective_credits(), 0.0);
        assert_eq!(resolution.equivalence_scale(), 0.0);
    }

    #[test]
    fn inactive_mappings_are_skipped() {
        let mut pending = mapping("CAL-EXT", ConvalidationType::Direct, Some("MAT999"), None);
        pending.status = MappingStatus::Pending;

        let resolution =
            resolve(&pending, &external("CAL-EXT", 3.0), &catalog()).expect("skipped");
        assert_eq!(
            resolution,
            Resolution::Inactive {
                status: MappingStatus::Pending
            }
        );
    }

    #[test]
    fn internal_code_only_allowed_on_direct_mappings() {
        let flexible = mapping(
            "ART-EXT",
            ConvalidationType::FlexibleComponent,
            Some("MAT101"),
            Some(ComponentTag::FreeElective),
        );
        let error =
            resolve(&flexible, &external("ART-EXT", 4.0), &catalog()).expect_err("inconsistent");
        assert_eq!(error.kind(), WarningKind::InconsistentMapping);

        let direct = mapping("ART-EXT", ConvalidationType::Direct, Some("  "), None);
        let error =
            resolve(&direct, &external("ART-EXT", 4.0), &catalog()).expect_err("inconsistent");
        assert_eq!(error.kind(), WarningKind::InconsistentMapping);
    }
}
