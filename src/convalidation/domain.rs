use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::catalog::ComponentTag;

/// Where a subject was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Internal,
    External,
}

impl Default for SourceType {
    fn default() -> Self {
        Self::Internal
    }
}

impl SourceType {
    pub const fn label(self) -> &'static str {
        match self {
            SourceType::Internal => "internal",
            SourceType::External => "external",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStatus {
    Passed,
    Failed,
    Enrolled,
    Convalidated,
}

impl SubjectStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubjectStatus::Passed => "passed",
            SubjectStatus::Failed => "failed",
            SubjectStatus::Enrolled => "enrolled",
            SubjectStatus::Convalidated => "convalidated",
        }
    }

    /// Only completed work earns credit.
    pub const fn earns_credit(self) -> bool {
        matches!(self, SubjectStatus::Passed | SubjectStatus::Convalidated)
    }
}

/// One subject in a student's academic history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub code: String,
    pub name: String,
    pub credits: f64,
    #[serde(default)]
    pub source: SourceType,
    pub raw_type: String,
    pub status: SubjectStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvalidationType {
    Direct,
    FlexibleComponent,
    NotConvalidated,
}

impl ConvalidationType {
    pub const fn label(self) -> &'static str {
        match self {
            ConvalidationType::Direct => "direct",
            ConvalidationType::FlexibleComponent => "flexible_component",
            ConvalidationType::NotConvalidated => "not_convalidated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingStatus {
    Approved,
    Pending,
    Rejected,
}

impl MappingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            MappingStatus::Approved => "approved",
            MappingStatus::Pending => "pending",
            MappingStatus::Rejected => "rejected",
        }
    }
}

fn full_equivalence() -> f64 {
    100.0
}

/// Links an external subject to its resolution in the internal curriculum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvalidationMapping {
    pub external_subject_id: String,
    pub convalidation_type: ConvalidationType,
    #[serde(default)]
    pub internal_subject_code: Option<String>,
    #[serde(default)]
    pub component_type: Option<ComponentTag>,
    #[serde(default = "full_equivalence")]
    pub equivalence_percentage: f64,
    pub status: MappingStatus,
    #[serde(default)]
    pub decided_on: Option<NaiveDate>,
}

impl ConvalidationMapping {
    pub fn is_active(&self) -> bool {
        self.status == MappingStatus::Approved
    }

    pub fn equivalence_scale(&self) -> f64 {
        self.equivalence_percentage / 100.0
    }
}

/// Per-subject problem that excludes one record without aborting the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    UnclassifiableSubject,
    DirectMappingMissingInternalSubject,
    MissingComponentType,
    InconsistentMapping,
    UnknownExternalSubject,
    IneligibleExternalSubject,
    DuplicateMapping,
}

impl WarningKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            WarningKind::UnclassifiableSubject => "unclassifiable_subject",
            WarningKind::DirectMappingMissingInternalSubject => {
                "direct_mapping_missing_internal_subject"
            }
            WarningKind::MissingComponentType => "missing_component_type",
            WarningKind::InconsistentMapping => "inconsistent_mapping",
            WarningKind::UnknownExternalSubject => "unknown_external_subject",
            WarningKind::IneligibleExternalSubject => "ineligible_external_subject",
            WarningKind::DuplicateMapping => "duplicate_mapping",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            WarningKind::UnclassifiableSubject => "Unclassifiable subject",
            WarningKind::DirectMappingMissingInternalSubject => {
                "Direct mapping without internal subject"
            }
            WarningKind::MissingComponentType => "Missing component type",
            WarningKind::InconsistentMapping => "Inconsistent mapping",
            WarningKind::UnknownExternalSubject => "Unknown external subject",
            WarningKind::IneligibleExternalSubject => "Ineligible external subject",
            WarningKind::DuplicateMapping => "Duplicate mapping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvalidationWarning {
    pub kind: WarningKind,
    pub subject: String,
    pub detail: String,
}

impl ConvalidationWarning {
    pub fn new(kind: WarningKind, subject: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            detail: detail.into(),
        }
    }
}
