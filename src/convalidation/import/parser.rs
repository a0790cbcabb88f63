use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::ImportError;
use crate::convalidation::catalog::ComponentTag;
use crate::convalidation::classifier::component_for_raw_type;
use crate::convalidation::domain::{
    ConvalidationMapping, ConvalidationType, MappingStatus, SourceType, SubjectRecord,
    SubjectStatus,
};

/// Header row occupies line 1.
const FIRST_DATA_LINE: usize = 2;

#[derive(Debug, Deserialize)]
pub(super) struct RecordRow {
    code: String,
    name: String,
    credits: f64,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    source: Option<String>,
    #[serde(rename = "type", alias = "raw_type")]
    raw_type: String,
    status: String,
}

impl RecordRow {
    pub(super) fn into_record(self, index: usize) -> Result<SubjectRecord, ImportError> {
        let line = index + FIRST_DATA_LINE;
        let source = match self.source.as_deref() {
            None => SourceType::default(),
            Some(value) => parse_source(value).ok_or_else(|| invalid(line, "source", value))?,
        };
        let status =
            parse_status(&self.status).ok_or_else(|| invalid(line, "status", &self.status))?;

        Ok(SubjectRecord {
            code: self.code,
            name: self.name,
            credits: self.credits,
            source,
            raw_type: self.raw_type,
            status,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct MappingRow {
    external_subject_id: String,
    convalidation_type: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    internal_subject_code: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    component_type: Option<String>,
    #[serde(default)]
    equivalence_percentage: Option<f64>,
    status: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    decided_on: Option<String>,
}

impl MappingRow {
    pub(super) fn into_mapping(self, index: usize) -> Result<ConvalidationMapping, ImportError> {
        let line = index + FIRST_DATA_LINE;
        let convalidation_type = parse_convalidation_type(&self.convalidation_type)
            .ok_or_else(|| invalid(line, "convalidation_type", &self.convalidation_type))?;
        let component_type = match self.component_type.as_deref() {
            None => None,
            Some(value) => Some(parse_component(value).ok_or_else(|| {
                invalid(line, "component_type", value)
            })?),
        };
        let status =
            parse_mapping_status(&self.status).ok_or_else(|| invalid(line, "status", &self.status))?;
        let decided_on = match self.decided_on.as_deref() {
            None => None,
            Some(value) => Some(parse_date(value).ok_or_else(|| ImportError::InvalidDate {
                line,
                value: value.to_string(),
            })?),
        };

        Ok(ConvalidationMapping {
            external_subject_id: self.external_subject_id,
            convalidation_type,
            internal_subject_code: self.internal_subject_code,
            component_type,
            equivalence_percentage: self.equivalence_percentage.unwrap_or(100.0),
            status,
            decided_on,
        })
    }
}

fn invalid(line: usize, field: &'static str, value: &str) -> ImportError {
    ImportError::InvalidField {
        line,
        field,
        value: value.to_string(),
    }
}

fn normalized(value: &str) -> String {
    value.trim().to_ascii_lowercase().replace([' ', '-'], "_")
}

fn parse_source(value: &str) -> Option<SourceType> {
    match normalized(value).as_str() {
        "internal" | "interna" => Some(SourceType::Internal),
        "external" | "externa" => Some(SourceType::External),
        _ => None,
    }
}

fn parse_status(value: &str) -> Option<SubjectStatus> {
    match normalized(value).as_str() {
        "passed" | "aprobada" => Some(SubjectStatus::Passed),
        "failed" | "reprobada" => Some(SubjectStatus::Failed),
        "enrolled" | "inscrita" => Some(SubjectStatus::Enrolled),
        "convalidated" | "convalidada" => Some(SubjectStatus::Convalidated),
        _ => None,
    }
}

fn parse_convalidation_type(value: &str) -> Option<ConvalidationType> {
    match normalized(value).as_str() {
        "direct" => Some(ConvalidationType::Direct),
        "flexible_component" | "flexible" => Some(ConvalidationType::FlexibleComponent),
        "not_convalidated" | "none" => Some(ConvalidationType::NotConvalidated),
        _ => None,
    }
}

fn parse_mapping_status(value: &str) -> Option<MappingStatus> {
    match normalized(value).as_str() {
        "approved" => Some(MappingStatus::Approved),
        "pending" => Some(MappingStatus::Pending),
        "rejected" => Some(MappingStatus::Rejected),
        _ => None,
    }
}

fn parse_component(value: &str) -> Option<ComponentTag> {
    value
        .parse::<ComponentTag>()
        .ok()
        .or_else(|| component_for_raw_type(value))
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d/%m/%Y"))
        .ok()
}
