mod parser;

use std::io::Read;
use std::path::Path;

use super::catalog::{CatalogDocument, CatalogError, CurriculumCatalog};
use super::domain::{ConvalidationMapping, SubjectRecord};
use parser::{MappingRow, RecordRow};

#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    InvalidDate {
        line: usize,
        value: String,
    },
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    Catalog(CatalogError),
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read import file: {}", err),
            ImportError::Csv(err) => write!(f, "invalid CSV data: {}", err),
            ImportError::Json(err) => write!(f, "invalid curriculum document: {}", err),
            ImportError::InvalidDate { line, value } => {
                write!(f, "line {}: '{}' is not a YYYY-MM-DD date", line, value)
            }
            ImportError::InvalidField { line, field, value } => {
                write!(f, "line {}: unrecognised {} '{}'", line, field, value)
            }
            ImportError::Catalog(err) => write!(f, "invalid curriculum: {}", err),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Json(err) => Some(err),
            ImportError::Catalog(err) => Some(err),
            ImportError::InvalidDate { .. } | ImportError::InvalidField { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<CatalogError> for ImportError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Reads a student's academic history: `code,name,credits,source,type,status`.
pub fn parse_subject_records<R: Read>(reader: R) -> Result<Vec<SubjectRecord>, ImportError> {
    let mut csv_reader = csv_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<RecordRow>().enumerate() {
        records.push(row?.into_record(index)?);
    }

    Ok(records)
}

/// Reads convalidation decisions: `external_subject_id,convalidation_type,
/// internal_subject_code,component_type,equivalence_percentage,status,decided_on`.
pub fn parse_mappings<R: Read>(reader: R) -> Result<Vec<ConvalidationMapping>, ImportError> {
    let mut csv_reader = csv_reader(reader);
    let mut mappings = Vec::new();

    for (index, row) in csv_reader.deserialize::<MappingRow>().enumerate() {
        mappings.push(row?.into_mapping(index)?);
    }

    Ok(mappings)
}

pub fn parse_catalog<R: Read>(reader: R) -> Result<CurriculumCatalog, ImportError> {
    let document: CatalogDocument = serde_json::from_reader(reader)?;
    Ok(CurriculumCatalog::try_from(document)?)
}

pub fn subject_records_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<SubjectRecord>, ImportError> {
    parse_subject_records(std::fs::File::open(path)?)
}

pub fn mappings_from_path<P: AsRef<Path>>(
    path: P,
) -> Result<Vec<ConvalidationMapping>, ImportError> {
    parse_mappings(std::fs::File::open(path)?)
}

pub fn catalog_from_path<P: AsRef<Path>>(path: P) -> Result<CurriculumCatalog, ImportError> {
    let file = std::fs::File::open(path)?;
    parse_catalog(std::io::BufReader::new(file))
}
