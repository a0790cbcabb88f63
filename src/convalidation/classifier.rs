use std::collections::HashMap;
use std::sync::OnceLock;

use super::catalog::ComponentTag;
use super::domain::SubjectRecord;

static RAW_TYPE_MAP: OnceLock<HashMap<String, ComponentTag>> = OnceLock::new();

/// Curriculum-declared type strings and the component they feed.
const RAW_TYPE_TO_COMPONENT: &[(&str, ComponentTag)] = &[
    ("fundamental", ComponentTag::FundamentalRequired),
    ("optativa_fundamentacion", ComponentTag::OptionalFundamental),
    ("profesional", ComponentTag::ProfessionalRequired),
    ("optativa_profesional", ComponentTag::OptionalProfessional),
    ("libre_eleccion", ComponentTag::FreeElective),
    ("nivelacion", ComponentTag::Leveling),
    ("trabajo_grado", ComponentTag::Thesis),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassificationError {
    #[error("subject {code} has unclassifiable type '{raw_type}'")]
    UnclassifiableSubject { code: String, raw_type: String },
}

/// Maps a subject to its component. An explicit override (flexible convalidations) wins.
pub fn classify(
    record: &SubjectRecord,
    override_tag: Option<ComponentTag>,
) -> Result<ComponentTag, ClassificationError> {
    if let Some(tag) = override_tag {
        return Ok(tag);
    }

    component_for_raw_type(&record.raw_type).ok_or_else(|| {
        ClassificationError::UnclassifiableSubject {
            code: record.code.clone(),
            raw_type: record.raw_type.clone(),
        }
    })
}

/// Table lookup over the normalized type string. Canonical component tags map to themselves.
pub fn component_for_raw_type(raw_type: &str) -> Option<ComponentTag> {
    raw_type_map().get(&normalize_raw_type(raw_type)).copied()
}

fn raw_type_map() -> &'static HashMap<String, ComponentTag> {
    RAW_TYPE_MAP.get_or_init(|| {
        let mut map =
            HashMap::with_capacity(RAW_TYPE_TO_COMPONENT.len() + ComponentTag::COUNT);
        for (raw_type, tag) in RAW_TYPE_TO_COMPONENT {
            map.insert(normalize_raw_type(raw_type), *tag);
        }
        for tag in ComponentTag::ordered() {
            map.insert(tag.as_str().to_string(), tag);
        }
        map
    })
}

pub(crate) fn normalize_raw_type(value: &str) -> String {
    let cleaned = value.replace(['\u{feff}', '\u{200b}'], "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    collapsed
        .to_lowercase()
        .chars()
        .map(|ch| match ch {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' | 'ü' => 'u',
            '-' => '_',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convalidation::domain::{SourceType, SubjectStatus};

    fn record(raw_type: &str) -> SubjectRecord {
        SubjectRecord {
            code: "MAT101".to_string(),
            name: "Calculo diferencial".to_string(),
            credits: 4.0,
            source: SourceType::Internal,
            raw_type: raw_type.to_string(),
            status: SubjectStatus::Passed,
        }
    }

    #[test]
    fn table_covers_every_component() {
        for tag in ComponentTag::ordered() {
            assert!(
                RAW_TYPE_TO_COMPONENT.iter().any(|(_, mapped)| *mapped == tag),
                "no raw type feeds {tag}"
            );
        }
    }

    #[test]
    fn classifies_declared_types() {
        assert_eq!(
            classify(&record("fundamental"), None),
            Ok(ComponentTag::FundamentalRequired)
        );
        assert_eq!(
            classify(&record("optativa_profesional"), None),
            Ok(ComponentTag::OptionalProfessional)
        );
        assert_eq!(
            classify(&record("trabajo_grado"), None),
            Ok(ComponentTag::Thesis)
        );
        assert_eq!(
            classify(&record("nivelacion"), None),
            Ok(ComponentTag::Leveling)
        );
    }

    #[test]
    fn normalizes_case_whitespace_and_hyphens() {
        assert_eq!(
            component_for_raw_type("\u{feff} Libre  Eleccion "),
            Some(ComponentTag::FreeElective)
        );
        assert_eq!(
            component_for_raw_type("Nivelación"),
            Some(ComponentTag::Leveling)
        );
        assert_eq!(
            component_for_raw_type("OPTATIVA-FUNDAMENTACION"),
            Some(ComponentTag::OptionalFundamental)
        );
        assert_eq!(
            component_for_raw_type("professional_required"),
            Some(ComponentTag::ProfessionalRequired)
        );
    }

    #[test]
    fn override_wins_over_raw_type() {
        assert_eq!(
            classify(&record("fundamental"), Some(ComponentTag::FreeElective)),
            Ok(ComponentTag::FreeElective)
        );
        assert_eq!(
            classify(&record("seminario"), Some(ComponentTag::Thesis)),
            Ok(ComponentTag::Thesis)
        );
    }

    #[test]
    fn unknown_types_are_unclassifiable() {
        assert_eq!(
            classify(&record("seminario"), None),
            Err(ClassificationError::UnclassifiableSubject {
                code: "MAT101".to_string(),
                raw_type: "seminario".to_string(),
            })
        );
    }
}
