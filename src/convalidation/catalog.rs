use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// The seven credit buckets a curriculum organizes its requirements into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentTag {
    FundamentalRequired,
    ProfessionalRequired,
    OptionalFundamental,
    OptionalProfessional,
    FreeElective,
    Thesis,
    Leveling,
}

impl ComponentTag {
    pub const COUNT: usize = 7;

    pub const fn ordered() -> [Self; Self::COUNT] {
        [
            Self::FundamentalRequired,
            Self::ProfessionalRequired,
            Self::OptionalFundamental,
            Self::OptionalProfessional,
            Self::FreeElective,
            Self::Thesis,
            Self::Leveling,
        ]
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FundamentalRequired => "fundamental_required",
            Self::ProfessionalRequired => "professional_required",
            Self::OptionalFundamental => "optional_fundamental",
            Self::OptionalProfessional => "optional_professional",
            Self::FreeElective => "free_elective",
            Self::Thesis => "thesis",
            Self::Leveling => "leveling",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::FundamentalRequired => "Fundamental (required)",
            Self::ProfessionalRequired => "Professional (required)",
            Self::OptionalFundamental => "Fundamental (optional)",
            Self::OptionalProfessional => "Professional (optional)",
            Self::FreeElective => "Free elective",
            Self::Thesis => "Thesis",
            Self::Leveling => "Leveling",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::FundamentalRequired => 0,
            Self::ProfessionalRequired => 1,
            Self::OptionalFundamental => 2,
            Self::OptionalProfessional => 3,
            Self::FreeElective => 4,
            Self::Thesis => 5,
            Self::Leveling => 6,
        }
    }

    /// Leveling credits are tracked but never count toward the degree.
    pub const fn counts_toward_degree(self) -> bool {
        !matches!(self, Self::Leveling)
    }
}

impl fmt::Display for ComponentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentTag {
    type Err = CatalogError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        Self::ordered()
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| CatalogError::UnknownComponent(trimmed.to_string()))
    }
}

/// Catalog entry describing a component's credit requirement and cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Component {
    pub tag: ComponentTag,
    pub display_name: String,
    pub credit_target: f64,
    #[serde(default)]
    pub credit_cap: Option<f64>,
}

impl Component {
    pub fn new(tag: ComponentTag, credit_target: f64, credit_cap: Option<f64>) -> Self {
        Self {
            tag,
            display_name: tag.label().to_string(),
            credit_target,
            credit_cap,
        }
    }
}

/// Subject declared by the internal curriculum, used to resolve direct convalidations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalSubject {
    pub code: String,
    pub name: String,
    pub credits: f64,
    pub raw_type: String,
}

/// Validated curriculum definition: all seven components exactly once plus the subject list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CatalogDocument", into = "CatalogDocument")]
pub struct CurriculumCatalog {
    code: String,
    name: String,
    components: [Component; ComponentTag::COUNT],
    subjects: Vec<InternalSubject>,
    subject_index: BTreeMap<String, usize>,
}

/// Wire shape of a catalog before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogDocument {
    pub code: String,
    pub name: String,
    pub components: Vec<Component>,
    #[serde(default)]
    pub subjects: Vec<InternalSubject>,
}

impl CurriculumCatalog {
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        components: Vec<Component>,
        subjects: Vec<InternalSubject>,
    ) -> Result<Self, CatalogError> {
        Self::try_from(CatalogDocument {
            code: code.into(),
            name: name.into(),
            components,
            subjects,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn component(&self, tag: ComponentTag) -> &Component {
        &self.components[tag.index()]
    }

    /// Resolves a wire tag such as `"free_elective"` to its catalog entry.
    pub fn lookup(&self, raw_tag: &str) -> Result<&Component, CatalogError> {
        let tag = raw_tag.parse::<ComponentTag>()?;
        Ok(self.component(tag))
    }

    /// Components in catalog order.
    pub fn components(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn cap(&self, tag: ComponentTag) -> Option<f64> {
        self.component(tag).credit_cap
    }

    /// Credits the curriculum requires for the degree, leveling excluded.
    pub fn total_credits(&self) -> f64 {
        self.components
            .iter()
            .filter(|component| component.tag.counts_toward_degree())
            .map(|component| component.credit_target)
            .sum()
    }

    pub fn internal_subject(&self, code: &str) -> Option<&InternalSubject> {
        self.subject_index
            .get(code.trim())
            .map(|position| &self.subjects[*position])
    }

    pub fn subjects(&self) -> &[InternalSubject] {
        &self.subjects
    }
}

impl TryFrom<CatalogDocument> for CurriculumCatalog {
    type Error = CatalogError;

    fn try_from(document: CatalogDocument) -> Result<Self, Self::Error> {
        let mut slots: [Option<Component>; ComponentTag::COUNT] = Default::default();

        for component in document.components {
            validate_credits(component.tag, "credit_target", component.credit_target)?;
            if let Some(cap) = component.credit_cap {
                validate_credits(component.tag, "credit_cap", cap)?;
            }

            let slot = &mut slots[component.tag.index()];
            if slot.is_some() {
                return Err(CatalogError::DuplicateComponent(component.tag));
            }
            *slot = Some(component);
        }

        let mut components = Vec::with_capacity(ComponentTag::COUNT);
        for (tag, slot) in ComponentTag::ordered().into_iter().zip(slots) {
            components.push(slot.ok_or(CatalogError::MissingComponent(tag))?);
        }

        let free_elective = &components[ComponentTag::FreeElective.index()];
        if free_elective.credit_cap.is_none() {
            return Err(CatalogError::MissingCap(ComponentTag::FreeElective));
        }

        let components: [Component; ComponentTag::COUNT] = components
            .try_into()
            .map_err(|_| CatalogError::MissingComponent(ComponentTag::Leveling))?;

        let mut subject_index = BTreeMap::new();
        for (position, subject) in document.subjects.iter().enumerate() {
            if !subject.credits.is_finite() || subject.credits < 0.0 {
                return Err(CatalogError::InvalidSubjectCredits {
                    code: subject.code.clone(),
                    credits: subject.credits,
                });
            }
            let code = subject.code.trim().to_string();
            if subject_index.insert(code.clone(), position).is_some() {
                return Err(CatalogError::DuplicateSubject(code));
            }
        }

        Ok(Self {
            code: document.code,
            name: document.name,
            components,
            subjects: document.subjects,
            subject_index,
        })
    }
}

impl From<CurriculumCatalog> for CatalogDocument {
    fn from(catalog: CurriculumCatalog) -> Self {
        Self {
            code: catalog.code,
            name: catalog.name,
            components: catalog.components.into_iter().collect(),
            subjects: catalog.subjects,
        }
    }
}

fn validate_credits(tag: ComponentTag, field: &'static str, value: f64) -> Result<(), CatalogError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CatalogError::InvalidCredits {
            component: tag,
            field,
            value,
        })
    }
}

/// Structural problems with a curriculum definition. These abort a computation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown component '{0}'")]
    UnknownComponent(String),
    #[error("curriculum does not define component {0}")]
    MissingComponent(ComponentTag),
    #[error("curriculum defines component {0} more than once")]
    DuplicateComponent(ComponentTag),
    #[error("component {0} must declare a credit cap")]
    MissingCap(ComponentTag),
    #[error("component {component} has invalid {field} {value}")]
    InvalidCredits {
        component: ComponentTag,
        field: &'static str,
        value: f64,
    },
    #[error("internal subject {code} has invalid credits {credits}")]
    InvalidSubjectCredits { code: String, credits: f64 },
    #[error("internal subject {0} is declared more than once")]
    DuplicateSubject(String),
}
