//! Curriculum credit distribution and convalidation impact.
//!
//! Records are classified into the seven curriculum components, folded through the credit
//! allocator under each component's cap, and compared against the distribution produced by
//! the student's approved convalidation mappings.

pub mod allocation;
pub mod catalog;
pub mod classifier;
pub mod domain;
pub mod impact;
pub mod import;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use allocation::{
    AllocationInput, ComponentDistribution, ComponentTally, CreditAllocator, CreditPortion,
    OverflowPolicy, SubjectAllocation,
};
pub use catalog::{CatalogError, Component, ComponentTag, CurriculumCatalog, InternalSubject};
pub use classifier::{classify, ClassificationError};
pub use domain::{
    ConvalidationMapping, ConvalidationType, ConvalidationWarning, MappingStatus, SourceType,
    SubjectRecord, SubjectStatus, WarningKind,
};
pub use impact::views::{DistributionView, ImpactSummaryView, WarningView};
pub use impact::{analyze_impact, ComponentBreakdown, ImpactResult};
pub use import::ImportError;
pub use repository::{
    CacheError, DistributionCache, DistributionKey, InMemoryDistributionCache,
    NoopDistributionCache, DEFAULT_CACHE_CAPACITY,
};
pub use resolver::{resolve, Resolution, ResolutionError};
pub use router::convalidation_router;
pub use service::{
    BulkFailure, BulkImpactReport, ConvalidationError, ConvalidationService, ImpactReport,
    ImpactRequest, MappingOutcome, ResolvedMappings,
};
