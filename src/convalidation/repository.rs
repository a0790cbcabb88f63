use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::convalidation::allocation::{ComponentDistribution, OverflowPolicy};
use crate::convalidation::catalog::CurriculumCatalog;
use crate::convalidation::domain::SubjectRecord;

/// Entries kept by [`InMemoryDistributionCache::default`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Identifies a memoized distribution: the student, the curriculum it was computed against,
/// and a fingerprint of the catalog contents, the record snapshot and the overflow policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DistributionKey {
    pub student_id: String,
    pub curriculum_code: String,
    pub fingerprint: u64,
}

impl DistributionKey {
    pub fn new(
        student_id: impl Into<String>,
        catalog: &CurriculumCatalog,
        records: &[SubjectRecord],
        policy: OverflowPolicy,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            curriculum_code: catalog.code().to_string(),
            fingerprint: fingerprint(catalog, records, policy),
        }
    }
}

fn fingerprint(catalog: &CurriculumCatalog, records: &[SubjectRecord], policy: OverflowPolicy) -> u64 {
    let mut hasher = DefaultHasher::new();
    policy.label().hash(&mut hasher);

    catalog.name().hash(&mut hasher);
    for component in catalog.components() {
        component.tag.hash(&mut hasher);
        component.display_name.hash(&mut hasher);
        component.credit_target.to_bits().hash(&mut hasher);
        component.credit_cap.map(f64::to_bits).hash(&mut hasher);
    }
    for subject in catalog.subjects() {
        subject.code.hash(&mut hasher);
        subject.name.hash(&mut hasher);
        subject.credits.to_bits().hash(&mut hasher);
        subject.raw_type.hash(&mut hasher);
    }

    records.len().hash(&mut hasher);
    for record in records {
        record.code.hash(&mut hasher);
        record.name.hash(&mut hasher);
        record.credits.to_bits().hash(&mut hasher);
        record.source.label().hash(&mut hasher);
        record.raw_type.hash(&mut hasher);
        record.status.label().hash(&mut hasher);
    }
    hasher.finish()
}

/// Read-through cache for per-student distributions, injected into the service.
pub trait DistributionCache: Send + Sync {
    fn get(&self, key: &DistributionKey) -> Result<Option<ComponentDistribution>, CacheError>;
    fn put(&self, key: DistributionKey, distribution: ComponentDistribution)
        -> Result<(), CacheError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("distribution cache unavailable: {0}")]
    Unavailable(String),
}

/// Cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDistributionCache;

impl DistributionCache for NoopDistributionCache {
    fn get(&self, _key: &DistributionKey) -> Result<Option<ComponentDistribution>, CacheError> {
        Ok(None)
    }

    fn put(
        &self,
        _key: DistributionKey,
        _distribution: ComponentDistribution,
    ) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BoundedEntries {
    entries: HashMap<DistributionKey, ComponentDistribution>,
    order: VecDeque<DistributionKey>,
}

/// Bounded cache; once full, the oldest inserted entry is evicted first.
#[derive(Debug, Clone)]
pub struct InMemoryDistributionCache {
    capacity: NonZeroUsize,
    inner: Arc<Mutex<BoundedEntries>>,
}

impl Default for InMemoryDistributionCache {
    fn default() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl InMemoryDistributionCache {
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            capacity,
            inner: Arc::new(Mutex::new(BoundedEntries::default())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|guard| guard.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> CacheError {
    CacheError::Unavailable("cache mutex poisoned".to_string())
}

impl DistributionCache for InMemoryDistributionCache {
    fn get(&self, key: &DistributionKey) -> Result<Option<ComponentDistribution>, CacheError> {
        let guard = self.inner.lock().map_err(poisoned)?;
        Ok(guard.entries.get(key).cloned())
    }

    fn put(
        &self,
        key: DistributionKey,
        distribution: ComponentDistribution,
    ) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().map_err(poisoned)?;
        if guard.entries.insert(key.clone(), distribution).is_none() {
            guard.order.push_back(key);
        }

        while guard.entries.len() > self.capacity.get() {
            let Some(oldest) = guard.order.pop_front() else {
                break;
            };
            guard.entries.remove(&oldest);
        }
        Ok(())
    }
}
