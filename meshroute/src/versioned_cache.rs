//! Immutable, version-stamped snapshots shared across the discovery tree.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static VERSION: AtomicU64 = AtomicU64::new(0);

/// Returns a process-wide version stamp, strictly greater than every stamp
/// handed out before it.
pub fn next_version() -> u64 {
    VERSION.fetch_add(1, Ordering::SeqCst) + 1
}

/// Collections that can tell whether they hold anything.
pub trait CacheData {
    fn is_empty(&self) -> bool;
}

impl<T> CacheData for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

/// A named snapshot of `T` tagged with the version it was produced at.
///
/// A cache is never mutated: when the underlying data changes a new cache with a
/// greater version replaces it. Cloning only bumps reference counts, so a
/// consumer can hold on to the snapshot it read for as long as it needs.
///
/// ```
/// use meshroute::VersionedCache;
///
/// let cache = VersionedCache::new("greeter", 3, vec!["10.0.0.1:8080"]);
/// assert_eq!(cache.name(), "greeter");
/// assert_eq!(cache.version(), 3);
/// assert!(!cache.is_empty());
/// ```
pub struct VersionedCache<T> {
    name: Arc<str>,
    version: u64,
    data: Arc<T>,
}

impl<T> VersionedCache<T> {
    pub fn new(name: impl Into<Arc<str>>, version: u64, data: T) -> Self {
        Self::from_shared(name, version, Arc::new(data))
    }

    /// Build a cache around data that is already shared.
    pub fn from_shared(name: impl Into<Arc<str>>, version: u64, data: Arc<T>) -> Self {
        Self {
            name: name.into(),
            version,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    /// The shared handle to the snapshot, for callers that keep it beyond the cache.
    pub fn shared_data(&self) -> &Arc<T> {
        &self.data
    }

    /// Two caches are interchangeable when both name and version match.
    pub fn is_same_version<U>(&self, other: &VersionedCache<U>) -> bool {
        self.version == other.version && self.name == other.name
    }

    /// Whether `other` supersedes this cache.
    pub fn is_expired<U>(&self, other: &VersionedCache<U>) -> bool {
        self.version < other.version
    }

    /// Derive a cache with the same name and version from this snapshot.
    pub fn map<U, F>(&self, f: F) -> VersionedCache<U>
    where
        F: FnOnce(Arc<T>) -> U,
    {
        VersionedCache {
            name: Arc::clone(&self.name),
            version: self.version,
            data: Arc::new(f(Arc::clone(&self.data))),
        }
    }

    pub(crate) fn shared_name(&self) -> &Arc<str> {
        &self.name
    }
}

impl<T: CacheData> VersionedCache<T> {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> Clone for VersionedCache<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            version: self.version,
            data: Arc::clone(&self.data),
        }
    }
}

impl<T> fmt::Debug for VersionedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedCache")
            .field("name", &self.name)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}
