//! Versioned instance lists per microservice, the input of every discovery tree.

use crate::{next_version, DiscoveryError, MicroserviceInstance, Version, VersionRule, VersionedCache};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Supplies the instances of a microservice that satisfy a version rule.
///
/// The returned cache must keep its version for as long as the data is
/// unchanged and move to a strictly greater version when it changes.
pub trait InstanceSource: Send + Sync {
    fn get_or_create_versioned_cache(
        &self,
        app_id: &str,
        microservice_name: &str,
        version_rule: &str,
    ) -> Result<VersionedCache<Vec<MicroserviceInstance>>, DiscoveryError>;
}

struct ServiceEntry {
    version: u64,
    instances: Arc<Vec<MicroserviceInstance>>,
}

/// In-memory [`InstanceSource`] fed by pushes, typically from an
/// [`EndpointProbe`](crate::EndpointProbe).
///
/// Until the first [`update`](InstanceCacheManager::update) the manager is
/// unready and every lookup fails with [`DiscoveryError::Unready`].
#[derive(Default)]
pub struct InstanceCacheManager {
    ready: AtomicBool,
    services: DashMap<(String, String), ServiceEntry>,
    views: DashMap<String, VersionedCache<Vec<MicroserviceInstance>>>,
}

impl InstanceCacheManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the instances of a microservice.
    ///
    /// The list is kept in the order given, which is the order calls rotate
    /// through. Returns whether the set changed; a reordering of the same
    /// instances is not a change and keeps the version.
    pub fn update(
        &self,
        app_id: &str,
        microservice_name: &str,
        instances: Vec<MicroserviceInstance>,
    ) -> bool {
        let key = (app_id.to_string(), microservice_name.to_string());
        let changed = {
            let mut entry = self.services.entry(key).or_insert_with(|| ServiceEntry {
                version: 0,
                instances: Arc::new(Vec::new()),
            });
            if entry.version != 0 && same_instances(&entry.instances, &instances) {
                false
            } else {
                entry.version = next_version();
                entry.instances = Arc::new(instances);
                tracing::debug!(
                    "instances of {}:{} changed, version {}",
                    app_id,
                    microservice_name,
                    entry.version
                );
                true
            }
        };

        // Readers only look at the services once the first entry is in place.
        self.ready.store(true, Ordering::SeqCst);
        changed
    }

    /// Mark the manager ready without any data, e.g. after an initial sync that found nothing.
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl InstanceSource for InstanceCacheManager {
    fn get_or_create_versioned_cache(
        &self,
        app_id: &str,
        microservice_name: &str,
        version_rule: &str,
    ) -> Result<VersionedCache<Vec<MicroserviceInstance>>, DiscoveryError> {
        if !self.is_ready() {
            return Err(DiscoveryError::Unready {
                microservice_name: microservice_name.to_string(),
            });
        }
        let rule: VersionRule = version_rule.parse()?;
        let name = format!("{}:{}:{}", app_id, microservice_name, version_rule);

        let (version, instances) = match self
            .services
            .get(&(app_id.to_string(), microservice_name.to_string()))
        {
            Some(entry) => (entry.version, Arc::clone(&entry.instances)),
            None => (0, Arc::new(Vec::new())),
        };

        if let Some(view) = self.views.get(&name) {
            if view.version() == version {
                return Ok(view.clone());
            }
        }

        let view = VersionedCache::new(name.as_str(), version, select(&rule, &instances));
        self.views.insert(name, view.clone());
        Ok(view)
    }
}

/// Whether both lists hold the same instances, in any order.
fn same_instances(current: &[MicroserviceInstance], next: &[MicroserviceInstance]) -> bool {
    if current.len() != next.len() {
        return false;
    }
    fn sorted(instances: &[MicroserviceInstance]) -> Vec<&MicroserviceInstance> {
        let mut sorted: Vec<_> = instances.iter().collect();
        sorted.sort_by(|a, b| (&a.instance_id, &a.endpoints).cmp(&(&b.instance_id, &b.endpoints)));
        sorted
    }
    sorted(current) == sorted(next)
}

fn select(rule: &VersionRule, instances: &[MicroserviceInstance]) -> Vec<MicroserviceInstance> {
    let parsed: Vec<_> = instances
        .iter()
        .filter_map(|instance| {
            instance
                .version
                .parse::<Version>()
                .ok()
                .map(|version| (version, instance))
        })
        .collect();
    let latest = parsed.iter().map(|(version, _)| *version).max();

    parsed
        .into_iter()
        .filter(|(version, _)| rule.matches(*version, latest))
        .map(|(_, instance)| instance.clone())
        .collect()
}
