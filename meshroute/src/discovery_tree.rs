//! Walks the discovery filters over a lazily built, version-cached tree.

use crate::{
    DiscoveryContext, DiscoveryError, DiscoveryFilter, DiscoveryTreeNode, Endpoint, FilterRegistry,
    InstanceSource, MicroserviceInstance, NodeData, VersionedCache,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Turns `(app, microservice, version rule)` plus a [`DiscoveryContext`] into the
/// endpoints the request may use.
///
/// Every distinct instance cache gets a root node. Filters hang their output
/// below it, so as long as the source keeps reporting the same version a
/// request only walks existing nodes. A new version replaces the root
/// wholesale and the next requests rebuild the subtree from scratch.
///
/// ```
/// use meshroute::{DiscoveryContext, DiscoveryTree, EndpointDiscoveryFilter, InputParameters};
/// use meshroute::{InstanceCacheManager, MicroserviceInstance};
/// use std::sync::Arc;
///
/// let source = Arc::new(InstanceCacheManager::new());
/// source.update(
///     "app",
///     "Greeter",
///     vec![MicroserviceInstance::new("i-1", "1.0.0", ["rest://10.0.0.1:8080"])],
/// );
///
/// let tree = DiscoveryTree::builder(source)
///     .add_filter(Arc::new(EndpointDiscoveryFilter::new()))
///     .build();
///
/// let mut context = DiscoveryContext::new(InputParameters::default());
/// let endpoints = tree.discover(&mut context, "app", "Greeter", "1.0.0+").unwrap();
/// assert_eq!(endpoints.data()[0].address(), "10.0.0.1:8080");
/// ```
pub struct DiscoveryTree {
    source: Arc<dyn InstanceSource>,
    filters: Vec<Arc<dyn DiscoveryFilter>>,
    roots: RwLock<HashMap<String, Arc<DiscoveryTreeNode>>>,
}

impl DiscoveryTree {
    pub fn builder(source: Arc<dyn InstanceSource>) -> DiscoveryTreeBuilder {
        DiscoveryTreeBuilder {
            source,
            filters: Vec::new(),
        }
    }

    /// Filters in the order they run.
    pub fn filters(&self) -> &[Arc<dyn DiscoveryFilter>] {
        &self.filters
    }

    /// Discover the endpoints of a microservice for this request.
    ///
    /// An empty result is not an error: it means nothing survived filtering and
    /// the caller decides what to do about it.
    pub fn discover(
        &self,
        context: &mut DiscoveryContext,
        app_id: &str,
        microservice_name: &str,
        version_rule: &str,
    ) -> Result<VersionedCache<Vec<Endpoint>>, DiscoveryError> {
        let instances =
            self.source
                .get_or_create_versioned_cache(app_id, microservice_name, version_rule)?;
        let leaf = self.discover_node(context, &instances)?;

        let cache = leaf.to_cache();
        match cache.data().endpoints() {
            Some(endpoints) => Ok(VersionedCache::from_shared(
                cache.name(),
                cache.version(),
                Arc::clone(endpoints),
            )),
            None => Err(DiscoveryError::UnexpectedLeaf {
                name: cache.name().to_string(),
            }),
        }
    }

    /// Run the filters over `input` and return the node the last one selected.
    pub fn discover_node(
        &self,
        context: &mut DiscoveryContext,
        input: &VersionedCache<Vec<MicroserviceInstance>>,
    ) -> Result<Arc<DiscoveryTreeNode>, DiscoveryError> {
        let mut parent = self.get_or_create_root(input);
        let mut level = 0;

        while level < self.filters.len() {
            let filter = &self.filters[level];
            if !filter.enabled() {
                level += 1;
                continue;
            }

            context.set_level(level);
            match filter.discovery(context, &parent)? {
                Some(child) => parent = child,
                None => match context.pop_rerun_filter() {
                    Some((rerun_parent, rerun_level)) => {
                        parent = rerun_parent;
                        level = rerun_level;
                        continue;
                    }
                    // Later filters may still produce something from nothing.
                    None => {
                        parent = Arc::new(DiscoveryTreeNode::sub_node(
                            &parent,
                            "empty",
                            NodeData::default(),
                        ))
                    }
                },
            }
            level += 1;
        }

        Ok(parent)
    }

    fn get_or_create_root(
        &self,
        input: &VersionedCache<Vec<MicroserviceInstance>>,
    ) -> Arc<DiscoveryTreeNode> {
        if let Some(root) = self.roots.read().get(input.name()) {
            if root.cache_version() == input.version() {
                return Arc::clone(root);
            }
        }

        let mut roots = self.roots.write();
        let current = roots
            .get(input.name())
            .map(|root| (root.to_cache(), Arc::clone(root)));
        match current {
            Some((published, root)) if published.version() == input.version() => root,
            // A reader raced with a newer publish: serve it a private root
            // instead of rolling the shared one back.
            Some((published, _)) if input.is_expired(&published) => Arc::new(root_from(input)),
            _ => {
                tracing::info!(
                    "rebuilding discovery tree of {}, version {}",
                    input.name(),
                    input.version()
                );
                let root = Arc::new(root_from(input));
                roots.insert(input.name().to_string(), Arc::clone(&root));
                root
            }
        }
    }
}

fn root_from(input: &VersionedCache<Vec<MicroserviceInstance>>) -> DiscoveryTreeNode {
    let mut root = DiscoveryTreeNode::new();
    root.from_cache(&input.map(NodeData::Instances));
    root
}

/// Collects and orders the filters of a [`DiscoveryTree`].
pub struct DiscoveryTreeBuilder {
    source: Arc<dyn InstanceSource>,
    filters: Vec<Arc<dyn DiscoveryFilter>>,
}

impl DiscoveryTreeBuilder {
    /// Add every filter of `registry`, freezing it.
    pub fn load_from_registry(mut self, registry: &FilterRegistry) -> Self {
        self.filters.extend(registry.snapshot());
        self
    }

    pub fn add_filter(mut self, filter: Arc<dyn DiscoveryFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sort the filters by [`order`](DiscoveryFilter::order) and build the tree.
    ///
    /// Filters with the same order keep the order they were added in, whether
    /// added one by one or loaded from a registry.
    pub fn build(mut self) -> DiscoveryTree {
        self.filters.sort_by_key(|filter| filter.order());
        for filter in &self.filters {
            tracing::debug!("discovery filter {} at order {}", filter.group(), filter.order());
        }

        DiscoveryTree {
            source: self.source,
            filters: self.filters,
            roots: RwLock::new(HashMap::new()),
        }
    }
}
