//! Nodes of the discovery tree.

use crate::{CacheData, Endpoint, MicroserviceInstance, VersionedCache};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Children of a branch node, keyed by group name.
pub type ChildMap = HashMap<String, Arc<DiscoveryTreeNode>>;

/// What a node holds: instances while the tree is still narrowing them, endpoints
/// once the endpoint filter has run.
#[derive(Debug, Clone)]
pub enum NodeData {
    Instances(Arc<Vec<MicroserviceInstance>>),
    Endpoints(Arc<Vec<Endpoint>>),
}

impl NodeData {
    pub fn instances(&self) -> Option<&Arc<Vec<MicroserviceInstance>>> {
        match self {
            NodeData::Instances(instances) => Some(instances),
            NodeData::Endpoints(_) => None,
        }
    }

    pub fn endpoints(&self) -> Option<&Arc<Vec<Endpoint>>> {
        match self {
            NodeData::Endpoints(endpoints) => Some(endpoints),
            NodeData::Instances(_) => None,
        }
    }
}

impl Default for NodeData {
    fn default() -> Self {
        NodeData::Instances(Arc::new(Vec::new()))
    }
}

impl CacheData for NodeData {
    fn is_empty(&self) -> bool {
        match self {
            NodeData::Instances(instances) => instances.is_empty(),
            NodeData::Endpoints(endpoints) => endpoints.is_empty(),
        }
    }
}

/// A node of the discovery tree.
///
/// A node is built by a filter, published to its parent behind an [`Arc`] and
/// from then on only its children and attributes change. Children are built at
/// most once: [`init_children`](DiscoveryTreeNode::init_children) and
/// [`child_or_insert_with`](DiscoveryTreeNode::child_or_insert_with) serialize
/// builders on a per-node lock and publish a complete child map in one swap, so
/// readers never observe a partially built set.
pub struct DiscoveryTreeNode {
    name: Arc<str>,
    version: u64,
    data: Arc<NodeData>,
    level: usize,
    children_inited: AtomicBool,
    children: RwLock<Arc<ChildMap>>,
    build_lock: Mutex<()>,
    attributes: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl Default for DiscoveryTreeNode {
    fn default() -> Self {
        Self {
            name: Arc::from(""),
            version: 0,
            data: Arc::new(NodeData::default()),
            level: 0,
            children_inited: AtomicBool::new(false),
            children: RwLock::new(Arc::new(ChildMap::new())),
            build_lock: Mutex::new(()),
            attributes: RwLock::new(HashMap::new()),
        }
    }
}

impl DiscoveryTreeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(self, name: impl Into<Arc<str>>) -> Self {
        Self {
            name: name.into(),
            ..self
        }
    }

    /// A child of `parent` named `"{parent}/{sub_name}"` that inherits the parent's version.
    pub fn sub_node(parent: &DiscoveryTreeNode, sub_name: &str, data: NodeData) -> Self {
        Self {
            name: Arc::from(format!("{}/{}", parent.name, sub_name)),
            version: parent.version,
            data: Arc::new(data),
            level: parent.level + 1,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn shared_data(&self) -> &Arc<NodeData> {
        &self.data
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn set_level(&mut self, level: usize) {
        self.level = level;
    }

    pub fn children_inited(&self) -> bool {
        self.children_inited.load(Ordering::Acquire)
    }

    pub fn set_children_inited(&self, inited: bool) {
        self.children_inited.store(inited, Ordering::Release);
    }

    pub fn attribute<V: Any + Send + Sync>(&self, key: &str) -> Option<Arc<V>> {
        let value = self.attributes.read().get(key).cloned()?;
        value.downcast::<V>().ok()
    }

    pub fn set_attribute<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.attributes.write().insert(key.into(), Arc::new(value));
    }

    pub fn children(&self) -> Arc<ChildMap> {
        Arc::clone(&*self.children.read())
    }

    /// Replace the whole child set.
    pub fn set_children(&self, children: Arc<ChildMap>) {
        *self.children.write() = children;
    }

    pub fn child(&self, name: &str) -> Option<Arc<DiscoveryTreeNode>> {
        self.children.read().get(name).cloned()
    }

    pub fn set_child(&self, name: impl Into<String>, child: Arc<DiscoveryTreeNode>) {
        let mut children = self.children.write();
        let mut next = ChildMap::clone(&**children);
        next.insert(name.into(), child);
        *children = Arc::new(next);
    }

    /// Turn this node into a leaf holding `cache`.
    ///
    /// Previous children are dropped, so calling it again with a newer cache
    /// simply replaces the leaf.
    pub fn from_cache(&mut self, cache: &VersionedCache<NodeData>) -> &mut Self {
        self.name = Arc::clone(cache.shared_name());
        self.version = cache.version();
        self.data = Arc::clone(cache.shared_data());
        *self.children.get_mut() = Arc::new(ChildMap::new());
        *self.children_inited.get_mut() = false;
        self
    }

    /// Snapshot of this node as a cache with the same name, version and data.
    pub fn to_cache(&self) -> VersionedCache<NodeData> {
        VersionedCache::from_shared(Arc::clone(&self.name), self.version, Arc::clone(&self.data))
    }

    /// Build all children once. Later calls return immediately, also when they
    /// raced with the call that did the building.
    pub fn init_children<E, F>(&self, build: F) -> Result<(), E>
    where
        F: FnOnce(&DiscoveryTreeNode) -> Result<ChildMap, E>,
    {
        if self.children_inited() {
            return Ok(());
        }
        let _guard = self.build_lock.lock();
        if self.children_inited() {
            return Ok(());
        }
        let children = build(self)?;
        self.set_children(Arc::new(children));
        self.set_children_inited(true);
        Ok(())
    }

    /// Return the child called `name`, building and publishing it first if missing.
    pub fn child_or_insert_with<E, F>(&self, name: &str, build: F) -> Result<Arc<DiscoveryTreeNode>, E>
    where
        F: FnOnce(&DiscoveryTreeNode) -> Result<DiscoveryTreeNode, E>,
    {
        if let Some(child) = self.child(name) {
            return Ok(child);
        }
        let _guard = self.build_lock.lock();
        if let Some(child) = self.child(name) {
            return Ok(child);
        }
        let child = Arc::new(build(self)?);
        self.set_child(name, Arc::clone(&child));
        Ok(child)
    }
}

impl fmt::Debug for DiscoveryTreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryTreeNode")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("level", &self.level)
            .field("children_inited", &self.children_inited())
            .finish_non_exhaustive()
    }
}
