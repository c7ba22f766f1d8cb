//! The interface discovery policies plug into, and the registry they are collected in.

use crate::{ChildMap, DiscoveryContext, DiscoveryError, DiscoveryTreeNode};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

/// One step of the discovery tree.
///
/// A filter receives the node the previous step selected, builds that node's
/// children once with [`init`](DiscoveryFilter::init), and then picks the child
/// matching the current request with
/// [`find_child_name`](DiscoveryFilter::find_child_name). The tree calls
/// [`discovery`](DiscoveryFilter::discovery); implementations that need a
/// different build strategy may override it.
pub trait DiscoveryFilter: Send + Sync {
    /// Position in the filter chain, lower runs first.
    fn order(&self) -> i32;

    fn enabled(&self) -> bool {
        true
    }

    /// Name of the branch this filter produces. Non-grouping filters publish
    /// their single child under this name.
    fn group(&self) -> &str;

    /// Whether the output is split into several named groups rather than a
    /// single narrowed child.
    fn is_grouping_filter(&self) -> bool;

    /// Build every child of `parent`.
    fn init(&self, context: &DiscoveryContext, parent: &DiscoveryTreeNode) -> anyhow::Result<ChildMap>;

    /// The child of `parent` this request continues with.
    fn find_child_name(&self, context: &mut DiscoveryContext, parent: &Arc<DiscoveryTreeNode>) -> String;

    /// Select the child of `parent` for this request, building children first if needed.
    ///
    /// `None` means the selected group does not exist for this parent.
    fn discovery(
        &self,
        context: &mut DiscoveryContext,
        parent: &Arc<DiscoveryTreeNode>,
    ) -> Result<Option<Arc<DiscoveryTreeNode>>, DiscoveryError> {
        let input: &DiscoveryContext = context;
        parent
            .init_children(|node| self.init(input, node))
            .map_err(|source| DiscoveryError::Filter {
                filter: self.group().to_string(),
                source,
            })?;

        let child_name = self.find_child_name(context, parent);
        Ok(parent.child(&child_name))
    }
}

/// Ordered collection of the filters available to discovery trees.
///
/// Filters are registered during startup. The first
/// [`snapshot`](FilterRegistry::snapshot) freezes the registry; registering
/// afterwards fails so every tree built from it sees the same filter set.
#[derive(Default)]
pub struct FilterRegistry {
    filters: RwLock<Vec<Arc<dyn DiscoveryFilter>>>,
    frozen: AtomicBool,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static FilterRegistry {
        static GLOBAL: OnceLock<FilterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(FilterRegistry::new)
    }

    pub fn register(&self, filter: Arc<dyn DiscoveryFilter>) -> Result<(), DiscoveryError> {
        let mut filters = self.filters.write();
        if self.frozen.load(Ordering::SeqCst) {
            return Err(DiscoveryError::RegistryFrozen {
                filter: filter.group().to_string(),
            });
        }
        tracing::debug!("registered discovery filter {}", filter.group());
        filters.push(filter);
        Ok(())
    }

    /// Freeze the registry and return its filters in registration order.
    pub fn snapshot(&self) -> Vec<Arc<dyn DiscoveryFilter>> {
        let filters = self.filters.write();
        self.frozen.store(true, Ordering::SeqCst);
        filters.clone()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::SeqCst)
    }
}
