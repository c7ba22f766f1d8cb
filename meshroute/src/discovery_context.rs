//! Per-request state handed to every discovery filter.

use crate::{DiscoveryTreeNode, Invocation};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Routing fields a discovery run is driven by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputParameters {
    pub app_id: String,
    pub microservice_name: String,
    pub version_rule: String,
    /// Transport the consumer insists on, `None` for any.
    pub transport_name: Option<String>,
    pub operation: String,
}

struct RerunPoint {
    parent: Arc<DiscoveryTreeNode>,
    level: usize,
}

/// State of a single discovery run.
///
/// Besides the invocation-derived input it carries a scratch space filters use
/// to talk to each other, and the rerun points grouping filters leave behind
/// when the group they picked may turn out to be missing.
pub struct DiscoveryContext {
    input: InputParameters,
    parameters: HashMap<String, Box<dyn Any + Send + Sync>>,
    rerun: Vec<RerunPoint>,
    level: usize,
}

impl DiscoveryContext {
    pub fn new(input: InputParameters) -> Self {
        Self {
            input,
            parameters: HashMap::new(),
            rerun: Vec::new(),
            level: 0,
        }
    }

    pub fn from_invocation(invocation: &Invocation) -> Self {
        Self::new(InputParameters {
            app_id: invocation.app_id().to_string(),
            microservice_name: invocation.microservice_name().to_string(),
            version_rule: invocation.microservice_version_rule().to_string(),
            transport_name: invocation.transport_name().map(str::to_string),
            operation: invocation.microservice_qualified_name().to_string(),
        })
    }

    pub fn input(&self) -> &InputParameters {
        &self.input
    }

    pub fn context_parameter<V: Any>(&self, key: &str) -> Option<&V> {
        self.parameters.get(key)?.downcast_ref::<V>()
    }

    pub fn set_context_parameter<V: Any + Send + Sync>(&mut self, key: impl Into<String>, value: V) {
        self.parameters.insert(key.into(), Box::new(value));
    }

    /// Ask the tree to run the current filter again on `parent` if a later
    /// filter finds nothing.
    pub fn push_rerun_filter(&mut self, parent: &Arc<DiscoveryTreeNode>) {
        self.rerun.push(RerunPoint {
            parent: Arc::clone(parent),
            level: self.level,
        });
    }

    pub(crate) fn pop_rerun_filter(&mut self) -> Option<(Arc<DiscoveryTreeNode>, usize)> {
        self.rerun.pop().map(|point| (point.parent, point.level))
    }

    /// Index of the filter currently running.
    pub fn level(&self) -> usize {
        self.level
    }

    pub(crate) fn set_level(&mut self, level: usize) {
        self.level = level;
    }
}
