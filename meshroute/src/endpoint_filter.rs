use crate::{
    ChildMap, DiscoveryContext, DiscoveryError, DiscoveryFilter, DiscoveryTreeNode, Endpoint,
    NodeData,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Group used when the consumer accepts any transport.
pub const DEFAULT_GROUP: &str = "default";

/// Final step of every discovery tree: turns instances into [`Endpoint`]s.
///
/// Endpoints are grouped by the transport the invocation asks for, the group
/// for a transport is built the first time a request needs it. Endpoints
/// published without a scheme match every transport.
#[derive(Debug, Clone, Default)]
pub struct EndpointDiscoveryFilter {
    transports: Option<HashSet<String>>,
}

impl EndpointDiscoveryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only keep endpoints of these transports.
    pub fn with_transports<I, T>(self, transports: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            transports: Some(transports.into_iter().map(Into::into).collect()),
        }
    }

    fn group_name(context: &DiscoveryContext) -> &str {
        context
            .input()
            .transport_name
            .as_deref()
            .unwrap_or(DEFAULT_GROUP)
    }

    fn is_supported(&self, transport: &str) -> bool {
        self.transports
            .as_ref()
            .map_or(true, |transports| transports.contains(transport))
    }

    fn create_node(
        &self,
        expected: Option<&str>,
        group: &str,
        parent: &DiscoveryTreeNode,
    ) -> anyhow::Result<DiscoveryTreeNode> {
        let instances = parent
            .data()
            .instances()
            .ok_or_else(|| anyhow::anyhow!("'{}' already holds endpoints", parent.name()))?;

        let mut endpoints = Vec::new();
        for instance in instances.iter() {
            for uri in &instance.endpoints {
                let endpoint = Endpoint::parse(uri, &instance.instance_id);
                if let Some(transport) = endpoint.transport() {
                    if !self.is_supported(transport) {
                        continue;
                    }
                    if expected.map_or(false, |expected| expected != transport) {
                        continue;
                    }
                }
                endpoints.push(endpoint);
            }
        }

        tracing::debug!(
            "created endpoint group {}/{} with {} endpoints",
            parent.name(),
            group,
            endpoints.len()
        );
        Ok(DiscoveryTreeNode::sub_node(
            parent,
            group,
            NodeData::Endpoints(Arc::new(endpoints)),
        ))
    }
}

impl DiscoveryFilter for EndpointDiscoveryFilter {
    fn order(&self) -> i32 {
        i32::MAX
    }

    fn group(&self) -> &str {
        "endpoint"
    }

    fn is_grouping_filter(&self) -> bool {
        true
    }

    fn init(&self, context: &DiscoveryContext, parent: &DiscoveryTreeNode) -> anyhow::Result<ChildMap> {
        let group = Self::group_name(context);
        let node = self.create_node(context.input().transport_name.as_deref(), group, parent)?;

        let mut children = ChildMap::new();
        children.insert(group.to_string(), Arc::new(node));
        Ok(children)
    }

    fn find_child_name(&self, context: &mut DiscoveryContext, _parent: &Arc<DiscoveryTreeNode>) -> String {
        Self::group_name(context).to_string()
    }

    fn discovery(
        &self,
        context: &mut DiscoveryContext,
        parent: &Arc<DiscoveryTreeNode>,
    ) -> Result<Option<Arc<DiscoveryTreeNode>>, DiscoveryError> {
        let expected = context.input().transport_name.as_deref();
        let group = Self::group_name(context);

        parent
            .child_or_insert_with(group, |node| self.create_node(expected, group, node))
            .map(Some)
            .map_err(|source| DiscoveryError::Filter {
                filter: self.group().to_string(),
                source,
            })
    }
}
