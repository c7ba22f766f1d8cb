use crate::{
    ChildMap, DiscoveryContext, DiscoveryFilter, DiscoveryTreeNode, InstanceStatus, NodeData,
};
use std::sync::Arc;

const UP_GROUP: &str = "up";

/// Drops every instance that is not [`InstanceStatus::Up`].
#[derive(Debug, Default)]
pub struct InstanceStatusDiscoveryFilter {
    disabled: bool,
}

impl InstanceStatusDiscoveryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the filter in the chain but skip it, e.g. when a feature flag is off.
    pub fn disabled() -> Self {
        Self { disabled: true }
    }
}

impl DiscoveryFilter for InstanceStatusDiscoveryFilter {
    fn order(&self) -> i32 {
        100
    }

    fn enabled(&self) -> bool {
        !self.disabled
    }

    fn group(&self) -> &str {
        UP_GROUP
    }

    fn is_grouping_filter(&self) -> bool {
        false
    }

    fn init(&self, _context: &DiscoveryContext, parent: &DiscoveryTreeNode) -> anyhow::Result<ChildMap> {
        let instances = parent
            .data()
            .instances()
            .ok_or_else(|| anyhow::anyhow!("'{}' holds endpoints, not instances", parent.name()))?;

        let up = instances
            .iter()
            .filter(|instance| instance.status == InstanceStatus::Up)
            .cloned()
            .collect();

        let mut children = ChildMap::new();
        children.insert(
            UP_GROUP.to_string(),
            Arc::new(DiscoveryTreeNode::sub_node(
                parent,
                UP_GROUP,
                NodeData::Instances(Arc::new(up)),
            )),
        );
        Ok(children)
    }

    fn find_child_name(&self, _context: &mut DiscoveryContext, _parent: &Arc<DiscoveryTreeNode>) -> String {
        UP_GROUP.to_string()
    }
}
