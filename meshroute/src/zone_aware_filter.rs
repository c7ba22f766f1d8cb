use crate::{ChildMap, DiscoveryContext, DiscoveryFilter, DiscoveryTreeNode, NodeData};
use std::sync::Arc;

const GROUPS: [&str; 3] = ["zone", "region", "all"];
const ATTEMPT_KEY: &str = "zone-aware.attempt";

/// Prefers instances deployed close to the consumer.
///
/// Instances are grouped into `zone` (same region and availability zone),
/// `region` (same region) and `all`. A request first tries `zone`; when that
/// group is empty the tree reruns this filter, which then falls back to
/// `region` and finally to `all`.
#[derive(Debug, Clone)]
pub struct ZoneAwareDiscoveryFilter {
    region: String,
    availability_zone: String,
}

impl ZoneAwareDiscoveryFilter {
    pub fn new(region: impl Into<String>, availability_zone: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            availability_zone: availability_zone.into(),
        }
    }
}

impl DiscoveryFilter for ZoneAwareDiscoveryFilter {
    fn order(&self) -> i32 {
        200
    }

    fn group(&self) -> &str {
        "zone-aware"
    }

    fn is_grouping_filter(&self) -> bool {
        true
    }

    fn init(&self, _context: &DiscoveryContext, parent: &DiscoveryTreeNode) -> anyhow::Result<ChildMap> {
        let instances = parent
            .data()
            .instances()
            .ok_or_else(|| anyhow::anyhow!("'{}' holds endpoints, not instances", parent.name()))?;

        let (mut zone, mut region) = (Vec::new(), Vec::new());
        for instance in instances.iter() {
            let Some(data_center) = &instance.data_center else {
                continue;
            };
            if data_center.region != self.region {
                continue;
            }
            if data_center.availability_zone == self.availability_zone {
                zone.push(instance.clone());
            }
            region.push(instance.clone());
        }

        let mut children = ChildMap::new();
        let groups = [(GROUPS[0], zone), (GROUPS[1], region)];
        for (group, members) in groups {
            if members.is_empty() {
                continue;
            }
            let node = DiscoveryTreeNode::sub_node(parent, group, NodeData::Instances(Arc::new(members)));
            children.insert(group.to_string(), Arc::new(node));
        }
        let all = DiscoveryTreeNode::sub_node(parent, GROUPS[2], NodeData::Instances(Arc::clone(instances)));
        children.insert(GROUPS[2].to_string(), Arc::new(all));

        tracing::debug!(
            "zone aware groups of {}: {:?}",
            parent.name(),
            children.keys().collect::<Vec<_>>()
        );
        Ok(children)
    }

    fn find_child_name(&self, context: &mut DiscoveryContext, parent: &Arc<DiscoveryTreeNode>) -> String {
        let attempt = context
            .context_parameter::<usize>(ATTEMPT_KEY)
            .copied()
            .unwrap_or(0)
            .min(GROUPS.len() - 1);
        if attempt + 1 < GROUPS.len() {
            context.push_rerun_filter(parent);
        }
        context.set_context_parameter(ATTEMPT_KEY, attempt + 1);
        GROUPS[attempt].to_string()
    }
}
