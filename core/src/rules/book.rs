use std::collections::HashMap;

use super::node::{ConditionNode, NodeId, NodeKind};
use super::registry::PlayerId;

/// Arena owning every node of a scenario. Children refer to each other by [`NodeId`], so
/// the graph can contain diamonds without shared ownership.
#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    nodes: Vec<ConditionNode>,
    by_name: HashMap<String, NodeId>,
}

impl RuleBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, node: ConditionNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.by_name.insert(node.name.clone(), id);
        self.nodes.push(node);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &ConditionNode {
        self.nodes
            .get(id.0)
            .unwrap_or_else(|| panic!("無効なノード番号です: {}", id.0))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut ConditionNode {
        self.nodes
            .get_mut(id.0)
            .unwrap_or_else(|| panic!("無効なノード番号です: {}", id.0))
    }

    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// Exact name first, then an ASCII case-insensitive match.
    pub fn find_loose(&self, token: &str) -> Option<NodeId> {
        self.find(token).or_else(|| {
            self.nodes
                .iter()
                .position(|node| node.name.eq_ignore_ascii_case(token))
                .map(NodeId)
        })
    }

    pub fn name_of(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ConditionNode)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(idx, node)| (NodeId(idx), node))
    }

    pub fn triggers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(|(_, node)| matches!(node.kind, NodeKind::Trigger(_)))
            .map(|(id, _)| id)
    }

    /// User and political actions owned by `player`.
    pub fn actions_of(&self, player: PlayerId) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(move |(_, node)| node.owner == player && node.action().is_some())
            .map(|(id, _)| id)
    }

    pub fn actions(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.iter()
            .filter(|(_, node)| node.action().is_some())
            .map(|(id, _)| id)
    }
}
