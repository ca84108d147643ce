//! Directed relation edges between long-term memories

use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

use super::types::{RelationEdge, RelationType, clamp_importance};

/// Outgoing adjacency lists keyed by source ID
///
/// Endpoints are not validated against the store, so edges may point at
/// memories that do not exist (yet).
#[derive(Default)]
pub struct RelationGraph {
    outgoing: DashMap<String, Vec<RelationEdge>>,
}

impl RelationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn link(
        &self,
        source_id: &str,
        target_id: &str,
        relation_type: RelationType,
        weight: f64,
    ) -> RelationEdge {
        let edge = RelationEdge {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            relation_type,
            weight: clamp_importance(weight),
            created_at: Utc::now(),
        };

        self.outgoing
            .entry(source_id.to_string())
            .or_default()
            .push(edge.clone());
        debug!(
            "Linked {} -[{:?}]-> {}",
            source_id, relation_type, target_id
        );

        edge
    }

    /// Outgoing edges of `id`, in creation order
    pub fn edges_from(&self, id: &str) -> Vec<RelationEdge> {
        self.outgoing
            .get(id)
            .map(|edges| edges.clone())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.iter().map(|entry| entry.value().len()).sum()
    }

    /// Node IDs reachable from `origin` within `depth` hops
    ///
    /// Breadth-first, following only edges of `relation_type` when given.
    /// Each node appears once, in discovery order; the origin is excluded.
    pub fn reachable(
        &self,
        origin: &str,
        relation_type: Option<RelationType>,
        depth: usize,
    ) -> Vec<String> {
        let mut visited: HashSet<String> = HashSet::from([origin.to_string()]);
        let mut order = Vec::new();
        let mut queue: VecDeque<(String, usize)> = VecDeque::from([(origin.to_string(), 0)]);

        while let Some((node, hops)) = queue.pop_front() {
            if hops >= depth {
                continue;
            }

            for edge in self.edges_from(&node) {
                if relation_type.is_some_and(|wanted| wanted != edge.relation_type) {
                    continue;
                }
                if visited.insert(edge.target_id.clone()) {
                    order.push(edge.target_id.clone());
                    queue.push_back((edge.target_id, hops + 1));
                }
            }
        }

        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> RelationGraph {
        // a -> b -> c -> d, a -> e (causal), b -> a (cycle)
        let graph = RelationGraph::new();
        graph.link("a", "b", RelationType::Related, 1.0);
        graph.link("b", "c", RelationType::Related, 0.5);
        graph.link("c", "d", RelationType::Related, 0.5);
        graph.link("a", "e", RelationType::Causal, 0.9);
        graph.link("b", "a", RelationType::Similar, 0.2);
        graph
    }

    #[test]
    fn test_reachable_respects_depth() {
        let graph = chain();
        assert_eq!(graph.reachable("a", None, 1), vec!["b", "e"]);
        assert_eq!(graph.reachable("a", None, 2), vec!["b", "e", "c"]);
        assert_eq!(graph.reachable("a", None, 3), vec!["b", "e", "c", "d"]);
        assert!(graph.reachable("a", None, 0).is_empty());
    }

    #[test]
    fn test_reachable_filters_by_type_and_excludes_origin() {
        let graph = chain();
        assert_eq!(
            graph.reachable("a", Some(RelationType::Causal), 5),
            vec!["e"]
        );
        assert!(!graph.reachable("b", None, 5).contains(&"b".to_string()));
    }

    #[test]
    fn test_link_clamps_weight() {
        let graph = RelationGraph::new();
        let edge = graph.link("x", "y", RelationType::Similar, 3.0);
        assert_eq!(edge.weight, 1.0);
        assert_eq!(graph.edges_from("x").len(), 1);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.edges_from("y").is_empty());
    }
}
