//! Flow Graph Implementation
//!
//! Directed process-flow graph over identified equipment, stored in a
//! petgraph `DiGraph` with an id index for O(1) lookup. Every accepted edge
//! is mirrored into the endpoint's `upstream` / `downstream` /
//! `connected_to` lists so checks can reason about direct neighbours without
//! touching the graph API.

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

use super::schema::{Equipment, EquipmentType};
use crate::parser::schema::Connection;

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    graph: DiGraph<Equipment, ()>,
    indices: HashMap<String, NodeIndex>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from identified equipment and raw connection edges.
    ///
    /// Edges whose endpoints are not identified equipment are ignored.
    pub fn build(equipment: Vec<Equipment>, connections: &[Connection]) -> Self {
        let mut flow = Self::new();

        for item in equipment {
            flow.add_equipment(item);
        }

        let mut ignored = 0usize;
        for conn in connections {
            if !flow.connect(&conn.source_id, &conn.target_id) {
                ignored += 1;
            }
        }

        if ignored > 0 {
            tracing::debug!(
                "Ignored {} of {} connections with unknown endpoints",
                ignored,
                connections.len()
            );
        }

        flow
    }

    /// Add a node. A repeated id keeps the first occurrence.
    pub fn add_equipment(&mut self, equipment: Equipment) -> NodeIndex {
        if let Some(&idx) = self.indices.get(&equipment.id) {
            tracing::warn!("Duplicate equipment id '{}', keeping first occurrence", equipment.id);
            return idx;
        }
        let id = equipment.id.clone();
        let idx = self.graph.add_node(equipment);
        self.indices.insert(id, idx);
        idx
    }

    /// Record a directed flow edge. Returns false when either endpoint is unknown.
    pub fn connect(&mut self, source_id: &str, target_id: &str) -> bool {
        let (Some(&src), Some(&dst)) = (self.indices.get(source_id), self.indices.get(target_id))
        else {
            return false;
        };

        if self.graph.find_edge(src, dst).is_none() {
            self.graph.add_edge(src, dst, ());
        }

        let source = &mut self.graph[src];
        push_unique(&mut source.downstream, target_id);
        push_unique(&mut source.connected_to, target_id);

        let target = &mut self.graph[dst];
        push_unique(&mut target.upstream, source_id);
        push_unique(&mut target.connected_to, source_id);

        true
    }

    pub fn get(&self, id: &str) -> Option<&Equipment> {
        self.indices.get(id).and_then(|&idx| self.graph.node_weight(idx))
    }

    /// All equipment in identification order.
    pub fn equipment(&self) -> impl Iterator<Item = &Equipment> {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    pub fn of_type(&self, equipment_type: EquipmentType) -> Vec<&Equipment> {
        self.equipment()
            .filter(|e| e.equipment_type == equipment_type)
            .collect()
    }

    pub fn has_type(&self, equipment_type: EquipmentType) -> bool {
        self.equipment().any(|e| e.equipment_type == equipment_type)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `reference_id` feeds `anchor_id` through a direct edge.
    pub fn is_direct_upstream(&self, reference_id: &str, anchor_id: &str) -> bool {
        self.get(anchor_id)
            .map(|a| a.upstream.iter().any(|u| u == reference_id))
            .unwrap_or(false)
    }

    /// Whether flow can travel from `from_id` to `to_id` along recorded edges.
    pub fn has_flow_path(&self, from_id: &str, to_id: &str) -> bool {
        match (self.indices.get(from_id), self.indices.get(to_id)) {
            (Some(&from), Some(&to)) if from != to => {
                has_path_connecting(&self.graph, from, to, None)
            }
            _ => false,
        }
    }

    pub fn counts_by_type(&self) -> BTreeMap<EquipmentType, usize> {
        let mut counts = BTreeMap::new();
        for e in self.equipment() {
            *counts.entry(e.equipment_type).or_insert(0) += 1;
        }
        counts
    }
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|existing| existing == id) {
        list.push(id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::schema::EquipmentSource;
    use crate::parser::schema::BBox;

    fn node(id: &str, t: EquipmentType, x: f64) -> Equipment {
        Equipment::new(
            id,
            t,
            t.code(),
            BBox::new(x - 10.0, 0.0, x + 10.0, 20.0),
            EquipmentSource::Symbol,
        )
    }

    #[test]
    fn test_edges_mirror_into_lists() {
        let graph = FlowGraph::build(
            vec![
                node("f1", EquipmentType::Filter, 0.0),
                node("e1", EquipmentType::Ecu, 100.0),
            ],
            &[Connection::new("f1", "e1"), Connection::new("f1", "e1")],
        );

        let filter = graph.get("f1").unwrap();
        let ecu = graph.get("e1").unwrap();
        assert_eq!(filter.downstream, vec!["e1"]);
        assert_eq!(filter.connected_to, vec!["e1"]);
        assert_eq!(ecu.upstream, vec!["f1"]);
        assert_eq!(ecu.connected_to, vec!["f1"]);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.is_direct_upstream("f1", "e1"));
        assert!(!graph.is_direct_upstream("e1", "f1"));
    }

    #[test]
    fn test_unknown_endpoints_ignored() {
        let graph = FlowGraph::build(
            vec![node("e1", EquipmentType::Ecu, 0.0)],
            &[Connection::new("ghost", "e1"), Connection::new("e1", "ghost")],
        );
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.get("e1").unwrap().upstream.is_empty());
        assert!(graph.get("e1").unwrap().downstream.is_empty());
    }

    #[test]
    fn test_flow_path_is_transitive_and_directed() {
        let graph = FlowGraph::build(
            vec![
                node("h", EquipmentType::Hgu, 0.0),
                node("m", EquipmentType::MixingPump, 50.0),
                node("d", EquipmentType::DegasTank, 100.0),
            ],
            &[Connection::new("h", "m"), Connection::new("m", "d")],
        );
        assert!(graph.has_flow_path("h", "d"));
        assert!(!graph.has_flow_path("d", "h"));
        assert!(!graph.has_flow_path("h", "h"));
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let graph = FlowGraph::build(
            vec![node("x", EquipmentType::Ecu, 0.0), node("x", EquipmentType::Tsu, 5.0)],
            &[],
        );
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.get("x").unwrap().equipment_type, EquipmentType::Ecu);
        assert_eq!(graph.counts_by_type().get(&EquipmentType::Ecu), Some(&1));
    }
}
