//! Dependency graph over pipeline nodes
//!
//! Built fresh from a pipeline definition; cheap for editor-scale graphs.
//! Edges referencing unknown nodes are ignored here and caught by pipeline
//! validation.

use crate::error::TabflowError;
use crate::pipeline::Pipeline;
use std::collections::{HashMap, HashSet, VecDeque};

pub struct PipelineGraph {
    /// node_id -> successor node_ids, in edge order
    adjacency: HashMap<String, Vec<String>>,
    /// node_id -> predecessor node_ids, in edge order
    predecessors: HashMap<String, Vec<String>>,
    /// all node ids, in definition order
    node_ids: Vec<String>,
}

impl PipelineGraph {
    pub fn from_pipeline(pipeline: &Pipeline) -> Self {
        let capacity = pipeline.nodes.len();
        let mut adjacency: HashMap<String, Vec<String>> = HashMap::with_capacity(capacity);
        let mut predecessors: HashMap<String, Vec<String>> = HashMap::with_capacity(capacity);
        let mut node_ids = Vec::with_capacity(capacity);

        for node in &pipeline.nodes {
            node_ids.push(node.id.clone());
            adjacency.insert(node.id.clone(), Vec::new());
            predecessors.insert(node.id.clone(), Vec::new());
        }

        for edge in &pipeline.edges {
            if !adjacency.contains_key(&edge.source) || !adjacency.contains_key(&edge.target) {
                continue;
            }
            adjacency
                .entry(edge.source.clone())
                .or_default()
                .push(edge.target.clone());
            predecessors
                .entry(edge.target.clone())
                .or_default()
                .push(edge.source.clone());
        }

        Self { adjacency, predecessors, node_ids }
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.adjacency.contains_key(node_id)
    }

    #[inline]
    pub fn predecessors_of(&self, node_id: &str) -> &[String] {
        static EMPTY: &[String] = &[];
        self.predecessors
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    #[inline]
    pub fn successors_of(&self, node_id: &str) -> &[String] {
        static EMPTY: &[String] = &[];
        self.adjacency
            .get(node_id)
            .map(|v| v.as_slice())
            .unwrap_or(EMPTY)
    }

    /// Nodes with no successors
    pub fn final_nodes(&self) -> Vec<String> {
        self.node_ids
            .iter()
            .filter(|id| self.successors_of(id).is_empty())
            .cloned()
            .collect()
    }

    /// Kahn's algorithm. Deterministic: the ready queue is seeded and fed in
    /// node definition order. If any node never reaches in-degree zero the
    /// graph is cyclic and no partial order escapes.
    pub fn topological_order(&self) -> Result<Vec<String>, TabflowError> {
        let mut in_degree: HashMap<&str, usize> = self
            .node_ids
            .iter()
            .map(|id| (id.as_str(), self.predecessors_of(id).len()))
            .collect();

        let mut queue: VecDeque<&str> = self
            .node_ids
            .iter()
            .map(String::as_str)
            .filter(|id| in_degree[id] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.node_ids.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.to_string());
            for next in self.successors_of(id) {
                let degree = in_degree
                    .get_mut(next.as_str())
                    .ok_or_else(|| TabflowError::validation(format!("unknown node '{next}'")))?;
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(next);
                }
            }
        }

        if order.len() < self.node_ids.len() {
            return Err(TabflowError::Cycle);
        }
        Ok(order)
    }

    pub fn has_cycle(&self) -> bool {
        self.topological_order().is_err()
    }

    /// Is there a directed path from `from` to `to`?
    pub fn has_path(&self, from: &str, to: &str) -> bool {
        if from == to {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(from);
        visited.insert(from);

        while let Some(current) = queue.pop_front() {
            for next in self.successors_of(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    /// The node and everything reachable downstream of it, BFS order
    pub fn downstream(&self, node_id: &str) -> Vec<String> {
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut out = Vec::new();
        queue.push_back(node_id);
        visited.insert(node_id);

        while let Some(current) = queue.pop_front() {
            out.push(current.to_string());
            for next in self.successors_of(current) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Edge, Node, NodeKind};

    fn diamond() -> Pipeline {
        let mut p = Pipeline::new("diamond");
        for id in ["a", "b", "c", "d"] {
            let mut node = Node::new(NodeKind::Transform, id);
            node.id = id.to_string();
            p.nodes.push(node);
        }
        p.edges.push(Edge::new("a", "b"));
        p.edges.push(Edge::new("a", "c"));
        p.edges.push(Edge::new("b", "d"));
        p.edges.push(Edge::new("c", "d"));
        p
    }

    #[test]
    fn topological_order_respects_edges() {
        let graph = PipelineGraph::from_pipeline(&diamond());
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 4);
        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("a") < pos("c"));
        assert!(pos("b") < pos("d"));
        assert!(pos("c") < pos("d"));
    }

    #[test]
    fn cycle_yields_no_partial_order() {
        let mut p = diamond();
        p.edges.push(Edge::new("d", "a"));
        let graph = PipelineGraph::from_pipeline(&p);
        assert!(matches!(
            graph.topological_order(),
            Err(TabflowError::Cycle)
        ));
        assert!(graph.has_cycle());
    }

    #[test]
    fn downstream_covers_descendants_and_self() {
        let graph = PipelineGraph::from_pipeline(&diamond());
        let mut down = graph.downstream("b");
        down.sort();
        assert_eq!(down, ["b", "d"]);
        assert_eq!(graph.downstream("d"), ["d"]);
    }

    #[test]
    fn path_queries() {
        let graph = PipelineGraph::from_pipeline(&diamond());
        assert!(graph.has_path("a", "d"));
        assert!(!graph.has_path("b", "c"));
        assert!(graph.has_path("b", "b"));
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let mut p = diamond();
        p.edges.push(Edge::new("ghost", "a"));
        let graph = PipelineGraph::from_pipeline(&p);
        assert!(graph.topological_order().is_ok());
    }

    #[test]
    fn final_nodes_have_no_successors() {
        let graph = PipelineGraph::from_pipeline(&diamond());
        assert_eq!(graph.final_nodes(), ["d"]);
    }
}
