//! Pipeline executor: materialization, caching, invalidation, edits
//!
//! The executor owns the pipeline definition and the node-id → table cache.
//! Cache entries are written only once a node is fully computed, so a
//! cached table is always complete. All pipeline edits funnel through the
//! executor so every mutation invalidates exactly the downstream cone it
//! affects.

use crate::error::TabflowError;
use crate::graph::PipelineGraph;
use crate::join;
use crate::pipeline::{Edge, JoinSettings, Node, NodeKind, Pipeline};
use crate::source::SourceProvider;
use crate::transform::{self, Transform};
use crate::value::Table;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Outcome of a full pipeline run
#[derive(Debug, Serialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub message: String,
    /// nodes materialized before the run finished or failed
    pub processed: usize,
    /// tables of the pipeline's output nodes (final nodes when the
    /// definition has no explicit outputs), in topological order
    pub results: IndexMap<String, Table>,
}

pub struct Executor {
    pipeline: Pipeline,
    source: Arc<dyn SourceProvider>,
    cache: DashMap<String, Table>,
}

impl Executor {
    pub fn new(pipeline: Pipeline, source: Arc<dyn SourceProvider>) -> Self {
        Self {
            pipeline,
            source,
            cache: DashMap::new(),
        }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn into_pipeline(self) -> Pipeline {
        self.pipeline
    }

    fn graph(&self) -> PipelineGraph {
        PipelineGraph::from_pipeline(&self.pipeline)
    }

    fn node(&self, node_id: &str) -> Result<&Node, TabflowError> {
        self.pipeline
            .node(node_id)
            .ok_or_else(|| TabflowError::NodeNotFound {
                node_id: node_id.to_string(),
            })
    }

    pub fn cached(&self, node_id: &str) -> Option<Table> {
        self.cache.get(node_id).map(|t| t.clone())
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Materialize one node, computing upstream nodes as needed. A cache hit
    /// returns immediately without touching sources.
    pub fn materialize<'a>(
        &'a self,
        node_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Table, TabflowError>> + Send + 'a>> {
        Box::pin(self.materialize_inner(node_id))
    }

    #[instrument(level = "debug", skip(self))]
    async fn materialize_inner(&self, node_id: &str) -> Result<Table, TabflowError> {
        if let Some(hit) = self.cache.get(node_id) {
            debug!(node = node_id, rows = hit.len(), "cache hit");
            return Ok(hit.clone());
        }

        let node = self.node(node_id)?;
        let graph = self.graph();
        let table = match node.kind {
            NodeKind::Dataset => {
                let source_id = node.config.source_id.as_deref().ok_or_else(|| {
                    TabflowError::validation(format!(
                        "dataset node '{node_id}' has no source configured"
                    ))
                })?;
                self.source.table(source_id).await?
            }
            NodeKind::Transform => {
                let input = self.single_input(&graph, node_id)?;
                let upstream = self.materialize(&input).await?;
                transform::apply_all(&node.config.transforms, &upstream)?
            }
            NodeKind::Join => {
                let (left_id, right_id) = self.join_inputs(node_id)?;
                let left = self.materialize(&left_id).await?;
                let right = self.materialize(&right_id).await?;
                self.join_tables(node, &left, &right)?
            }
            NodeKind::Output => {
                let input = self.single_input(&graph, node_id)?;
                self.materialize(&input).await?
            }
        };

        debug!(node = node_id, rows = table.len(), "materialized");
        self.cache.insert(node_id.to_string(), table.clone());
        Ok(table)
    }

    fn single_input(&self, graph: &PipelineGraph, node_id: &str) -> Result<String, TabflowError> {
        graph
            .predecessors_of(node_id)
            .first()
            .cloned()
            .ok_or_else(|| {
                TabflowError::validation(format!("node '{node_id}' has no input connected"))
            })
    }

    /// Resolve the two join inputs: edges marked with target port
    /// "left"/"right" win, otherwise edge order decides
    fn join_inputs(&self, node_id: &str) -> Result<(String, String), TabflowError> {
        let incoming: Vec<&Edge> = self
            .pipeline
            .edges
            .iter()
            .filter(|e| e.target == node_id)
            .collect();
        if incoming.len() < 2 {
            return Err(TabflowError::join(format!(
                "join node '{node_id}' needs two inputs, found {}",
                incoming.len()
            )));
        }

        let by_port = |port: &str| {
            incoming
                .iter()
                .find(|e| e.target_port.as_deref() == Some(port))
                .map(|e| e.source.clone())
        };
        let left = by_port("left").unwrap_or_else(|| incoming[0].source.clone());
        let right = by_port("right")
            .or_else(|| {
                incoming
                    .iter()
                    .map(|e| e.source.clone())
                    .find(|s| *s != left)
            })
            .unwrap_or_else(|| incoming[1].source.clone());
        Ok((left, right))
    }

    fn join_tables(
        &self,
        node: &Node,
        left: &Table,
        right: &Table,
    ) -> Result<Table, TabflowError> {
        let settings = node.config.join.as_ref().ok_or_else(|| {
            TabflowError::join(format!("join node '{}' is not configured", node.id))
        })?;
        match settings.kind.as_join_kind() {
            None => Ok(join::union(left, right)),
            Some(kind) => {
                let left_key = join_key_of(settings, node, true)?;
                let right_key = join_key_of(settings, node, false)?;
                join::join(left, right, left_key, right_key, kind)
            }
        }
    }

    /// Evict a node and everything downstream of it from the cache
    #[instrument(level = "debug", skip(self))]
    pub fn invalidate(&self, node_id: &str) {
        let graph = self.graph();
        for id in graph.downstream(node_id) {
            if self.cache.remove(&id).is_some() {
                debug!(node = %id, "evicted");
            }
        }
    }

    /// Clear the cache and materialize every node in topological order.
    /// The first failure stops the run; no partial table enters the report.
    #[instrument(skip(self), fields(pipeline = %self.pipeline.id))]
    pub async fn execute_all(&self) -> ExecutionReport {
        self.cache.clear();

        let order = match self.graph().topological_order() {
            Ok(order) => order,
            Err(e) => {
                warn!(error = %e, "execution refused");
                return ExecutionReport {
                    success: false,
                    message: e.to_string(),
                    processed: 0,
                    results: IndexMap::new(),
                };
            }
        };

        let mut processed = 0;
        for node_id in &order {
            if let Err(e) = self.materialize(node_id).await {
                warn!(node = %node_id, error = %e, "node failed");
                return ExecutionReport {
                    success: false,
                    message: format!("node '{node_id}' failed: {e}"),
                    processed,
                    results: IndexMap::new(),
                };
            }
            processed += 1;
        }

        let mut results = IndexMap::new();
        for node_id in self.result_nodes(&order) {
            if let Some(table) = self.cached(&node_id) {
                results.insert(node_id, table);
            }
        }

        info!(processed, "pipeline executed");
        ExecutionReport {
            success: true,
            message: format!("executed {processed} nodes"),
            processed,
            results,
        }
    }

    /// Output nodes in topological order; final nodes when the pipeline
    /// declares no outputs
    fn result_nodes(&self, order: &[String]) -> Vec<String> {
        let outputs: Vec<String> = order
            .iter()
            .filter(|id| {
                self.pipeline
                    .node(id)
                    .is_some_and(|n| n.kind == NodeKind::Output)
            })
            .cloned()
            .collect();
        if !outputs.is_empty() {
            return outputs;
        }
        let graph = self.graph();
        order
            .iter()
            .filter(|id| graph.successors_of(id).is_empty())
            .cloned()
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Edit API: every pipeline mutation goes through here so the
    // cache can never go stale
    // ─────────────────────────────────────────────────────────────

    pub fn add_node(&mut self, node: Node) {
        self.pipeline.nodes.push(node);
        self.pipeline.touch();
    }

    /// Remove a node, its incident edges, and its downstream cache cone
    pub fn remove_node(&mut self, node_id: &str) -> Result<(), TabflowError> {
        self.node(node_id)?;
        self.invalidate(node_id);
        self.pipeline.nodes.retain(|n| n.id != node_id);
        self.pipeline
            .edges
            .retain(|e| e.source != node_id && e.target != node_id);
        self.pipeline.touch();
        Ok(())
    }

    /// Connect two nodes. A duplicate source→target pair is a silent no-op;
    /// an edge that would close a cycle is refused.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), TabflowError> {
        self.node(&edge.source)?;
        self.node(&edge.target)?;
        if self
            .pipeline
            .edges
            .iter()
            .any(|e| e.source == edge.source && e.target == edge.target)
        {
            return Ok(());
        }
        if self.graph().has_path(&edge.target, &edge.source) {
            return Err(TabflowError::Cycle);
        }
        let target = edge.target.clone();
        self.pipeline.edges.push(edge);
        self.pipeline.touch();
        self.invalidate(&target);
        Ok(())
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> Result<(), TabflowError> {
        let edge = self
            .pipeline
            .edges
            .iter()
            .find(|e| e.id == edge_id)
            .cloned()
            .ok_or_else(|| {
                TabflowError::validation(format!("edge '{edge_id}' does not exist"))
            })?;
        self.invalidate(&edge.target);
        self.pipeline.edges.retain(|e| e.id != edge_id);
        self.pipeline.touch();
        Ok(())
    }

    pub fn set_transforms(
        &mut self,
        node_id: &str,
        transforms: Vec<Transform>,
    ) -> Result<(), TabflowError> {
        self.with_node(node_id, |node| node.config.transforms = transforms)
    }

    pub fn add_transform(
        &mut self,
        node_id: &str,
        transform: Transform,
    ) -> Result<(), TabflowError> {
        self.with_node(node_id, |node| node.config.transforms.push(transform))
    }

    /// Replace a transform in place, matched by id
    pub fn update_transform(
        &mut self,
        node_id: &str,
        transform: Transform,
    ) -> Result<(), TabflowError> {
        let node = self
            .pipeline
            .node_mut(node_id)
            .ok_or_else(|| TabflowError::NodeNotFound {
                node_id: node_id.to_string(),
            })?;
        let slot = node
            .config
            .transforms
            .iter_mut()
            .find(|t| t.id == transform.id)
            .ok_or_else(|| {
                TabflowError::validation(format!(
                    "transform '{}' does not exist on node '{node_id}'",
                    transform.id
                ))
            })?;
        *slot = transform;
        self.pipeline.touch();
        self.invalidate(node_id);
        Ok(())
    }

    pub fn remove_transform(
        &mut self,
        node_id: &str,
        transform_id: &str,
    ) -> Result<(), TabflowError> {
        self.with_node(node_id, |node| {
            node.config.transforms.retain(|t| t.id != transform_id)
        })
    }

    pub fn set_source(
        &mut self,
        node_id: &str,
        source_id: impl Into<String>,
    ) -> Result<(), TabflowError> {
        let source_id = source_id.into();
        self.with_node(node_id, |node| node.config.source_id = Some(source_id))
    }

    pub fn set_join(
        &mut self,
        node_id: &str,
        settings: JoinSettings,
    ) -> Result<(), TabflowError> {
        self.with_node(node_id, |node| node.config.join = Some(settings))
    }

    /// Apply a config mutation and invalidate the node's downstream cone
    fn with_node(
        &mut self,
        node_id: &str,
        mutate: impl FnOnce(&mut Node),
    ) -> Result<(), TabflowError> {
        let node = self
            .pipeline
            .node_mut(node_id)
            .ok_or_else(|| TabflowError::NodeNotFound {
                node_id: node_id.to_string(),
            })?;
        mutate(node);
        self.pipeline.touch();
        self.invalidate(node_id);
        Ok(())
    }
}

fn join_key_of<'a>(
    settings: &'a JoinSettings,
    node: &Node,
    left: bool,
) -> Result<&'a str, TabflowError> {
    let (key, side) = if left {
        (settings.left_key.as_deref(), "leftKey")
    } else {
        (settings.right_key.as_deref(), "rightKey")
    };
    key.ok_or_else(|| TabflowError::join(format!("join node '{}' is missing '{side}'", node.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::JoinMode;
    use crate::source::TableCatalog;
    use crate::transform::TransformKind;
    use crate::value::{Record, Value};
    use serde_json::json;

    fn sales_table() -> Table {
        [("x", 1.0), ("x", 3.0), ("y", 5.0)]
            .iter()
            .map(|(cat, v)| {
                let mut r = Record::new();
                r.insert("cat".to_string(), Value::from(*cat));
                r.insert("v".to_string(), Value::Number(*v));
                r
            })
            .collect()
    }

    fn fixture() -> Executor {
        let catalog = TableCatalog::new();
        catalog.register("sales", sales_table());

        let mut pipeline = Pipeline::new("demo");
        let mut dataset = Node::dataset("sales");
        dataset.id = "d1".to_string();
        let mut top = Node::new(NodeKind::Transform, "top");
        top.id = "t1".to_string();
        top.config.transforms = vec![Transform::new(
            TransformKind::Filter,
            json!({"column": "v", "operator": "greaterThan", "value": 2}),
        )];
        pipeline.nodes.push(dataset);
        pipeline.nodes.push(top);
        pipeline.edges.push(Edge::new("d1", "t1"));

        Executor::new(pipeline, Arc::new(catalog))
    }

    #[tokio::test]
    async fn materialize_runs_the_chain() {
        let exec = fixture();
        let table = exec.materialize("t1").await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(exec.cached_count(), 2);
    }

    #[tokio::test]
    async fn invalidate_evicts_downstream_only() {
        let exec = fixture();
        exec.materialize("t1").await.unwrap();
        exec.invalidate("t1");
        assert!(exec.cached("t1").is_none());
        assert!(exec.cached("d1").is_some());
    }

    #[tokio::test]
    async fn execute_all_reports_processed() {
        let exec = fixture();
        let report = exec.execute_all().await;
        assert!(report.success);
        assert_eq!(report.processed, 2);
        // no output nodes declared, the final node carries the result
        assert!(report.results.contains_key("t1"));
    }

    #[tokio::test]
    async fn cycle_refuses_execution() {
        let mut exec = fixture();
        let err = exec.add_edge(Edge::new("t1", "d1")).unwrap_err();
        assert!(matches!(err, TabflowError::Cycle));
    }

    #[tokio::test]
    async fn duplicate_edge_is_a_no_op() {
        let mut exec = fixture();
        exec.add_edge(Edge::new("d1", "t1")).unwrap();
        assert_eq!(exec.pipeline().edges.len(), 1);
    }

    #[tokio::test]
    async fn editing_transforms_invalidates() {
        let mut exec = fixture();
        exec.materialize("t1").await.unwrap();
        exec.add_transform(
            "t1",
            Transform::new(TransformKind::Limit, json!({"count": 1})),
        )
        .unwrap();
        assert!(exec.cached("t1").is_none());
        let table = exec.materialize("t1").await.unwrap();
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn join_by_target_ports() {
        let catalog = TableCatalog::new();
        catalog.register("sales", sales_table());
        let mut names = Table::new();
        let mut r = Record::new();
        r.insert("cat".to_string(), Value::from("x"));
        r.insert("label".to_string(), Value::from("export"));
        names.push(r);
        catalog.register("names", names);

        let mut pipeline = Pipeline::new("join demo");
        let mut a = Node::dataset("sales");
        a.id = "a".to_string();
        let mut b = Node::dataset("names");
        b.id = "b".to_string();
        let mut j = Node::new(NodeKind::Join, "join");
        j.id = "j".to_string();
        j.config.join = Some(JoinSettings {
            kind: JoinMode::Inner,
            left_key: Some("cat".to_string()),
            right_key: Some("cat".to_string()),
        });
        pipeline.nodes.extend([a, b, j]);
        pipeline
            .edges
            .push(Edge::new("a", "j").with_target_port("left"));
        pipeline
            .edges
            .push(Edge::new("b", "j").with_target_port("right"));

        let exec = Executor::new(pipeline, Arc::new(catalog));
        let table = exec.materialize("j").await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0]["label"], Value::from("export"));
    }

    #[tokio::test]
    async fn misconfigured_dataset_fails_cleanly() {
        let mut exec = fixture();
        exec.set_source("d1", "ghost").unwrap();
        let report = exec.execute_all().await;
        assert!(!report.success);
        assert!(report.message.contains("ghost"));
        assert_eq!(report.processed, 0);
    }
}
