//! End-to-end executor behavior: ordering, memoization, invalidation,
//! joins and transform chains

use async_trait::async_trait;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tabflow::{
    Edge, Executor, JoinMode, JoinSettings, Node, NodeKind, Pipeline, Record, SourceProvider,
    TabflowError, Table, TableCatalog, Transform, TransformKind, Value,
};

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn orders() -> Table {
    vec![
        record(&[
            ("id", Value::Number(1.0)),
            ("cat", Value::from("x")),
            ("price", Value::Number(100.0)),
        ]),
        record(&[
            ("id", Value::Number(2.0)),
            ("cat", Value::from("x")),
            ("price", Value::Number(600.0)),
        ]),
        record(&[
            ("id", Value::Number(3.0)),
            ("cat", Value::from("y")),
            ("price", Value::Number(250.0)),
        ]),
    ]
}

/// Counts how many times each source is actually pulled, to make cache
/// hits observable
struct CountingSource {
    inner: TableCatalog,
    pulls: AtomicUsize,
}

impl CountingSource {
    fn new(inner: TableCatalog) -> Self {
        Self {
            inner,
            pulls: AtomicUsize::new(0),
        }
    }

    fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for CountingSource {
    async fn table(&self, source_id: &str) -> Result<Table, TabflowError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        self.inner.table(source_id).await
    }

    async fn source_ids(&self) -> Vec<String> {
        self.inner.source_ids().await
    }
}

fn node(id: &str, kind: NodeKind) -> Node {
    let mut n = Node::new(kind, id);
    n.id = id.to_string();
    n
}

/// dataset → filter(price > 500) → output
fn linear_pipeline() -> Pipeline {
    let mut pipeline = Pipeline::new("linear");
    let mut dataset = node("d", NodeKind::Dataset);
    dataset.config.source_id = Some("orders".to_string());
    let mut expensive = node("t", NodeKind::Transform);
    expensive.config.transforms = vec![Transform::new(
        TransformKind::Filter,
        json!({"column": "price", "operator": "greaterThan", "value": 500}),
    )];
    let out = node("o", NodeKind::Output);
    pipeline.nodes.extend([dataset, expensive, out]);
    pipeline.edges.push(Edge::new("d", "t"));
    pipeline.edges.push(Edge::new("t", "o"));
    pipeline
}

fn counting_executor(pipeline: Pipeline) -> (Executor, Arc<CountingSource>) {
    let catalog = TableCatalog::new();
    catalog.register("orders", orders());
    let source = Arc::new(CountingSource::new(catalog));
    (Executor::new(pipeline, source.clone()), source)
}

#[tokio::test]
async fn materialize_is_memoized() {
    let (exec, source) = counting_executor(linear_pipeline());

    let first = exec.materialize("o").await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(source.pulls(), 1);

    // second call is a pure cache hit, the source is not consulted again
    let second = exec.materialize("o").await.unwrap();
    assert_eq!(second, first);
    assert_eq!(source.pulls(), 1);
}

#[tokio::test]
async fn invalidate_evicts_node_and_descendants_only() {
    let (exec, source) = counting_executor(linear_pipeline());
    exec.materialize("o").await.unwrap();
    assert_eq!(exec.cached_count(), 3);

    exec.invalidate("t");
    assert!(exec.cached("d").is_some());
    assert!(exec.cached("t").is_none());
    assert!(exec.cached("o").is_none());

    // recompute reuses the still-cached dataset
    exec.materialize("o").await.unwrap();
    assert_eq!(source.pulls(), 1);
}

#[tokio::test]
async fn execute_all_covers_every_node_in_order() {
    let (exec, _) = counting_executor(linear_pipeline());
    let report = exec.execute_all().await;
    assert!(report.success);
    assert_eq!(report.processed, 3);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results["o"].len(), 1);
    assert_eq!(report.results["o"][0]["price"], Value::Number(600.0));
}

#[tokio::test]
async fn cyclic_pipeline_refuses_with_no_partial_results() {
    let mut pipeline = linear_pipeline();
    pipeline.edges.push(Edge::new("o", "d"));
    let (exec, source) = counting_executor(pipeline);

    let report = exec.execute_all().await;
    assert!(!report.success);
    assert_eq!(report.processed, 0);
    assert!(report.results.is_empty());
    assert_eq!(source.pulls(), 0);
}

#[tokio::test]
async fn inner_join_round_trip_reproduces_matching_subset() {
    let catalog = TableCatalog::new();
    catalog.register("orders", orders());
    catalog.register(
        "labels",
        vec![
            record(&[("cat", Value::from("x")), ("label", Value::from("export"))]),
            record(&[("cat", Value::from("z")), ("label", Value::from("unused"))]),
        ],
    );

    let mut pipeline = Pipeline::new("join");
    let mut left = node("l", NodeKind::Dataset);
    left.config.source_id = Some("orders".to_string());
    let mut right = node("r", NodeKind::Dataset);
    right.config.source_id = Some("labels".to_string());
    let mut joined = node("j", NodeKind::Join);
    joined.config.join = Some(JoinSettings {
        kind: JoinMode::Inner,
        left_key: Some("cat".to_string()),
        right_key: Some("cat".to_string()),
    });
    pipeline.nodes.extend([left, right, joined]);
    pipeline
        .edges
        .push(Edge::new("l", "j").with_target_port("left"));
    pipeline
        .edges
        .push(Edge::new("r", "j").with_target_port("right"));

    let exec = Executor::new(pipeline, Arc::new(catalog));
    let table = exec.materialize("j").await.unwrap();

    // only the two category-x orders match; their order and columns survive
    assert_eq!(table.len(), 2);
    for (row, expected_id) in table.iter().zip([1.0, 2.0]) {
        assert_eq!(row["id"], Value::Number(expected_id));
        assert_eq!(row["label"], Value::from("export"));
    }
}

#[tokio::test]
async fn union_join_node_concatenates() {
    let catalog = TableCatalog::new();
    catalog.register("orders", orders());

    let mut pipeline = Pipeline::new("union");
    let mut a = node("a", NodeKind::Dataset);
    a.config.source_id = Some("orders".to_string());
    let mut b = node("b", NodeKind::Dataset);
    b.config.source_id = Some("orders".to_string());
    let mut u = node("u", NodeKind::Join);
    u.config.join = Some(JoinSettings {
        kind: JoinMode::Union,
        left_key: None,
        right_key: None,
    });
    pipeline.nodes.extend([a, b, u]);
    pipeline.edges.push(Edge::new("a", "u"));
    pipeline.edges.push(Edge::new("b", "u"));

    let exec = Executor::new(pipeline, Arc::new(catalog));
    let table = exec.materialize("u").await.unwrap();
    assert_eq!(table.len(), 6);
}

#[tokio::test]
async fn all_disabled_transforms_pass_input_through() {
    let mut pipeline = linear_pipeline();
    for t in &mut pipeline.node_mut("t").unwrap().config.transforms {
        t.enabled = false;
    }
    let (exec, _) = counting_executor(pipeline);
    let table = exec.materialize("t").await.unwrap();
    assert_eq!(table, orders());
}

#[tokio::test]
async fn transform_chain_groups_after_filter() {
    let mut pipeline = linear_pipeline();
    let transforms = vec![
        Transform::new(
            TransformKind::Filter,
            json!({"column": "price", "operator": "greaterThan", "value": 50}),
        ),
        Transform::new(
            TransformKind::GroupBy,
            json!({"columns": ["cat"], "aggregations": [{"column": "price", "operation": "sum"}]}),
        ),
        Transform::new(TransformKind::Sort, json!({"column": "sum_price", "direction": "desc"})),
    ];
    pipeline.node_mut("t").unwrap().config.transforms = transforms;

    let (exec, _) = counting_executor(pipeline);
    let table = exec.materialize("o").await.unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(table[0]["cat"], Value::from("x"));
    assert_eq!(table[0]["sum_price"], Value::Number(700.0));
    assert_eq!(table[1]["sum_price"], Value::Number(250.0));
}

#[tokio::test]
async fn failed_transform_stops_the_run() {
    let mut pipeline = linear_pipeline();
    pipeline.node_mut("t").unwrap().config.transforms = vec![Transform::new(
        TransformKind::Filter,
        json!({"column": "missing_column", "operator": "equals", "value": 1}),
    )];
    let (exec, _) = counting_executor(pipeline);

    let report = exec.execute_all().await;
    assert!(!report.success);
    assert!(report.message.contains("missing_column"));
    // the dataset node materialized before the failure
    assert_eq!(report.processed, 1);
}

#[tokio::test]
async fn removing_a_node_cascades_edges_and_cache() {
    let (mut exec, _) = counting_executor(linear_pipeline());
    exec.materialize("o").await.unwrap();

    exec.remove_node("t").unwrap();
    assert!(exec.pipeline().node("t").is_none());
    assert!(exec
        .pipeline()
        .edges
        .iter()
        .all(|e| e.source != "t" && e.target != "t"));
    assert!(exec.cached("t").is_none());
    assert!(exec.cached("o").is_none());
    assert!(exec.cached("d").is_some());
}

#[tokio::test]
async fn update_transform_replaces_by_id() {
    let (mut exec, _) = counting_executor(linear_pipeline());
    exec.materialize("o").await.unwrap();

    let mut replacement = exec.pipeline().node("t").unwrap().config.transforms[0].clone();
    replacement.params = json!({"column": "price", "operator": "lessThan", "value": 500});
    exec.update_transform("t", replacement).unwrap();

    let table = exec.materialize("o").await.unwrap();
    assert_eq!(table.len(), 2);
}
