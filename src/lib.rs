//! tabflow - pipeline execution core for tabular dataflow graphs

pub mod error;
pub mod executor;
pub mod expr;
pub mod graph;
pub mod join;
pub mod ops;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod transform;
pub mod validate;
pub mod value;

pub use error::{FixSuggestion, TabflowError};
pub use executor::{ExecutionReport, Executor};
pub use graph::PipelineGraph;
pub use join::JoinKind;
pub use pipeline::{Edge, JoinMode, JoinSettings, Node, NodeConfig, NodeKind, Pipeline};
pub use source::{SourceProvider, TableCatalog};
pub use store::{FileStore, MemoryStore, PipelineStore};
pub use transform::{Transform, TransformKind};
pub use value::{Record, Table, Value};
