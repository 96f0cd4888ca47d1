//! Source tables: where dataset nodes pull their data from

use crate::error::TabflowError;
use crate::value::Table;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

/// Supplies the table behind a dataset node's `source_id`
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn table(&self, source_id: &str) -> Result<Table, TabflowError>;

    /// Known source ids, for diagnostics
    async fn source_ids(&self) -> Vec<String>;
}

/// In-memory catalog of named tables
#[derive(Clone, Default)]
pub struct TableCatalog {
    tables: Arc<DashMap<String, Table>>,
}

impl TableCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, source_id: impl Into<String>, table: Table) {
        self.tables.insert(source_id.into(), table);
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.tables.contains_key(source_id)
    }
}

#[async_trait]
impl SourceProvider for TableCatalog {
    async fn table(&self, source_id: &str) -> Result<Table, TabflowError> {
        self.tables
            .get(source_id)
            .map(|t| t.clone())
            .ok_or_else(|| TabflowError::SourceNotFound {
                source_id: source_id.to_string(),
            })
    }

    async fn source_ids(&self) -> Vec<String> {
        self.tables.iter().map(|e| e.key().clone()).collect()
    }
}
