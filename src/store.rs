//! Pipeline persistence boundary
//!
//! The execution core is storage-agnostic; these are the two stock
//! implementations. `FileStore` keeps one YAML file per pipeline id in a
//! directory.

use crate::error::TabflowError;
use crate::pipeline::Pipeline;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait PipelineStore: Send + Sync {
    async fn load(&self, id: &str) -> Result<Pipeline, TabflowError>;
    async fn save(&self, pipeline: &Pipeline) -> Result<(), TabflowError>;
    async fn delete(&self, id: &str) -> Result<(), TabflowError>;
    async fn list(&self) -> Result<Vec<String>, TabflowError>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    pipelines: DashMap<String, Pipeline>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PipelineStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Pipeline, TabflowError> {
        self.pipelines
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| TabflowError::PipelineNotFound {
                pipeline_id: id.to_string(),
            })
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<(), TabflowError> {
        self.pipelines.insert(pipeline.id.clone(), pipeline.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), TabflowError> {
        self.pipelines
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| TabflowError::PipelineNotFound {
                pipeline_id: id.to_string(),
            })
    }

    async fn list(&self) -> Result<Vec<String>, TabflowError> {
        Ok(self.pipelines.iter().map(|e| e.key().clone()).collect())
    }
}

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.yaml"))
    }
}

#[async_trait]
impl PipelineStore for FileStore {
    async fn load(&self, id: &str) -> Result<Pipeline, TabflowError> {
        let path = self.path_for(id);
        let yaml = match tokio::fs::read_to_string(&path).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TabflowError::PipelineNotFound {
                    pipeline_id: id.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_yaml::from_str(&yaml)?)
    }

    async fn save(&self, pipeline: &Pipeline) -> Result<(), TabflowError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&pipeline.id);
        debug!(pipeline = %pipeline.id, path = %path.display(), "saving pipeline");
        let yaml = serde_yaml::to_string(pipeline)?;
        tokio::fs::write(&path, yaml).await?;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), TabflowError> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(TabflowError::PipelineNotFound {
                    pipeline_id: id.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<String>, TabflowError> {
        let mut ids = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
                if let Some(stem) = stem_of(&path) {
                    ids.push(stem);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
}
