//! Error types with fix suggestions

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
#[derive(Error, Debug)]
pub enum TabflowError {
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Graph errors
    // ─────────────────────────────────────────────────────────────

    #[error("Pipeline contains a cycle; execution refused")]
    Cycle,

    #[error("Node '{node_id}' not found in pipeline")]
    NodeNotFound { node_id: String },

    #[error("Pipeline '{pipeline_id}' not found")]
    PipelineNotFound { pipeline_id: String },

    // ─────────────────────────────────────────────────────────────
    // Transform errors
    // ─────────────────────────────────────────────────────────────

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Expression error: {message}")]
    Expression { message: String },

    #[error("Join error: {message}")]
    JoinConfig { message: String },

    #[error("Dataset '{source_id}' not found")]
    SourceNotFound { source_id: String },
}

impl TabflowError {
    pub fn validation(message: impl Into<String>) -> Self {
        TabflowError::Validation {
            message: message.into(),
        }
    }

    pub fn expression(message: impl Into<String>) -> Self {
        TabflowError::Expression {
            message: message.into(),
        }
    }

    pub fn join(message: impl Into<String>) -> Self {
        TabflowError::JoinConfig {
            message: message.into(),
        }
    }
}

impl FixSuggestion for TabflowError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            TabflowError::YamlParse(_) => Some("Check YAML syntax: indentation and quoting"),
            TabflowError::JsonParse(_) => Some("Check the file is valid JSON"),
            TabflowError::Io(_) => Some("Check file path and permissions"),
            TabflowError::Cycle => {
                Some("Remove the edge that closes the loop; pipelines must be acyclic")
            }
            TabflowError::NodeNotFound { .. } => {
                Some("Verify the node id exists in the pipeline definition")
            }
            TabflowError::PipelineNotFound { .. } => {
                Some("Verify the pipeline id and that it was saved")
            }
            TabflowError::Validation { .. } => {
                Some("Fix the transform's parameters; the message lists what is missing")
            }
            TabflowError::Expression { .. } => {
                Some("Check the expression syntax; only whitelisted functions are allowed")
            }
            TabflowError::JoinConfig { .. } => {
                Some("Check the join key columns exist on both inputs")
            }
            TabflowError::SourceNotFound { .. } => {
                Some("Register the dataset with the source catalog before running")
            }
        }
    }
}
