use std::any::Any;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WaypointError {
    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Routing errors
    #[error("Path extraction failed: {0}")]
    Extraction(String),

    #[error("Invalid execution context: {0}")]
    Context(String),

    #[error("Graph snapshot failed: {0}")]
    Graph(String),

    #[error("Candidate judge failed: {0}")]
    Judge(String),

    // Agent errors
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Agent execution failed: {agent}: {message}")]
    AgentExecution { agent: String, message: String },

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WaypointError {
    /// Build an `AgentExecution` error.
    pub fn agent(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AgentExecution {
            agent: agent.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WaypointError>;

/// Render a caught panic payload as a readable message.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
