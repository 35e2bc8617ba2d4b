use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

use crate::auth::AuthError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Initialization error: {0}")]
    Initialization(String),
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Query timed out after {0} seconds")]
    Timeout(u64),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Errors raised by the caller's own request rather than by the agent or its dependencies.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Validation(_))
    }
}
