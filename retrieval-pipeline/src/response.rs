use serde::Serialize;

use crate::tools::ToolOutput;

/// Everything an agent can hand back. Callers only ever need [`AgentResponse::into_text`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AgentResponse {
    Text(String),
    Structured(StructuredResponse),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StructuredResponse {
    pub response: Option<String>,
    pub sources: Vec<ToolOutput>,
}

impl AgentResponse {
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Structured(structured) => structured.response.unwrap_or_default(),
        }
    }

    pub fn sources(&self) -> &[ToolOutput] {
        match self {
            Self::Text(_) => &[],
            Self::Structured(structured) => &structured.sources,
        }
    }
}

impl From<String> for AgentResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for AgentResponse {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}
