use std::sync::Arc;

use async_trait::async_trait;
use common::{error::AppError, utils::llm::ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{query_engine::QueryEngine, vector_store::RetrievedNode};

pub const PEOPLE_TOOL_NAME: &str = "people";
pub const PEOPLE_TOOL_DESCRIPTION: &str = "descriptions for various types of people";

/// What a tool handed back to the agent, kept for the final structured response.
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutput {
    pub tool_name: String,
    pub input: String,
    pub content: String,
    pub sources: Vec<RetrievedNode>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn spec(&self) -> ToolSpec;

    /// `arguments` is the raw JSON the model produced for this call.
    async fn call(&self, arguments: &str) -> Result<ToolOutput, AppError>;
}

#[derive(Debug, Deserialize)]
struct QueryToolArgs {
    input: String,
}

/// Read-only tool that answers a sub-question through a [`QueryEngine`].
pub struct QueryEngineTool {
    name: String,
    description: String,
    engine: Arc<QueryEngine>,
}

impl QueryEngineTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>, engine: Arc<QueryEngine>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            engine,
        }
    }

    pub fn people(engine: Arc<QueryEngine>) -> Self {
        Self::new(PEOPLE_TOOL_NAME, PEOPLE_TOOL_DESCRIPTION, engine)
    }
}

fn parse_input(arguments: &str) -> Result<String, AppError> {
    let args: QueryToolArgs = serde_json::from_str(arguments).map_err(|e| {
        AppError::LLMParsing(format!("tool arguments must be {{\"input\": string}}: {e}"))
    })?;

    if args.input.trim().is_empty() {
        return Err(AppError::LLMParsing("tool input is empty".into()));
    }

    Ok(args.input)
}

#[async_trait]
impl Tool for QueryEngineTool {
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "A full natural-language question to look up."
                    }
                },
                "required": ["input"],
                "additionalProperties": false
            }),
        }
    }

    async fn call(&self, arguments: &str) -> Result<ToolOutput, AppError> {
        let input = parse_input(arguments)?;
        let response = self.engine.query(&input).await?;

        Ok(ToolOutput {
            tool_name: self.name.clone(),
            input,
            content: response.answer,
            sources: response.sources,
        })
    }
}
