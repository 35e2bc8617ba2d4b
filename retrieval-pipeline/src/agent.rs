use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::llm::{ChatMessage, ChatModel, ToolCall, ToolSpec},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    response::{AgentResponse, StructuredResponse},
    tools::{Tool, ToolOutput},
};

const AGENT_SYSTEM_MESSAGE: &str = "You are designed to help with a variety of tasks, \
from answering questions to providing summaries to other types of analyses. \
You have access to tools that look up information; prefer them over prior knowledge \
whenever the question concerns the topics they describe. \
Call a tool with a complete natural-language question. \
When you have enough information, reply with the final answer only, \
in the same language as the user's question.";

#[async_trait]
pub trait QueryAgent: Send + Sync {
    async fn query(&self, text: &str) -> Result<AgentResponse, AppError>;
}

/// Tool-calling loop: the model either answers or asks for tools, whose observations
/// are appended to the transcript before the next turn.
pub struct ReasoningAgent {
    llm: Arc<dyn ChatModel>,
    tools: Vec<Arc<dyn Tool>>,
    max_iterations: usize,
    verbose: bool,
}

impl ReasoningAgent {
    pub fn new(
        llm: Arc<dyn ChatModel>,
        tools: Vec<Arc<dyn Tool>>,
        max_iterations: usize,
        verbose: bool,
    ) -> Self {
        Self {
            llm,
            tools,
            max_iterations: max_iterations.max(1),
            verbose,
        }
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.spec().name == name)
    }

    fn trace(&self, step: usize, message: &str) {
        if self.verbose {
            info!(step, "{message}");
        } else {
            debug!(step, "{message}");
        }
    }

    async fn observe(&self, call: &ToolCall) -> (String, Option<ToolOutput>) {
        let Some(tool) = self.find_tool(&call.name) else {
            warn!(tool = %call.name, "Model requested an unknown tool");
            return (
                format!("Error: no tool named '{}' is available", call.name),
                None,
            );
        };

        match tool.call(&call.arguments).await {
            Ok(output) => (output.content.clone(), Some(output)),
            Err(AppError::LLMParsing(reason)) => {
                warn!(tool = %call.name, %reason, "Tool arguments rejected");
                (
                    r#"Error: invalid arguments, expected {"input": "<question>"}"#.to_string(),
                    None,
                )
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call failed");
                (
                    format!("Error: the '{}' tool is unavailable right now", call.name),
                    None,
                )
            }
        }
    }
}

#[async_trait]
impl QueryAgent for ReasoningAgent {
    #[instrument(skip_all, fields(model = self.llm.model_name()))]
    async fn query(&self, text: &str) -> Result<AgentResponse, AppError> {
        let specs: Vec<ToolSpec> = self.tools.iter().map(|tool| tool.spec()).collect();
        let mut transcript = vec![
            ChatMessage::System(AGENT_SYSTEM_MESSAGE.to_string()),
            ChatMessage::User(text.to_string()),
        ];
        let mut sources = Vec::new();

        for step in 1..=self.max_iterations {
            let turn = self.llm.complete(&transcript, &specs).await?;

            if turn.tool_calls.is_empty() {
                let answer = turn.content.unwrap_or_default();
                self.trace(step, &format!("Answer: {answer}"));
                return Ok(AgentResponse::Structured(StructuredResponse {
                    response: Some(answer),
                    sources,
                }));
            }

            if let Some(thought) = turn.content.as_deref().filter(|t| !t.trim().is_empty()) {
                self.trace(step, &format!("Thought: {thought}"));
            }

            transcript.push(ChatMessage::Assistant {
                content: turn.content.clone(),
                tool_calls: turn.tool_calls.clone(),
            });

            for call in turn.tool_calls {
                self.trace(
                    step,
                    &format!("Action: {} Input: {}", call.name, call.arguments),
                );
                let (observation, output) = self.observe(&call).await;
                self.trace(step, &format!("Observation: {observation}"));

                sources.extend(output);
                transcript.push(ChatMessage::Tool {
                    call_id: call.id,
                    content: observation,
                });
            }
        }

        Err(AppError::Upstream(format!(
            "agent reached {} iterations without a final answer",
            self.max_iterations
        )))
    }
}
