//! Chat completion seam used by the query engine and the reasoning agent.
//!
//! The agent keeps its transcript in the provider-neutral [`ChatMessage`] type; only
//! [`OpenAIChatModel`] knows about the wire types of `async-openai`.
use std::sync::Arc;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessage,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq)]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments as produced by the model.
    pub arguments: String,
}

/// Function-calling description of a tool offered to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One assistant turn: either a final answer or a request to run tools.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCall>,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, AppError>;
}

pub struct OpenAIChatModel {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    temperature: Option<f32>,
}

impl OpenAIChatModel {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, temperature: Option<f32>) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }
}

fn to_openai_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

fn to_openai_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, AppError> {
    let converted: ChatCompletionRequestMessage = match message {
        ChatMessage::System(text) => ChatCompletionRequestSystemMessage::from(text.as_str()).into(),
        ChatMessage::User(text) => ChatCompletionRequestUserMessage::from(text.as_str()).into(),
        ChatMessage::Assistant {
            content,
            tool_calls,
        } => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = content {
                args.content(content.as_str());
            }
            if !tool_calls.is_empty() {
                args.tool_calls(tool_calls.iter().map(to_openai_tool_call).collect::<Vec<_>>());
            }
            args.build()?.into()
        }
        ChatMessage::Tool { call_id, content } => ChatCompletionRequestToolMessageArgs::default()
            .tool_call_id(call_id.as_str())
            .content(content.as_str())
            .build()?
            .into(),
    };

    Ok(converted)
}

fn to_openai_tool(spec: &ToolSpec) -> Result<ChatCompletionTool, AppError> {
    let function = FunctionObjectArgs::default()
        .name(spec.name.as_str())
        .description(spec.description.as_str())
        .parameters(spec.parameters.clone())
        .build()?;

    Ok(ChatCompletionToolArgs::default()
        .r#type(ChatCompletionToolType::Function)
        .function(function)
        .build()?)
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, AppError> {
        let messages = messages
            .iter()
            .map(to_openai_message)
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(self.model.as_str()).messages(messages);
        if !tools.is_empty() {
            args.tools(
                tools
                    .iter()
                    .map(to_openai_tool)
                    .collect::<Result<Vec<_>, _>>()?,
            );
        }
        if let Some(temperature) = self.temperature {
            args.temperature(temperature);
        }
        let request = args.build()?;

        let response = self.client.chat().create(request).await?;

        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLMParsing("No choices found in LLM response".into()))?
            .message;

        Ok(ModelTurn {
            content: message.content,
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|call| ToolCall {
                    id: call.id,
                    name: call.function.name,
                    arguments: call.function.arguments,
                })
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn assistant_tool_calls_survive_conversion() {
        let message = ChatMessage::Assistant {
            content: None,
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: "people".into(),
                arguments: r#"{"input":"Who is Ada?"}"#.into(),
            }],
        };

        let converted = to_openai_message(&message).expect("conversion");
        let ChatCompletionRequestMessage::Assistant(assistant) = converted else {
            panic!("expected an assistant message");
        };
        let calls = assistant.tool_calls.expect("tool calls kept");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].function.name, "people");
    }

    #[test]
    fn tool_results_reference_their_call() {
        let message = ChatMessage::Tool {
            call_id: "call_1".into(),
            content: "Ada was a mathematician.".into(),
        };

        let converted = to_openai_message(&message).expect("conversion");
        let ChatCompletionRequestMessage::Tool(tool) = converted else {
            panic!("expected a tool message");
        };
        assert_eq!(tool.tool_call_id, "call_1");
    }

    #[test]
    fn tool_spec_becomes_function_tool() {
        let spec = ToolSpec {
            name: "people".into(),
            description: "descriptions for various types of people".into(),
            parameters: json!({"type": "object", "properties": {"input": {"type": "string"}}}),
        };

        let tool = to_openai_tool(&spec).expect("conversion");
        assert_eq!(tool.function.name, "people");
        assert_eq!(
            tool.function.description.as_deref(),
            Some("descriptions for various types of people")
        );
    }
}
