use std::sync::Arc;

use common::{
    error::AppError,
    utils::{
        embedding::EmbeddingProvider,
        llm::{ChatMessage, ChatModel},
    },
};
use tracing::{debug, instrument};

use crate::vector_store::{RetrievedNode, VectorStore};

pub const EMPTY_RESPONSE: &str = "Empty Response";

const QA_SYSTEM_MESSAGE: &str = "You are an expert Q&A system that is trusted around the world. \
Always answer the query using the provided context information, and not prior knowledge. \
Never directly reference the given context in your answer.";

#[derive(Debug, Clone)]
pub struct EngineResponse {
    pub answer: String,
    pub sources: Vec<RetrievedNode>,
}

/// Retrieve-then-synthesize over a vector store.
pub struct QueryEngine {
    embedder: EmbeddingProvider,
    store: Arc<dyn VectorStore>,
    llm: Arc<dyn ChatModel>,
    top_k: usize,
}

pub fn create_user_message(context: &str, query: &str) -> String {
    format!(
        r"Context information is below.
---------------------
{context}
---------------------
Given the context information and not prior knowledge, answer the query.
Query: {query}
Answer: "
    )
}

fn format_context(nodes: &[RetrievedNode]) -> String {
    nodes
        .iter()
        .map(|node| node.text.trim())
        .collect::<Vec<_>>()
        .join("\n\n")
}

impl QueryEngine {
    pub fn new(
        embedder: EmbeddingProvider,
        store: Arc<dyn VectorStore>,
        llm: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            llm,
            top_k: top_k.max(1),
        }
    }

    #[instrument(skip_all, fields(top_k = self.top_k))]
    pub async fn query(&self, question: &str) -> Result<EngineResponse, AppError> {
        let embedding = self.embedder.embed(question).await?;
        let sources = self.store.query(embedding, self.top_k).await?;
        debug!(retrieved = sources.len(), "Retrieved context nodes");

        if sources.is_empty() {
            return Ok(EngineResponse {
                answer: EMPTY_RESPONSE.to_string(),
                sources,
            });
        }

        let messages = [
            ChatMessage::System(QA_SYSTEM_MESSAGE.to_string()),
            ChatMessage::User(create_user_message(&format_context(&sources), question)),
        ];
        let turn = self.llm.complete(&messages, &[]).await?;

        let answer = turn
            .content
            .filter(|content| !content.trim().is_empty())
            .unwrap_or_else(|| EMPTY_RESPONSE.to_string());

        Ok(EngineResponse { answer, sources })
    }
}
