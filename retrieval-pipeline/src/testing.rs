//! In-process stand-ins for the network collaborators, shared with the router and
//! handler test suites through the `test-utils` feature.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use common::{
    error::AppError,
    utils::llm::{ChatMessage, ChatModel, ModelTurn, ToolSpec},
};
use serde_json::Value;

use crate::{
    agent::QueryAgent,
    bootstrap::AgentFactory,
    response::AgentResponse,
    vector_store::{RetrievedNode, VectorStore},
};

pub fn node(id: &str, text: &str, score: f32) -> RetrievedNode {
    RetrievedNode {
        id: id.to_string(),
        text: text.to_string(),
        score,
        metadata: Value::Null,
    }
}

/// Returns its nodes sorted by score, ignoring the embedding.
pub struct InMemoryVectorStore {
    nodes: Vec<RetrievedNode>,
}

impl InMemoryVectorStore {
    pub fn new(mut nodes: Vec<RetrievedNode>) -> Self {
        nodes.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { nodes }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn query(
        &self,
        _embedding: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievedNode>, AppError> {
        Ok(self.nodes.iter().take(top_k).cloned().collect())
    }
}

/// Plays back a fixed list of turns and records every transcript it was shown.
pub struct ScriptedChatModel {
    turns: Mutex<VecDeque<ModelTurn>>,
    transcripts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChatModel {
    pub fn new(turns: impl IntoIterator<Item = ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into_iter().collect()),
            transcripts: Mutex::new(Vec::new()),
        }
    }

    pub fn answering<'a>(answers: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(answers.into_iter().map(|answer| ModelTurn {
            content: Some(answer.to_string()),
            tool_calls: Vec::new(),
        }))
    }

    pub fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChatModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSpec],
    ) -> Result<ModelTurn, AppError> {
        self.transcripts.lock().unwrap().push(messages.to_vec());
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AppError::Upstream("scripted model has no turns left".into()))
    }
}

#[derive(Clone)]
pub enum StubBehavior {
    Answer(String),
    Fail(String),
    Panic,
    Stall(Duration),
}

/// Agent that counts invocations and behaves as configured.
pub struct StubAgent {
    behavior: StubBehavior,
    calls: AtomicUsize,
    completed: AtomicUsize,
}

impl StubAgent {
    pub fn new(behavior: StubBehavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(StubBehavior::Answer(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls that ran to the end, as opposed to being aborted mid-flight.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryAgent for StubAgent {
    async fn query(&self, _text: &str) -> Result<AgentResponse, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let result = match &self.behavior {
            StubBehavior::Answer(text) => Ok(AgentResponse::from(text.as_str())),
            StubBehavior::Fail(message) => Err(AppError::Upstream(message.clone())),
            StubBehavior::Panic => panic!("stub agent panicked"),
            StubBehavior::Stall(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(AgentResponse::from("too late"))
            }
        };
        self.completed.fetch_add(1, Ordering::SeqCst);
        result
    }
}

/// Factory handing out one shared [`StubAgent`], optionally failing the first attempts.
pub struct StubFactory {
    agent: Arc<StubAgent>,
    failures_left: AtomicUsize,
    builds: AtomicUsize,
    delay: Duration,
}

impl StubFactory {
    pub fn new(agent: Arc<StubAgent>) -> Self {
        Self {
            agent,
            failures_left: AtomicUsize::new(0),
            builds: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    pub fn failing_first(self, attempts: usize) -> Self {
        self.failures_left.store(attempts, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Construction attempts, failed ones included.
    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AgentFactory for StubFactory {
    async fn build(&self) -> Result<Arc<dyn QueryAgent>, AppError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(AppError::Initialization("vector store unreachable".into()));
        }

        let agent: Arc<StubAgent> = Arc::clone(&self.agent);
        let agent: Arc<dyn QueryAgent> = agent;
        Ok(agent)
    }
}
