use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use common::{
    error::AppError,
    utils::{
        config::AppConfig,
        embedding::EmbeddingProvider,
        llm::{ChatModel, OpenAIChatModel},
        secrets::SecretSource,
    },
};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{error, info, instrument};

use crate::{
    agent::{QueryAgent, ReasoningAgent},
    query_engine::QueryEngine,
    tools::{QueryEngineTool, Tool},
    vector_store::ChromaVectorStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

impl AgentState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Initializing,
            2 => Self::Ready,
            3 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Uninitialized => 0,
            Self::Initializing => 1,
            Self::Ready => 2,
            Self::Failed => 3,
        }
    }
}

/// Builds a complete agent; called at most once at a time by [`AgentHandle`].
#[async_trait]
pub trait AgentFactory: Send + Sync {
    async fn build(&self) -> Result<Arc<dyn QueryAgent>, AppError>;
}

/// Lazily constructed, process-wide agent.
///
/// Construction runs under the cell's one-time-initialization guard: concurrent callers
/// wait for the attempt in flight, and a failed attempt leaves the cell empty so the
/// next caller builds again. Once ready, the agent is never replaced.
pub struct AgentHandle {
    factory: Arc<dyn AgentFactory>,
    agent: OnceCell<Arc<dyn QueryAgent>>,
    state: AtomicU8,
}

impl AgentHandle {
    pub fn new(factory: Arc<dyn AgentFactory>) -> Self {
        Self {
            factory,
            agent: OnceCell::new(),
            state: AtomicU8::new(AgentState::Uninitialized.as_u8()),
        }
    }

    pub fn state(&self) -> AgentState {
        AgentState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_ready(&self) -> bool {
        self.agent.initialized()
    }

    fn set_state(&self, state: AgentState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    #[instrument(skip_all)]
    pub async fn get_or_init(&self) -> Result<Arc<dyn QueryAgent>, AppError> {
        let agent = self
            .agent
            .get_or_try_init(|| async {
                self.set_state(AgentState::Initializing);
                info!("Initializing agent");

                match self.factory.build().await {
                    Ok(agent) => {
                        self.set_state(AgentState::Ready);
                        info!("Agent initialized successfully");
                        Ok(agent)
                    }
                    Err(e) => {
                        self.set_state(AgentState::Failed);
                        error!(error = %e, "Failed to initialize agent");
                        Err(match e {
                            AppError::Initialization(_) => e,
                            other => AppError::Initialization(other.to_string()),
                        })
                    }
                }
            })
            .await?;

        Ok(Arc::clone(agent))
    }
}

/// Wires the production agent: Chroma collection, OpenAI embeddings and chat model,
/// one `people` query tool.
pub struct DefaultAgentFactory {
    config: AppConfig,
    secrets: Arc<dyn SecretSource>,
}

impl DefaultAgentFactory {
    pub fn new(config: AppConfig, secrets: Arc<dyn SecretSource>) -> Self {
        Self { config, secrets }
    }
}

#[async_trait]
impl AgentFactory for DefaultAgentFactory {
    async fn build(&self) -> Result<Arc<dyn QueryAgent>, AppError> {
        let config = &self.config;
        let api_key = self.secrets.openai_api_key().await?;

        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()?;

        let openai_client = Arc::new(
            Client::with_config(
                OpenAIConfig::new()
                    .with_api_key(api_key)
                    .with_api_base(&config.openai_base_url),
            )
            .with_http_client(http.clone()),
        );

        info!(
            host = %config.chroma_host,
            port = config.chroma_port,
            collection = %config.chroma_collection,
            "Connecting to Chroma"
        );
        let store = ChromaVectorStore::connect(config, http).await?;

        let embedder =
            EmbeddingProvider::new_openai(Arc::clone(&openai_client), config.embedding_model.clone());
        let llm: Arc<dyn ChatModel> = Arc::new(OpenAIChatModel::new(
            openai_client,
            config.llm_model.clone(),
            config.llm_temperature,
        ));
        info!(
            embedding_backend = embedder.backend_label(),
            embedding_model = ?embedder.model_code(),
            llm_model = llm.model_name(),
            "Model clients ready"
        );

        let engine = Arc::new(QueryEngine::new(
            embedder,
            Arc::new(store),
            Arc::clone(&llm),
            config.similarity_top_k,
        ));
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(QueryEngineTool::people(engine))];

        let agent: Arc<dyn QueryAgent> = Arc::new(ReasoningAgent::new(
            llm,
            tools,
            config.agent_max_iterations,
            config.verbose,
        ));
        Ok(agent)
    }
}
