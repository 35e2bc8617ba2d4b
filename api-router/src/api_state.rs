use std::{sync::Arc, time::Duration};

use common::{
    error::AppError,
    utils::{config::AppConfig, secrets::SecretSource},
};
use retrieval_pipeline::AgentHandle;

#[derive(Clone)]
pub struct ApiState {
    pub auth_token: Arc<str>,
    pub query_timeout: Duration,
    pub agent: Arc<AgentHandle>,
}

impl ApiState {
    /// Resolves the bearer token once; the agent itself stays lazy.
    pub async fn new(
        config: &AppConfig,
        secrets: &dyn SecretSource,
        agent: Arc<AgentHandle>,
    ) -> Result<Self, AppError> {
        let auth_token = secrets.auth_token().await?;

        Ok(Self {
            auth_token: Arc::from(auth_token),
            query_timeout: Duration::from_secs(config.query_timeout_secs),
            agent,
        })
    }
}
