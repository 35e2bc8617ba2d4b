use std::{sync::Arc, time::Duration};

use common::utils::{
    config::{get_config, CredentialSource},
    secrets::{EnvSecrets, SecretSource},
};
use lambda_handler::{handle_event, LambdaState, ParameterStoreSecrets, ProxyRequest};
use lambda_runtime::{service_fn, LambdaEvent};
use retrieval_pipeline::{AgentHandle, DefaultAgentFactory};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), lambda_runtime::Error> {
    let config = get_config()?;

    // CloudWatch adds its own timestamps
    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .try_init()
        .ok();

    let secrets: Arc<dyn SecretSource> = match config.credential_source() {
        CredentialSource::ParameterStore {
            api_key_param,
            auth_token_param,
        } => {
            info!(%api_key_param, %auth_token_param, "Reading secrets from Parameter Store");
            Arc::new(ParameterStoreSecrets::from_env(api_key_param, auth_token_param).await)
        }
        CredentialSource::Environment => {
            warn!("SSM parameter names not set, reading secrets from the environment");
            Arc::new(EnvSecrets::from_config(&config))
        }
    };

    // The agent is built by the first authenticated request, not here
    let agent = Arc::new(AgentHandle::new(Arc::new(DefaultAgentFactory::new(
        config.clone(),
        Arc::clone(&secrets),
    ))));
    let state = Arc::new(LambdaState::new(
        secrets,
        agent,
        Duration::from_secs(config.query_timeout_secs),
    ));

    lambda_runtime::run(service_fn(move |event: LambdaEvent<ProxyRequest>| {
        let state = Arc::clone(&state);
        async move { Ok::<_, lambda_runtime::Error>(handle_event(&state, event.payload).await) }
    }))
    .await
}
