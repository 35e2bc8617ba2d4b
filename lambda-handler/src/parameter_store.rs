use async_trait::async_trait;
use aws_sdk_ssm::{error::DisplayErrorContext, Client as SsmClient};
use common::{error::AppError, utils::secrets::SecretSource};
use tokio::sync::OnceCell;
use tracing::{error, info};

/// Secrets read from SSM Parameter Store with decryption, each fetched once per
/// execution context.
pub struct ParameterStoreSecrets {
    client: SsmClient,
    api_key_param: String,
    auth_token_param: String,
    api_key: OnceCell<String>,
    auth_token: OnceCell<String>,
}

impl ParameterStoreSecrets {
    pub fn new(client: SsmClient, api_key_param: String, auth_token_param: String) -> Self {
        Self {
            client,
            api_key_param,
            auth_token_param,
            api_key: OnceCell::new(),
            auth_token: OnceCell::new(),
        }
    }

    /// Uses the region and credentials of the execution environment.
    pub async fn from_env(api_key_param: String, auth_token_param: String) -> Self {
        let sdk_config = aws_config::load_from_env().await;
        Self::new(SsmClient::new(&sdk_config), api_key_param, auth_token_param)
    }

    async fn fetch(&self, name: &str) -> Result<String, AppError> {
        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await
            .map_err(|e| {
                error!(parameter = name, error = %DisplayErrorContext(&e), "Failed to read parameter");
                AppError::Initialization(format!("failed to read parameter {name}"))
            })?;

        let value = output
            .parameter()
            .and_then(|parameter| parameter.value())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::Initialization(format!("parameter {name} has no value")))?;

        info!(parameter = name, "Loaded parameter");
        Ok(value.to_string())
    }
}

#[async_trait]
impl SecretSource for ParameterStoreSecrets {
    async fn openai_api_key(&self) -> Result<String, AppError> {
        self.api_key
            .get_or_try_init(|| self.fetch(&self.api_key_param))
            .await
            .cloned()
    }

    async fn auth_token(&self) -> Result<String, AppError> {
        self.auth_token
            .get_or_try_init(|| self.fetch(&self.auth_token_param))
            .await
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ssm::config::{BehaviorVersion, Credentials, Region};
    use axum::{
        extract::State,
        http::{HeaderMap, StatusCode},
        response::IntoResponse,
        routing::post,
        Router,
    };
    use serde_json::{json, Value};
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    /// Minimal SSM JSON endpoint serving two parameters.
    async fn fake_ssm(
        State(calls): State<Arc<AtomicUsize>>,
        headers: HeaderMap,
        body: String,
    ) -> impl IntoResponse {
        calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(
            headers.get("x-amz-target").and_then(|v| v.to_str().ok()),
            Some("AmazonSSM.GetParameter")
        );

        let request: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(request["WithDecryption"], true);
        let name = request["Name"].as_str().unwrap_or_default().to_string();
        let value = match name.as_str() {
            "/agent/openai" => Some("sk-test"),
            "/agent/token" => Some("secret123"),
            _ => None,
        };

        let (status, payload) = match value {
            Some(value) => (
                StatusCode::OK,
                json!({"Parameter": {"Name": name, "Type": "SecureString", "Value": value, "Version": 1}}),
            ),
            None => (
                StatusCode::BAD_REQUEST,
                json!({"__type": "ParameterNotFound", "message": "not found"}),
            ),
        };

        (
            status,
            [("content-type", "application/x-amz-json-1.1")],
            payload.to_string(),
        )
    }

    async fn client_for_fake(calls: Arc<AtomicUsize>) -> SsmClient {
        let app = Router::new().route("/", post(fake_ssm)).with_state(calls);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = aws_sdk_ssm::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .credentials_provider(Credentials::new("AKIDTEST", "secret", None, None, "test"))
            .endpoint_url(format!("http://{addr}"))
            .build();
        SsmClient::from_conf(config)
    }

    #[tokio::test]
    async fn fetches_each_parameter_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let secrets = ParameterStoreSecrets::new(
            client_for_fake(calls.clone()).await,
            "/agent/openai".into(),
            "/agent/token".into(),
        );

        assert_eq!(secrets.auth_token().await.unwrap(), "secret123");
        assert_eq!(secrets.auth_token().await.unwrap(), "secret123");
        assert_eq!(secrets.openai_api_key().await.unwrap(), "sk-test");

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_parameter_is_an_initialization_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let secrets = ParameterStoreSecrets::new(
            client_for_fake(calls).await,
            "/agent/missing".into(),
            "/agent/token".into(),
        );

        let err = secrets.openai_api_key().await.unwrap_err();
        assert!(matches!(err, AppError::Initialization(msg) if msg.contains("/agent/missing")));
    }
}
