use async_trait::async_trait;

use crate::{error::AppError, utils::config::AppConfig};

/// Source of the two credentials the service needs: the OpenAI key used by the agent
/// and the bearer token callers must present.
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn openai_api_key(&self) -> Result<String, AppError>;

    async fn auth_token(&self) -> Result<String, AppError>;
}

/// Credentials taken straight from [`AppConfig`].
#[derive(Clone)]
pub struct EnvSecrets {
    openai_api_key: Option<String>,
    auth_token: Option<String>,
}

impl EnvSecrets {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            openai_api_key: config.openai_api_key.clone(),
            auth_token: config.function_api_token.clone(),
        }
    }
}

fn require(value: Option<&String>, name: &str) -> Result<String, AppError> {
    value
        .filter(|v| !v.is_empty())
        .cloned()
        .ok_or_else(|| AppError::Initialization(format!("{name} is not set")))
}

#[async_trait]
impl SecretSource for EnvSecrets {
    async fn openai_api_key(&self) -> Result<String, AppError> {
        require(self.openai_api_key.as_ref(), "OPENAI_API_KEY")
    }

    async fn auth_token(&self) -> Result<String, AppError> {
        require(self.auth_token.as_ref(), "FUNCTION_API_TOKEN")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_secrets_return_configured_values() {
        let config = AppConfig {
            openai_api_key: Some("sk-test".into()),
            function_api_token: Some("secret123".into()),
            ..Default::default()
        };
        let secrets = EnvSecrets::from_config(&config);

        assert_eq!(secrets.openai_api_key().await.expect("key"), "sk-test");
        assert_eq!(secrets.auth_token().await.expect("token"), "secret123");
    }

    #[tokio::test]
    async fn empty_values_count_as_missing() {
        let config = AppConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        let secrets = EnvSecrets::from_config(&config);

        assert!(matches!(
            secrets.openai_api_key().await,
            Err(AppError::Initialization(msg)) if msg.contains("OPENAI_API_KEY")
        ));
        assert!(matches!(
            secrets.auth_token().await,
            Err(AppError::Initialization(msg)) if msg.contains("FUNCTION_API_TOKEN")
        ));
    }
}
