use std::time::Duration;

use config::{
    builder::{ConfigBuilder, DefaultState},
    Config, Environment, File,
};
use serde::Deserialize;

use crate::error::AppError;

/// Where the OpenAI key and the expected bearer token come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    /// `OPENAI_API_KEY` and `FUNCTION_API_TOKEN` read directly from the environment.
    Environment,
    /// Names of SecureString parameters in the AWS SSM Parameter Store.
    ParameterStore {
        api_key_param: String,
        auth_token_param: String,
    },
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_chroma_host")]
    pub chroma_host: String,
    #[serde(default = "default_chroma_port")]
    pub chroma_port: u16,
    #[serde(default = "default_chroma_collection", alias = "chroma_collection_name")]
    pub chroma_collection: String,
    #[serde(default = "default_chroma_tenant")]
    pub chroma_tenant: String,
    #[serde(default = "default_chroma_database")]
    pub chroma_database: String,
    #[serde(
        default = "default_embedding_model",
        alias = "openai_embedding_model_name"
    )]
    pub embedding_model: String,
    #[serde(default = "default_llm_model", alias = "openai_model_name")]
    pub llm_model: String,
    #[serde(default)]
    pub llm_temperature: Option<f32>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default)]
    pub function_api_token: Option<String>,
    #[serde(default)]
    pub ssm_param_api_key: Option<String>,
    #[serde(default)]
    pub ssm_param_auth_token: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_http_host")]
    pub http_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_query_timeout_secs")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_upstream_timeout_secs")]
    pub upstream_timeout_secs: u64,
    #[serde(default = "default_agent_max_iterations")]
    pub agent_max_iterations: usize,
    #[serde(default = "default_similarity_top_k")]
    pub similarity_top_k: usize,
}

fn default_chroma_host() -> String {
    "localhost".to_string()
}

fn default_chroma_port() -> u16 {
    8000
}

fn default_chroma_collection() -> String {
    "knowledge".to_string()
}

fn default_chroma_tenant() -> String {
    "default_tenant".to_string()
}

fn default_chroma_database() -> String {
    "default_database".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_model() -> String {
    "o3-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_http_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5000
}

fn default_query_timeout_secs() -> u64 {
    120
}

fn default_upstream_timeout_secs() -> u64 {
    60
}

fn default_agent_max_iterations() -> usize {
    10
}

fn default_similarity_top_k() -> usize {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            chroma_host: default_chroma_host(),
            chroma_port: default_chroma_port(),
            chroma_collection: default_chroma_collection(),
            chroma_tenant: default_chroma_tenant(),
            chroma_database: default_chroma_database(),
            embedding_model: default_embedding_model(),
            llm_model: default_llm_model(),
            llm_temperature: None,
            openai_api_key: None,
            openai_base_url: default_base_url(),
            function_api_token: None,
            ssm_param_api_key: None,
            ssm_param_auth_token: None,
            verbose: false,
            http_host: default_http_host(),
            http_port: default_http_port(),
            query_timeout_secs: default_query_timeout_secs(),
            upstream_timeout_secs: default_upstream_timeout_secs(),
            agent_max_iterations: default_agent_max_iterations(),
            similarity_top_k: default_similarity_top_k(),
        }
    }
}

impl AppConfig {
    /// Parameter Store wins as soon as both parameter names are configured.
    pub fn credential_source(&self) -> CredentialSource {
        match (&self.ssm_param_api_key, &self.ssm_param_auth_token) {
            (Some(api_key_param), Some(auth_token_param)) => CredentialSource::ParameterStore {
                api_key_param: api_key_param.clone(),
                auth_token_param: auth_token_param.clone(),
            },
            _ => CredentialSource::Environment,
        }
    }

    /// Per-request limit for calls to Chroma and OpenAI.
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn chroma_url(&self) -> String {
        format!("http://{}:{}", self.chroma_host, self.chroma_port)
    }

    /// Start-up check for the standalone server, which reads its secrets from the environment.
    pub fn validate_for_server(&self) -> Result<(), AppError> {
        let mut missing = Vec::new();
        if self.function_api_token.as_deref().is_none_or(str::is_empty) {
            missing.push("FUNCTION_API_TOKEN");
        }
        if self.openai_api_key.as_deref().is_none_or(str::is_empty) {
            missing.push("OPENAI_API_KEY");
        }
        if self.chroma_collection.trim().is_empty() {
            missing.push("CHROMA_COLLECTION");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(format!(
                "missing required configuration: {}",
                missing.join(", ")
            )))
        }
    }
}

pub fn get_config() -> Result<AppConfig, AppError> {
    load(
        Config::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(Environment::default()),
    )
}

fn load(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, AppError> {
    Ok(builder.build()?.try_deserialize()?)
}
