//! API Gateway REST proxy integration payloads.
use std::{borrow::Cow, collections::HashMap};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::error::AppError;
use retrieval_pipeline::dispatch::INVALID_JSON;
use serde::{Deserialize, Serialize};
use serde_json::json;

const CORS_HEADERS: [(&str, &str); 3] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyRequest {
    #[serde(default)]
    pub http_method: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ProxyRequest {
    /// Header lookup ignoring case, since gateways differ in how they normalize names.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_health_check(&self) -> bool {
        self.http_method.eq_ignore_ascii_case("GET")
            && self
                .path
                .as_deref()
                .is_some_and(|path| path.trim_end_matches('/').ends_with("/health"))
    }

    pub fn body_bytes(&self) -> Result<Cow<'_, [u8]>, AppError> {
        let Some(body) = self.body.as_deref() else {
            return Ok(Cow::Borrowed(&[]));
        };

        if self.is_base64_encoded {
            STANDARD
                .decode(body)
                .map(Cow::Owned)
                .map_err(|_| AppError::Validation(INVALID_JSON.to_string()))
        } else {
            Ok(Cow::Borrowed(body.as_bytes()))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl ProxyResponse {
    pub fn empty(status_code: u16) -> Self {
        let mut headers: HashMap<String, String> = CORS_HEADERS
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Self {
            status_code,
            headers,
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    pub fn json<T: Serialize>(status_code: u16, payload: &T) -> Self {
        let mut response = Self::empty(status_code);
        response.body = serde_json::to_string(payload).unwrap_or_else(|_| {
            json!({"status": "error", "message": "Internal server error"}).to_string()
        });
        response
    }

    /// `{"status": "error", "message": ...}`
    pub fn error(status_code: u16, message: &str) -> Self {
        Self::json(status_code, &json!({"status": "error", "message": message}))
    }
}
