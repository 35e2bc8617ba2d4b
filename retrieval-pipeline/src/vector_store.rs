use async_trait::async_trait;
use common::{error::AppError, utils::config::AppConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

/// A document returned by similarity search, with its similarity score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedNode {
    pub id: String,
    pub text: String,
    pub score: f32,
    pub metadata: Value,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn query(&self, embedding: Vec<f32>, top_k: usize)
        -> Result<Vec<RetrievedNode>, AppError>;
}

/// Client for one collection on a Chroma server, using the v2 HTTP API.
pub struct ChromaVectorStore {
    http: reqwest::Client,
    collection_url: Url,
    collection_name: String,
}

#[derive(Debug, Deserialize)]
struct ChromaCollection {
    id: String,
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ChromaQueryResponse {
    ids: Vec<Vec<String>>,
    #[serde(default)]
    documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    metadatas: Option<Vec<Vec<Option<Value>>>>,
    #[serde(default)]
    distances: Option<Vec<Vec<Option<f32>>>>,
}

fn database_url(base_url: &str, tenant: &str, database: &str) -> Result<Url, AppError> {
    let base = Url::parse(base_url)
        .map_err(|e| AppError::Initialization(format!("invalid Chroma url '{base_url}': {e}")))?;
    base.join(&format!("api/v2/tenants/{tenant}/databases/{database}/"))
        .map_err(|e| AppError::Initialization(format!("invalid Chroma path: {e}")))
}

impl ChromaVectorStore {
    /// Resolves the collection by name. Fails when the server is unreachable or the
    /// collection does not exist, so a handle is never built against a missing index.
    ///
    /// `http` should carry a request timeout; Chroma calls have no limit of their own.
    pub async fn connect(config: &AppConfig, http: reqwest::Client) -> Result<Self, AppError> {
        Self::connect_to(
            http,
            &config.chroma_url(),
            &config.chroma_tenant,
            &config.chroma_database,
            &config.chroma_collection,
        )
        .await
    }

    pub async fn connect_to(
        http: reqwest::Client,
        base_url: &str,
        tenant: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, AppError> {
        let database_url = database_url(base_url, tenant, database)?;

        let lookup_url = database_url
            .join(&format!("collections/{collection}"))
            .map_err(|e| AppError::Initialization(format!("invalid collection name: {e}")))?;

        let found: ChromaCollection = http
            .get(lookup_url)
            .send()
            .await?
            .error_for_status()
            .map_err(|e| {
                AppError::Initialization(format!("Chroma collection '{collection}' unavailable: {e}"))
            })?
            .json()
            .await?;

        info!(collection = %found.name, collection_id = %found.id, "Connected to Chroma collection");

        let collection_url = database_url
            .join(&format!("collections/{}/", found.id))
            .map_err(|e| AppError::Initialization(format!("invalid collection id: {e}")))?;

        Ok(Self {
            http,
            collection_url,
            collection_name: found.name,
        })
    }

    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }
}

#[async_trait]
impl VectorStore for ChromaVectorStore {
    async fn query(
        &self,
        embedding: Vec<f32>,
        top_k: usize,
    ) -> Result<Vec<RetrievedNode>, AppError> {
        let url = self
            .collection_url
            .join("query")
            .map_err(|e| AppError::Upstream(format!("invalid Chroma query url: {e}")))?;

        let body = json!({
            "query_embeddings": [embedding],
            "n_results": top_k,
            "include": ["documents", "metadatas", "distances"],
        });

        let response: ChromaQueryResponse = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let nodes = nodes_from_response(response);
        debug!(
            collection = %self.collection_name,
            returned = nodes.len(),
            "Chroma query finished"
        );

        Ok(nodes)
    }
}

/// Flattens the first (and only) query row. Distances become similarities as `1 - d`;
/// entries without a document are dropped.
fn nodes_from_response(response: ChromaQueryResponse) -> Vec<RetrievedNode> {
    let ids = response.ids.into_iter().next().unwrap_or_default();
    let mut documents = response
        .documents
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut metadatas = response
        .metadatas
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
        .into_iter();
    let mut distances = response
        .distances
        .and_then(|rows| rows.into_iter().next())
        .unwrap_or_default()
        .into_iter();

    ids.into_iter()
        .filter_map(|id| {
            let document = documents.next().flatten();
            let metadata = metadatas.next().flatten().unwrap_or(Value::Null);
            let distance = distances.next().flatten();
            document.map(|text| RetrievedNode {
                id,
                text,
                score: distance.map_or(0.0, |d| 1.0 - d),
                metadata,
            })
        })
        .collect()
}
