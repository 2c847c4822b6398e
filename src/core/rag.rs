//! Client for the external retrieval/generation service

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{EmbeddingProvider, LlmProvider, RagConfiguration};
use async_trait::async_trait;
use di::{Ref, inject, injectable};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    #[error("RAG service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RAG service answered with status {0}")]
    Status(u16),

    #[error("RAG service returned an unusable answer: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryTurn {
    pub role: &'static str,
    pub content: String,
}

/// Body of `POST {base}/chat`.
#[derive(Debug, Clone, Serialize)]
pub struct RagRequest {
    pub tenant_id: i64,
    pub query: String,
    pub top_k: usize,
    pub session_id: String,
    pub context: Option<String>,
    pub conversation_history: Vec<HistoryTurn>,
    pub system_prompt: String,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub temperature: f64,
    pub max_tokens: i64,
    pub min_similarity: f64,
    pub deduplicate: bool,
    pub language: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
}

impl RagRequest {
    pub fn new(config: &RagConfiguration, query: &str, top_k: usize, session_id: &str) -> RagRequest {
        RagRequest {
            tenant_id: config.tenant_id,
            query: query.to_owned(),
            top_k,
            session_id: session_id.to_owned(),
            context: None,
            conversation_history: Vec::new(),
            system_prompt: config.system_prompt.clone(),
            embedding_provider: config.embedding_provider,
            embedding_model: config.embedding_model.clone(),
            llm_provider: config.llm_provider,
            llm_model: config.llm_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            min_similarity: config.min_similarity,
            deduplicate: config.deduplicate_results,
            language: config.language.clone(),
            llm_api_key: config.llm_api_key.clone(),
            openai_api_key: config.openai_api_key.clone(),
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> RagRequest {
        self.context = context;
        self
    }

    pub fn with_history(mut self, history: Vec<HistoryTurn>) -> RagRequest {
        self.conversation_history = history;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredProduct {
    pub product_id: i64,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagAnswer {
    pub response: String,
    #[serde(default)]
    pub products: Vec<ScoredProduct>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<i64>,
}

/// Body of `POST {base}/products/sync`. The service pulls the catalogue from the store.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRequest {
    pub tenant_id: i64,
    pub store_url: String,
    pub access_token: String,
    pub max_products: i64,
    pub force_resync: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOutcome {
    pub total_products: i64,
    pub new_products: i64,
    pub updated_products: i64,
    pub failed_products: i64,
}

/// Body of `POST {base}/products/embeddings`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingRequest {
    pub tenant_id: i64,
    pub force_regenerate: bool,
    pub batch_size: u32,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai_api_key: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(config: &RagConfiguration, force_regenerate: bool, batch_size: u32) -> EmbeddingRequest {
        EmbeddingRequest {
            tenant_id: config.tenant_id,
            force_regenerate,
            batch_size,
            embedding_provider: config.embedding_provider,
            embedding_model: config.embedding_model.clone(),
            openai_api_key: config.openai_api_key.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingOutcome {
    pub total_products: i64,
    pub embeddings_generated: i64,
    pub failed_embeddings: i64,
    pub time_elapsed_seconds: f64,
}

#[async_trait]
pub trait RagService: Send + Sync {
    /// Sends a single query to the service. Never retried.
    async fn chat(&self, request: &RagRequest) -> Result<RagAnswer, RagError>;

    /// Asks the service to pull the tenant's catalogue from the store.
    async fn sync_products(&self, request: &SyncRequest) -> Result<SyncOutcome, RagError>;

    /// Asks the service to embed the tenant's products.
    async fn generate_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingOutcome, RagError>;
}

pub struct HttpRagService {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[injectable(RagService)]
impl HttpRagService {
    #[inject]
    pub fn create(config: Ref<AppConfig>) -> HttpRagService {
        HttpRagService::new(&config.rag_base_url, config.rag_timeout)
    }
}

impl HttpRagService {
    pub fn new(base_url: &str, timeout: Duration) -> HttpRagService {
        HttpRagService {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        }
    }

    /// Posts `body` to `path` under the base URL, bounded by the configured timeout.
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, RagError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned + Send,
    {
        let url = format!("{}/{path}", self.base_url);
        debug!("POST {url}");

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RagError::Status(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| RagError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl RagService for HttpRagService {
    async fn chat(&self, request: &RagRequest) -> Result<RagAnswer, RagError> {
        let answer: RagAnswer = self.post("chat", request).await?;

        if answer.response.trim().is_empty() {
            return Err(RagError::Malformed("empty response text".to_owned()));
        }

        Ok(answer)
    }

    async fn sync_products(&self, request: &SyncRequest) -> Result<SyncOutcome, RagError> {
        self.post("products/sync", request).await
    }

    async fn generate_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingOutcome, RagError> {
        self.post("products/embeddings", request).await
    }
}

/// Post-processes the upstream ranking into the product ids worth showing.
///
/// Candidates below `min_similarity` or rejected by `is_owned` are dropped, duplicates keep
/// their best rank when `deduplicate` is set, and at most `top_k` ids remain. Upstream order
/// is preserved.
pub fn rank_products(
    candidates: &[ScoredProduct],
    min_similarity: f64,
    deduplicate: bool,
    top_k: usize,
    is_owned: impl Fn(i64) -> bool,
) -> Vec<i64> {
    let mut seen = HashSet::new();

    candidates
        .iter()
        .filter(|candidate| candidate.score >= min_similarity)
        .filter(|candidate| is_owned(candidate.product_id))
        .filter(|candidate| !deduplicate || seen.insert(candidate.product_id))
        .map(|candidate| candidate.product_id)
        .take(top_k)
        .collect()
}
