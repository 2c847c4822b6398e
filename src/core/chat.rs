//! Public, tenant scoped chat gateway
//!
//! A turn resolves the tenant, settles which session it belongs to, forwards the query with the
//! tenant's RAG configuration to the external service and records the exchange. Sessions never
//! cross tenants: a session id issued for another tenant is replaced by a fresh one.

use crate::core::contexts::{context_block, select_contexts};
use crate::core::error::{Error, Result};
use crate::core::links::product_url;
use crate::core::rag::{HistoryTurn, RagAnswer, RagRequest, RagService, rank_products};
use crate::core::traits::ChatService;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{
    ChatSession, Context, Message, MessageKind, Product, RagConfiguration, Tenant,
};
use crate::infrastructure::traits::{
    ChatRepository, ContextRepository, NewMessage, ProductRepository, SettingsRepository,
    TenantRepository, TurnRecord,
};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::{error, info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

/// Shown to the visitor whenever the external service cannot answer.
pub const APOLOGY: &str =
    "I'm sorry, I couldn't process your request right now. Please try again in a moment.";

const MAX_QUERY_CHARS: usize = 4000;
const MAX_SESSION_ID_LEN: usize = 128;
const MAX_TOP_K: usize = 50;
const HISTORY_TURNS: i64 = 6;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub query: String,
    pub session_id: Option<String>,
    pub user_fingerprint: Option<String>,
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductReference {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub handle: Option<String>,
    pub url: Option<String>,
}

impl ProductReference {
    fn new(product: Product, store_url: &str) -> ProductReference {
        let url = product_url(Some(store_url), product.handle.as_deref());
        ProductReference {
            id: product.id,
            title: product.title,
            price: product.price,
            image_url: product.image_url,
            handle: product.handle,
            url,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatReply {
    pub session_id: String,
    pub response: String,
    pub products: Vec<ProductReference>,
    pub search_query: Option<String>,
    pub processing_time_ms: u64,
    pub contexts_used: Vec<String>,
    pub message_count: i64,
}

/// A stored session with its messages, oldest first.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    pub session: ChatSession,
    pub messages: Vec<Message>,
}

/// Which session a turn continues.
#[derive(Debug)]
struct ResolvedSession {
    key: String,
    existing: Option<ChatSession>,
}

/// Requested top-K, falling back to the tenant default and capped.
fn effective_top_k(requested: Option<u32>, tenant_default: i64) -> usize {
    let top_k = match requested {
        Some(k) if k > 0 => k as usize,
        _ => usize::try_from(tenant_default).unwrap_or(1).max(1),
    };
    top_k.min(MAX_TOP_K)
}

fn is_acceptable_session_id(session_id: &str) -> bool {
    session_id.len() <= MAX_SESSION_ID_LEN
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

fn history_turn(message: &Message) -> HistoryTurn {
    HistoryTurn {
        role: match message.kind {
            MessageKind::User => "user",
            MessageKind::Bot => "assistant",
            MessageKind::System => "system",
        },
        content: message.content.clone(),
    }
}

#[injectable(ChatService)]
pub struct MyChatService {
    tenants: Ref<dyn TenantRepository>,
    settings: Ref<dyn SettingsRepository>,
    contexts: Ref<dyn ContextRepository>,
    products: Ref<dyn ProductRepository>,
    chats: Ref<dyn ChatRepository>,
    rag: Ref<dyn RagService>,
    config: Ref<AppConfig>,
}

impl MyChatService {
    async fn active_tenant(&self, tenant_id: i64) -> Result<Tenant> {
        match self.tenants.find_tenant(tenant_id).await? {
            Some(tenant) if tenant.is_active => Ok(tenant),
            _ => Err(Error::TenantUnavailable),
        }
    }

    async fn resolve_session(&self, tenant: &Tenant, supplied: Option<&str>) -> Result<ResolvedSession> {
        let Some(supplied) = supplied.map(str::trim).filter(|s| !s.is_empty()) else {
            return Ok(ResolvedSession {
                key: new_session_id(),
                existing: None,
            });
        };

        if !is_acceptable_session_id(supplied) {
            warn!("tenant {}: ignoring malformed session id", tenant.id);
            return Ok(ResolvedSession {
                key: new_session_id(),
                existing: None,
            });
        }

        match self.chats.find_session(supplied).await? {
            Some(session) if session.tenant_id == tenant.id => Ok(ResolvedSession {
                key: supplied.to_owned(),
                existing: Some(session),
            }),
            Some(_) => {
                warn!(
                    "tenant {}: supplied session belongs to another tenant, issuing a new one",
                    tenant.id
                );
                Ok(ResolvedSession {
                    key: new_session_id(),
                    existing: None,
                })
            }
            None => Ok(ResolvedSession {
                key: supplied.to_owned(),
                existing: None,
            }),
        }
    }

    async fn conversation_history(
        &self,
        config: &RagConfiguration,
        session: &ResolvedSession,
    ) -> Result<Vec<HistoryTurn>> {
        match &session.existing {
            Some(existing) if config.enable_conversation_history => Ok(self
                .chats
                .recent_messages(existing.id, HISTORY_TURNS)
                .await?
                .iter()
                .map(history_turn)
                .collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn injected_contexts(&self, config: &RagConfiguration, query: &str) -> Result<Vec<Context>> {
        if !config.enable_context_injection {
            return Ok(Vec::new());
        }

        let contexts = self.contexts.list_contexts(config.tenant_id, true).await?;
        Ok(select_contexts(&contexts, query)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Ranks the upstream candidates among this tenant's products, keeping the ranking order.
    ///
    /// Ids of other tenants or of deleted products never take a slot.
    async fn referenced_products(
        &self,
        tenant: &Tenant,
        config: &RagConfiguration,
        answer: &RagAnswer,
        top_k: usize,
    ) -> Result<Vec<ProductReference>> {
        let candidate_ids: Vec<i64> = answer.products.iter().map(|p| p.product_id).collect();
        let owned: HashMap<i64, Product> = self
            .products
            .find_products(tenant.id, &candidate_ids)
            .await?
            .into_iter()
            .map(|product| (product.id, product))
            .collect();

        let ranked = rank_products(
            &answer.products,
            config.min_similarity,
            config.deduplicate_results,
            top_k,
            |id| owned.contains_key(&id),
        );

        Ok(ranked
            .iter()
            .filter_map(|id| owned.get(id))
            .map(|product| ProductReference::new(product.clone(), &tenant.store_url))
            .collect())
    }

    /// Persists the turn when the tenant keeps conversation history and returns the message
    /// count of the session afterwards.
    ///
    /// A key claimed by another tenant in the meantime is swapped for a fresh one.
    async fn record(
        &self,
        config: &RagConfiguration,
        session: &mut ResolvedSession,
        fingerprint: Option<String>,
        messages: Vec<NewMessage>,
    ) -> Result<i64> {
        if !config.enable_conversation_history {
            return Ok(session.existing.as_ref().map_or(0, |s| s.message_count));
        }

        let turn = |session_key: String| TurnRecord {
            tenant_id: config.tenant_id,
            session_key,
            user_fingerprint: fingerprint.clone(),
            messages: messages.clone(),
        };

        if let Some(stored) = self.chats.record_turn(turn(session.key.clone())).await? {
            return Ok(stored.message_count);
        }

        warn!(
            "tenant {}: session id was claimed by another tenant, issuing a new one",
            config.tenant_id
        );
        session.key = new_session_id();
        session.existing = None;

        match self.chats.record_turn(turn(session.key.clone())).await? {
            Some(stored) => Ok(stored.message_count),
            None => Err(Error::Internal("fresh session id already taken".to_owned())),
        }
    }
}

#[async_trait]
impl ChatService for MyChatService {
    async fn send(&self, tenant_id: i64, request: ChatRequest) -> Result<ChatReply> {
        let started = Instant::now();

        let query = request.query.trim();
        if query.is_empty() {
            return Err(Error::bad_request("query must not be empty"));
        }
        if query.chars().count() > MAX_QUERY_CHARS {
            return Err(Error::bad_request(format!(
                "query must be at most {MAX_QUERY_CHARS} characters"
            )));
        }

        let tenant = self.active_tenant(tenant_id).await?;
        let config = self
            .settings
            .find_rag_config(tenant.id)
            .await?
            .unwrap_or_else(|| {
                RagConfiguration::defaults_for(&tenant, self.config.default_llm_api_key.clone())
            });

        let mut session = self
            .resolve_session(&tenant, request.session_id.as_deref())
            .await?;
        let top_k = effective_top_k(request.top_k, config.default_top_k);
        let fingerprint = request
            .user_fingerprint
            .map(|f| f.trim().chars().take(256).collect::<String>())
            .filter(|f| !f.is_empty());

        let history = self.conversation_history(&config, &session).await?;
        let contexts = self.injected_contexts(&config, query).await?;
        let context_refs: Vec<&Context> = contexts.iter().collect();

        let rag_request = RagRequest::new(&config, query, top_k, &session.key)
            .with_context(context_block(&context_refs))
            .with_history(history);

        let user_message = NewMessage {
            kind: MessageKind::User,
            content: query.to_owned(),
            product_ids: None,
            context_ids: None,
        };

        let reply = match self.rag.chat(&rag_request).await {
            Ok(answer) => {
                let products = self
                    .referenced_products(&tenant, &config, &answer, top_k)
                    .await?;

                let product_ids: Vec<i64> = products.iter().map(|p| p.id).collect();
                let context_ids: Vec<i64> = contexts.iter().map(|c| c.id).collect();
                let assistant_message = NewMessage {
                    kind: MessageKind::Bot,
                    content: answer.response.clone(),
                    product_ids: Some(product_ids),
                    context_ids: Some(context_ids),
                };

                let message_count = self
                    .record(&config, &mut session, fingerprint, vec![user_message, assistant_message])
                    .await?;

                ChatReply {
                    session_id: session.key.clone(),
                    response: answer.response,
                    products,
                    search_query: answer.search_query.or_else(|| Some(query.to_owned())),
                    processing_time_ms: 0,
                    contexts_used: contexts.into_iter().map(|c| c.title).collect(),
                    message_count,
                }
            }
            Err(e) => {
                error!("tenant {}: RAG service failed: {e}", tenant.id);

                let message_count = self
                    .record(&config, &mut session, fingerprint, vec![user_message])
                    .await?;

                ChatReply {
                    session_id: session.key.clone(),
                    response: APOLOGY.to_owned(),
                    products: Vec::new(),
                    search_query: None,
                    processing_time_ms: 0,
                    contexts_used: Vec::new(),
                    message_count,
                }
            }
        };

        let processing_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(
            "tenant {}: chat turn in session {} answered in {}ms",
            tenant.id, reply.session_id, processing_time_ms
        );

        Ok(ChatReply {
            processing_time_ms,
            ..reply
        })
    }

    async fn history(&self, tenant_id: i64, session_id: &str) -> Result<SessionHistory> {
        match self.chats.find_session(session_id).await? {
            Some(session) if session.tenant_id == tenant_id => {
                let messages = self.chats.list_messages(session.id).await?;
                Ok(SessionHistory { session, messages })
            }
            _ => Err(Error::NotFound("session")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_top_k() {
        assert_eq!(effective_top_k(None, 5), 5);
        assert_eq!(effective_top_k(Some(0), 5), 5);
        assert_eq!(effective_top_k(Some(3), 5), 3);
        assert_eq!(effective_top_k(Some(500), 5), MAX_TOP_K);
        assert_eq!(effective_top_k(None, 0), 1);
    }

    #[test]
    fn test_session_id_shape() {
        assert!(is_acceptable_session_id(&new_session_id()));
        assert!(is_acceptable_session_id("client_minted-01"));
        assert!(!is_acceptable_session_id("has space"));
        assert!(!is_acceptable_session_id(&"a".repeat(129)));
    }

    #[test]
    fn test_fresh_ids_differ() {
        assert_ne!(new_session_id(), new_session_id());
    }
}
