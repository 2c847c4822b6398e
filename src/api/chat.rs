//! Anonymous chat gateway used by the storefront widget

use crate::api::ApiJson;
use crate::api::chat::schemas::{ChatResponse, SessionHistory};
use crate::core::Error;
use crate::core::chat::ChatRequest;
use crate::core::traits::ChatService;
use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/:tenant_id", post(send_message))
        .route("/:tenant_id/history/:session_id", get(history))
}

async fn send_message(
    Inject(chat_service): Inject<dyn ChatService>,
    Path(tenant_id): Path<i64>,
    ApiJson(request): ApiJson<ChatRequest>,
) -> Result<Json<ChatResponse>, Error> {
    let reply = chat_service.send(tenant_id, request).await?;
    Ok(Json(reply.into()))
}

async fn history(
    Inject(chat_service): Inject<dyn ChatService>,
    Path((tenant_id, session_id)): Path<(i64, String)>,
) -> Result<Json<SessionHistory>, Error> {
    let history = chat_service.history(tenant_id, &session_id).await?;
    Ok(Json(history.into()))
}

pub mod schemas {
    use crate::core::chat::{self, ChatReply, ProductReference};
    use crate::infrastructure::entities::{Message, MessageKind};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ReferencedProduct {
        pub id: i64,
        pub title: String,
        pub price: f64,
        pub image_url: Option<String>,
        pub handle: Option<String>,
        pub url: Option<String>,
    }

    impl From<ProductReference> for ReferencedProduct {
        fn from(product: ProductReference) -> Self {
            ReferencedProduct {
                id: product.id,
                title: product.title,
                price: product.price,
                image_url: product.image_url,
                handle: product.handle,
                url: product.url,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct ChatResponse {
        pub session_id: String,
        pub response: String,
        pub products_referenced: Vec<ReferencedProduct>,
        pub search_query: Option<String>,
        pub processing_time_ms: u64,
        pub contexts_used: Vec<String>,
        pub message_count: i64,
    }

    impl From<ChatReply> for ChatResponse {
        fn from(reply: ChatReply) -> Self {
            ChatResponse {
                session_id: reply.session_id,
                response: reply.response,
                products_referenced: reply
                    .products
                    .into_iter()
                    .map(ReferencedProduct::from)
                    .collect(),
                search_query: reply.search_query,
                processing_time_ms: reply.processing_time_ms,
                contexts_used: reply.contexts_used,
                message_count: reply.message_count,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum Sender {
        System,
        Assistant,
        User,
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct HistoryMessage {
        pub sender: Sender,
        pub content: String,
        pub product_ids: Vec<i64>,
        pub context_ids: Vec<i64>,
        pub created_at: DateTime<Utc>,
    }

    impl From<Message> for HistoryMessage {
        fn from(message: Message) -> Self {
            let sender = match message.kind {
                MessageKind::System => Sender::System,
                MessageKind::Bot => Sender::Assistant,
                MessageKind::User => Sender::User,
            };
            HistoryMessage {
                sender,
                content: message.content,
                product_ids: message.product_ids.map(|ids| ids.0).unwrap_or_default(),
                context_ids: message.context_ids.map(|ids| ids.0).unwrap_or_default(),
                created_at: message.created_at,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SessionHistory {
        pub session_id: String,
        pub started_at: DateTime<Utc>,
        pub message_count: i64,
        pub messages: Vec<HistoryMessage>,
    }

    impl From<chat::SessionHistory> for SessionHistory {
        fn from(history: chat::SessionHistory) -> Self {
            SessionHistory {
                session_id: history.session.session_key,
                started_at: history.session.started_at,
                message_count: history.session.message_count,
                messages: history
                    .messages
                    .into_iter()
                    .map(HistoryMessage::from)
                    .collect(),
            }
        }
    }
}
