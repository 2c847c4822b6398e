//! Database entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Role {
    User = 0,
    Admin = 1,
}

/// Role of a user inside a single tenant. Ordered from least to most privileged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TenantRole {
    Viewer = 0,
    Editor = 1,
    Admin = 2,
}

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub store_url: String,
    pub access_token: Option<String>,
    pub is_active: bool,
    pub max_products: i64,
    pub product_count: i64,
    pub last_product_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TenantMember {
    pub tenant_id: i64,
    pub user_id: i64,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: TenantRole,
    pub joined_at: DateTime<Utc>,
}

/// A tenant as seen through one of its members.
#[derive(Debug, Clone, FromRow)]
pub struct Membership {
    pub tenant_id: i64,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub role: TenantRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct Product {
    pub id: i64,
    pub tenant_id: i64,
    pub external_id: i64,
    pub title: String,
    pub vendor: String,
    pub product_type: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub handle: Option<String>,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextKind {
    General,
    Shipping,
    Returns,
    Payment,
    Promotion,
    Faq,
    BrandStory,
    SizeGuide,
    CareInstructions,
}

#[derive(Debug, Clone, FromRow)]
pub struct Context {
    pub id: i64,
    pub tenant_id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub kind: ContextKind,
    pub trigger_keywords: Json<Vec<String>>,
    pub always_include: bool,
    pub priority: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    Local,
    Openai,
    Cohere,
    Huggingface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LlmProvider {
    Openai,
    Anthropic,
    Cohere,
    Local,
}

#[derive(Debug, Clone, FromRow)]
pub struct RagConfiguration {
    pub tenant_id: i64,
    pub embedding_provider: EmbeddingProvider,
    pub embedding_model: String,
    pub openai_api_key: Option<String>,
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub default_top_k: i64,
    pub deduplicate_results: bool,
    pub min_similarity: f64,
    pub language: String,
    pub system_prompt: String,
    pub enable_context_injection: bool,
    pub enable_conversation_history: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RagConfiguration {
    /// Configuration a freshly created tenant starts with.
    pub fn defaults_for(tenant: &Tenant, llm_api_key: Option<String>) -> RagConfiguration {
        let now = Utc::now();
        RagConfiguration {
            tenant_id: tenant.id,
            embedding_provider: EmbeddingProvider::Local,
            embedding_model: "intfloat/multilingual-e5-large".to_owned(),
            openai_api_key: None,
            llm_provider: LlmProvider::Openai,
            llm_model: "gpt-4o-mini".to_owned(),
            llm_api_key,
            temperature: 0.7,
            max_tokens: 500,
            default_top_k: 5,
            deduplicate_results: true,
            min_similarity: 0.3,
            language: "en".to_owned(),
            system_prompt: format!(
                "You are a shopping assistant for {}. Understand what the customer needs and recommend suitable products from the store.",
                tenant.name
            ),
            enable_context_injection: true,
            enable_conversation_history: true,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "kebab-case")]
#[sqlx(rename_all = "kebab-case")]
pub enum WidgetPosition {
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
}

impl WidgetPosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetPosition::BottomRight => "bottom-right",
            WidgetPosition::BottomLeft => "bottom-left",
            WidgetPosition::TopRight => "top-right",
            WidgetPosition::TopLeft => "top-left",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum WidgetSize {
    Small,
    Medium,
    Large,
}

impl WidgetSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetSize::Small => "small",
            WidgetSize::Medium => "medium",
            WidgetSize::Large => "large",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TenantSettings {
    pub tenant_id: i64,
    pub brand_color_primary: String,
    pub brand_color_secondary: String,
    pub widget_position: WidgetPosition,
    pub chat_title: String,
    pub welcome_message: String,
    pub logo_url: Option<String>,
    pub avatar_url: Option<String>,
    pub auto_open: bool,
    pub auto_open_delay_seconds: i64,
    pub show_typing_indicator: bool,
    pub enable_sound_notifications: bool,
    pub allowed_domains: Json<Vec<String>>,
    pub widget_size: WidgetSize,
    pub language: String,
    pub timezone: String,
    pub custom_css: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TenantSettings {
    /// Settings used whenever a tenant has never saved its own.
    pub fn defaults_for(tenant: &Tenant) -> TenantSettings {
        let now = Utc::now();
        TenantSettings {
            tenant_id: tenant.id,
            brand_color_primary: "#667eea".to_owned(),
            brand_color_secondary: "#764ba2".to_owned(),
            widget_position: WidgetPosition::BottomRight,
            chat_title: format!("{} Assistant", tenant.name),
            welcome_message: format!("Hi! How can I help you with {} today?", tenant.name),
            logo_url: None,
            avatar_url: None,
            auto_open: false,
            auto_open_delay_seconds: 3,
            show_typing_indicator: true,
            enable_sound_notifications: true,
            allowed_domains: Json(Vec::new()),
            widget_size: WidgetSize::Medium,
            language: "en".to_owned(),
            timezone: "UTC".to_owned(),
            custom_css: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ChatSession {
    pub id: i64,
    pub tenant_id: i64,
    pub session_key: String,
    pub user_fingerprint: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub message_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[repr(u8)]
pub enum MessageKind {
    System = 1,
    Bot = 2,
    User = 3,
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: i64,
    pub session_id: i64,
    pub kind: MessageKind,
    pub content: String,
    pub product_ids: Option<Json<Vec<i64>>>,
    pub context_ids: Option<Json<Vec<i64>>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct TenantStats {
    pub product_count: i64,
    pub products_with_embeddings: i64,
    pub context_count: i64,
    pub active_contexts: i64,
    pub user_count: i64,
    pub chat_session_count: i64,
    pub total_messages: i64,
    pub has_rag_configuration: bool,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct ProductStats {
    pub total: i64,
    pub with_embeddings: i64,
    pub average_price: Option<f64>,
}
