//! Widget settings, embed code and RAG configuration of a tenant

use crate::api::settings::schemas::{RagConfiguration, Settings};
use crate::api::{ApiJson, AuthToken};
use crate::core::Error;
use crate::core::settings::{EmbedCode, RagConfigUpdate, SettingsUpdate};
use crate::core::traits::{AuthService, SettingsService};
use crate::infrastructure::entities::TenantRole;
use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/:id/settings", get(get_settings).put(update_settings))
        .route("/:id/settings/embed-code", get(embed_code))
        .route("/:id/rag-config", get(get_rag_config).put(update_rag_config))
}

async fn get_settings(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(settings_service): Inject<dyn SettingsService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Settings>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(settings_service.settings(tenant_id).await?.into()))
}

async fn update_settings(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(settings_service): Inject<dyn SettingsService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(update): ApiJson<SettingsUpdate>,
) -> Result<Json<Settings>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Editor)
        .await?;

    let settings = settings_service.update_settings(tenant_id, update).await?;
    Ok(Json(settings.into()))
}

async fn embed_code(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(settings_service): Inject<dyn SettingsService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<EmbedCode>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Admin)
        .await?;

    Ok(Json(settings_service.embed_code(tenant_id).await?))
}

async fn get_rag_config(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(settings_service): Inject<dyn SettingsService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<RagConfiguration>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(settings_service.rag_config(tenant_id).await?.into()))
}

async fn update_rag_config(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(settings_service): Inject<dyn SettingsService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(update): ApiJson<RagConfigUpdate>,
) -> Result<Json<RagConfiguration>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Editor)
        .await?;

    let config = settings_service.update_rag_config(tenant_id, update).await?;
    Ok(Json(config.into()))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::{
        EmbeddingProvider, LlmProvider, WidgetPosition, WidgetSize,
    };
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Settings {
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
        pub allowed_domains: Vec<String>,
        pub widget_size: WidgetSize,
        pub language: String,
        pub timezone: String,
        pub custom_css: Option<String>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::TenantSettings> for Settings {
        fn from(settings: entities::TenantSettings) -> Self {
            Settings {
                tenant_id: settings.tenant_id,
                brand_color_primary: settings.brand_color_primary,
                brand_color_secondary: settings.brand_color_secondary,
                widget_position: settings.widget_position,
                chat_title: settings.chat_title,
                welcome_message: settings.welcome_message,
                logo_url: settings.logo_url,
                avatar_url: settings.avatar_url,
                auto_open: settings.auto_open,
                auto_open_delay_seconds: settings.auto_open_delay_seconds,
                show_typing_indicator: settings.show_typing_indicator,
                enable_sound_notifications: settings.enable_sound_notifications,
                allowed_domains: settings.allowed_domains.0,
                widget_size: settings.widget_size,
                language: settings.language,
                timezone: settings.timezone,
                custom_css: settings.custom_css,
                updated_at: settings.updated_at,
            }
        }
    }

    /// RAG configuration without its API keys; only their presence is reported.
    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct RagConfiguration {
        pub tenant_id: i64,
        pub embedding_provider: EmbeddingProvider,
        pub embedding_model: String,
        pub has_openai_api_key: bool,
        pub llm_provider: LlmProvider,
        pub llm_model: String,
        pub has_llm_api_key: bool,
        pub temperature: f64,
        pub max_tokens: i64,
        pub default_top_k: i64,
        pub deduplicate_results: bool,
        pub min_similarity: f64,
        pub language: String,
        pub system_prompt: String,
        pub enable_context_injection: bool,
        pub enable_conversation_history: bool,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::RagConfiguration> for RagConfiguration {
        fn from(config: entities::RagConfiguration) -> Self {
            RagConfiguration {
                tenant_id: config.tenant_id,
                embedding_provider: config.embedding_provider,
                embedding_model: config.embedding_model,
                has_openai_api_key: config.openai_api_key.is_some(),
                llm_provider: config.llm_provider,
                llm_model: config.llm_model,
                has_llm_api_key: config.llm_api_key.is_some(),
                temperature: config.temperature,
                max_tokens: config.max_tokens,
                default_top_k: config.default_top_k,
                deduplicate_results: config.deduplicate_results,
                min_similarity: config.min_similarity,
                language: config.language,
                system_prompt: config.system_prompt,
                enable_context_injection: config.enable_context_injection,
                enable_conversation_history: config.enable_conversation_history,
                updated_at: config.updated_at,
            }
        }
    }
}
