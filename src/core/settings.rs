//! Widget presentation settings and RAG configuration of a tenant

use crate::core::error::{Error, Result};
use crate::core::traits::SettingsService;
use crate::core::validation;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{
    EmbeddingProvider, LlmProvider, RagConfiguration, Tenant, TenantSettings, WidgetPosition,
    WidgetSize,
};
use crate::infrastructure::traits::{SettingsRepository, TenantRepository};
use crate::widget::config::{InlineConfig, InlineOverrides, ServerWidgetConfig};
use crate::widget::render::render_embed_code;
use async_trait::async_trait;
use di::{Ref, injectable};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

const MAX_ALLOWED_DOMAINS: usize = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub brand_color_primary: Option<String>,
    pub brand_color_secondary: Option<String>,
    pub widget_position: Option<WidgetPosition>,
    pub chat_title: Option<String>,
    pub welcome_message: Option<String>,
    pub logo_url: Option<String>,
    pub avatar_url: Option<String>,
    pub auto_open: Option<bool>,
    pub auto_open_delay_seconds: Option<i64>,
    pub show_typing_indicator: Option<bool>,
    pub enable_sound_notifications: Option<bool>,
    pub allowed_domains: Option<Vec<String>>,
    pub widget_size: Option<WidgetSize>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub custom_css: Option<String>,
}

impl SettingsUpdate {
    fn apply(self, settings: &mut TenantSettings) -> Result<()> {
        if let Some(color) = self.brand_color_primary {
            settings.brand_color_primary = validation::hex_color("brandColorPrimary", &color)?;
        }
        if let Some(color) = self.brand_color_secondary {
            settings.brand_color_secondary = validation::hex_color("brandColorSecondary", &color)?;
        }
        if let Some(position) = self.widget_position {
            settings.widget_position = position;
        }
        if let Some(title) = self.chat_title {
            settings.chat_title = validation::required_text("chatTitle", &title, 100)?;
        }
        if let Some(message) = self.welcome_message {
            settings.welcome_message = validation::required_text("welcomeMessage", &message, 500)?;
        }
        if let Some(url) = self.logo_url {
            settings.logo_url = validation::optional_http_url("logoUrl", &url)?;
        }
        if let Some(url) = self.avatar_url {
            settings.avatar_url = validation::optional_http_url("avatarUrl", &url)?;
        }
        if let Some(auto_open) = self.auto_open {
            settings.auto_open = auto_open;
        }
        if let Some(delay) = self.auto_open_delay_seconds {
            settings.auto_open_delay_seconds =
                validation::in_range("autoOpenDelaySeconds", delay, 0, 120)?;
        }
        if let Some(flag) = self.show_typing_indicator {
            settings.show_typing_indicator = flag;
        }
        if let Some(flag) = self.enable_sound_notifications {
            settings.enable_sound_notifications = flag;
        }
        if let Some(domains) = self.allowed_domains {
            if domains.len() > MAX_ALLOWED_DOMAINS {
                return Err(Error::bad_request(format!(
                    "at most {MAX_ALLOWED_DOMAINS} allowed domains are supported"
                )));
            }
            let mut normalized: Vec<String> = Vec::with_capacity(domains.len());
            for domain in domains.iter().filter(|d| !d.trim().is_empty()) {
                let domain = validation::domain(domain)?;
                if !normalized.contains(&domain) {
                    normalized.push(domain);
                }
            }
            settings.allowed_domains = Json(normalized);
        }
        if let Some(size) = self.widget_size {
            settings.widget_size = size;
        }
        if let Some(language) = self.language {
            settings.language = validation::language(&language)?;
        }
        if let Some(timezone) = self.timezone {
            settings.timezone = validation::required_text("timezone", &timezone, 64)?;
        }
        if let Some(css) = self.custom_css {
            settings.custom_css = validation::optional_text("customCss", &css, 10_000)?;
        }
        Ok(())
    }
}

/// RAG configuration changes. For the API keys an empty string removes the stored key.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfigUpdate {
    pub embedding_provider: Option<EmbeddingProvider>,
    pub embedding_model: Option<String>,
    pub openai_api_key: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<i64>,
    pub default_top_k: Option<i64>,
    pub deduplicate_results: Option<bool>,
    pub min_similarity: Option<f64>,
    pub language: Option<String>,
    pub system_prompt: Option<String>,
    pub enable_context_injection: Option<bool>,
    pub enable_conversation_history: Option<bool>,
}

impl RagConfigUpdate {
    fn apply(self, config: &mut RagConfiguration) -> Result<()> {
        if let Some(provider) = self.embedding_provider {
            config.embedding_provider = provider;
        }
        if let Some(model) = self.embedding_model {
            config.embedding_model = validation::required_text("embeddingModel", &model, 200)?;
        }
        if let Some(key) = self.openai_api_key {
            config.openai_api_key = validation::optional_text("openaiApiKey", &key, 512)?;
        }
        if let Some(provider) = self.llm_provider {
            config.llm_provider = provider;
        }
        if let Some(model) = self.llm_model {
            config.llm_model = validation::required_text("llmModel", &model, 200)?;
        }
        if let Some(key) = self.llm_api_key {
            config.llm_api_key = validation::optional_text("llmApiKey", &key, 512)?;
        }
        if let Some(temperature) = self.temperature {
            config.temperature = validation::in_range("temperature", temperature, 0.0, 2.0)?;
        }
        if let Some(max_tokens) = self.max_tokens {
            config.max_tokens = validation::in_range("maxTokens", max_tokens, 1, 8192)?;
        }
        if let Some(top_k) = self.default_top_k {
            config.default_top_k = validation::in_range("defaultTopK", top_k, 1, 50)?;
        }
        if let Some(flag) = self.deduplicate_results {
            config.deduplicate_results = flag;
        }
        if let Some(similarity) = self.min_similarity {
            config.min_similarity = validation::in_range("minSimilarity", similarity, 0.0, 1.0)?;
        }
        if let Some(language) = self.language {
            config.language = validation::language(&language)?;
        }
        if let Some(prompt) = self.system_prompt {
            config.system_prompt = validation::required_text("systemPrompt", &prompt, 10_000)?;
        }
        if let Some(flag) = self.enable_context_injection {
            config.enable_context_injection = flag;
        }
        if let Some(flag) = self.enable_conversation_history {
            config.enable_conversation_history = flag;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmbedCode {
    pub tenant_slug: String,
    pub embed_code: String,
    pub instructions: String,
}

#[injectable(SettingsService)]
pub struct MySettingsService {
    settings: Ref<dyn SettingsRepository>,
    tenants: Ref<dyn TenantRepository>,
    config: Ref<AppConfig>,
}

impl MySettingsService {
    async fn existing(&self, tenant_id: i64) -> Result<Tenant> {
        self.tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or(Error::NotFound("tenant"))
    }

    async fn settings_of(&self, tenant: &Tenant) -> Result<TenantSettings> {
        Ok(self
            .settings
            .find_settings(tenant.id)
            .await?
            .unwrap_or_else(|| TenantSettings::defaults_for(tenant)))
    }

    async fn rag_config_of(&self, tenant: &Tenant) -> Result<RagConfiguration> {
        Ok(self
            .settings
            .find_rag_config(tenant.id)
            .await?
            .unwrap_or_else(|| {
                RagConfiguration::defaults_for(tenant, self.config.default_llm_api_key.clone())
            }))
    }
}

#[async_trait]
impl SettingsService for MySettingsService {
    async fn settings(&self, tenant_id: i64) -> Result<TenantSettings> {
        let tenant = self.existing(tenant_id).await?;
        self.settings_of(&tenant).await
    }

    async fn update_settings(&self, tenant_id: i64, update: SettingsUpdate) -> Result<TenantSettings> {
        let tenant = self.existing(tenant_id).await?;
        let mut settings = self.settings_of(&tenant).await?;

        update.apply(&mut settings)?;
        let saved = self.settings.save_settings(&settings).await?;

        info!("updated widget settings of tenant {tenant_id}");
        Ok(saved)
    }

    async fn embed_code(&self, tenant_id: i64) -> Result<EmbedCode> {
        let tenant = self.existing(tenant_id).await?;

        let base_url = &self.config.public_base_url;
        let inline = InlineConfig {
            tenant_slug: tenant.slug.clone(),
            api_url: base_url.clone(),
            top_k: None,
            overrides: InlineOverrides::default(),
        };

        let embed_code = render_embed_code(&tenant.name, &inline, &format!("{base_url}/widget/widget.js"))
            .map_err(|e| {
                error!("failed to render embed code for tenant {tenant_id}: {e}");
                Error::Internal("failed to render embed code".to_owned())
            })?;

        Ok(EmbedCode {
            tenant_slug: tenant.slug,
            embed_code,
            instructions: "Paste this snippet right before the closing </body> tag of your storefront theme. Presentation fields such as chatTitle or brandColorPrimary may be added to the FeattieChat object to override the dashboard settings.".to_owned(),
        })
    }

    async fn widget_config(&self, slug: &str) -> Result<ServerWidgetConfig> {
        let tenant = match self.tenants.find_tenant_by_slug(slug).await? {
            Some(tenant) if tenant.is_active => tenant,
            _ => {
                debug!("widget configuration requested for unavailable tenant {slug:?}");
                return Err(Error::TenantUnavailable);
            }
        };

        let settings = self.settings_of(&tenant).await?;
        Ok(ServerWidgetConfig::from_settings(&tenant, &settings))
    }

    async fn rag_config(&self, tenant_id: i64) -> Result<RagConfiguration> {
        let tenant = self.existing(tenant_id).await?;
        self.rag_config_of(&tenant).await
    }

    async fn update_rag_config(&self, tenant_id: i64, update: RagConfigUpdate) -> Result<RagConfiguration> {
        let tenant = self.existing(tenant_id).await?;
        let mut config = self.rag_config_of(&tenant).await?;

        update.apply(&mut config)?;
        let saved = self.settings.save_rag_config(&config).await?;

        info!("updated RAG configuration of tenant {tenant_id}");
        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tenant() -> Tenant {
        let now = Utc::now();
        Tenant {
            id: 3,
            name: "Acme".to_owned(),
            slug: "acme".to_owned(),
            store_url: "https://acme.test".to_owned(),
            access_token: Some("shpat_secret".to_owned()),
            is_active: true,
            max_products: 1000,
            product_count: 0,
            last_product_sync: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_settings_update_validates_and_normalizes() {
        let mut settings = TenantSettings::defaults_for(&tenant());
        let update = SettingsUpdate {
            brand_color_primary: Some("#000000".to_owned()),
            auto_open_delay_seconds: Some(10),
            allowed_domains: Some(vec![
                "Shop.Acme.test".to_owned(),
                "shop.acme.test".to_owned(),
                " ".to_owned(),
            ]),
            logo_url: Some(String::new()),
            ..Default::default()
        };

        update.apply(&mut settings).unwrap();

        assert_eq!(settings.brand_color_primary, "#000000");
        assert_eq!(settings.auto_open_delay_seconds, 10);
        assert_eq!(settings.allowed_domains.0, vec!["shop.acme.test".to_owned()]);
        assert_eq!(settings.logo_url, None);
        assert_eq!(settings.chat_title, "Acme Assistant");
    }

    #[test]
    fn test_settings_update_rejects_bad_values() {
        let mut settings = TenantSettings::defaults_for(&tenant());

        let bad_delay = SettingsUpdate {
            auto_open_delay_seconds: Some(121),
            ..Default::default()
        };
        assert!(matches!(bad_delay.apply(&mut settings), Err(Error::BadRequest(_))));

        let bad_color = SettingsUpdate {
            brand_color_secondary: Some("red".to_owned()),
            ..Default::default()
        };
        assert!(matches!(bad_color.apply(&mut settings), Err(Error::BadRequest(_))));
    }

    #[test]
    fn test_rag_update_bounds_and_key_clearing() {
        let mut config = RagConfiguration::defaults_for(&tenant(), Some("sk-test".to_owned()));

        RagConfigUpdate {
            temperature: Some(1.5),
            default_top_k: Some(10),
            llm_api_key: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut config)
        .unwrap();

        assert_eq!(config.temperature, 1.5);
        assert_eq!(config.default_top_k, 10);
        assert_eq!(config.llm_api_key, None);

        for update in [
            RagConfigUpdate { temperature: Some(2.1), ..Default::default() },
            RagConfigUpdate { max_tokens: Some(0), ..Default::default() },
            RagConfigUpdate { default_top_k: Some(51), ..Default::default() },
            RagConfigUpdate { min_similarity: Some(-0.1), ..Default::default() },
        ] {
            assert!(update.apply(&mut config).is_err());
        }
    }

    #[test]
    fn test_widget_config_omits_secrets() {
        let tenant = tenant();
        let config = ServerWidgetConfig::from_settings(&tenant, &TenantSettings::defaults_for(&tenant));
        let json = serde_json::to_string(&config).unwrap();

        assert!(!json.contains("shpat_secret"));
        assert!(json.contains("\"tenantId\":3"));
    }
}
