//! Widget configuration: what the server publishes, what the embedding page overrides,
//! and the merged result the widget renders with.

use crate::infrastructure::entities::{Tenant, TenantSettings, WidgetPosition, WidgetSize};
use serde::{Deserialize, Serialize};

/// Public, non-secret presentation settings of a tenant, as served by
/// `GET /api/widget/config/{slug}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerWidgetConfig {
    pub tenant_id: i64,
    pub tenant_name: String,
    pub tenant_slug: String,
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
    pub widget_size: WidgetSize,
    pub language: String,
    pub custom_css: Option<String>,
}

impl ServerWidgetConfig {
    pub fn from_settings(tenant: &Tenant, settings: &TenantSettings) -> ServerWidgetConfig {
        ServerWidgetConfig {
            tenant_id: tenant.id,
            tenant_name: tenant.name.clone(),
            tenant_slug: tenant.slug.clone(),
            brand_color_primary: settings.brand_color_primary.clone(),
            brand_color_secondary: settings.brand_color_secondary.clone(),
            widget_position: settings.widget_position,
            chat_title: settings.chat_title.clone(),
            welcome_message: settings.welcome_message.clone(),
            logo_url: settings.logo_url.clone(),
            avatar_url: settings.avatar_url.clone(),
            auto_open: settings.auto_open,
            auto_open_delay_seconds: settings.auto_open_delay_seconds,
            show_typing_indicator: settings.show_typing_indicator,
            enable_sound_notifications: settings.enable_sound_notifications,
            widget_size: settings.widget_size,
            language: settings.language.clone(),
            custom_css: settings.custom_css.clone(),
        }
    }
}

/// Presentation fields the integrator may override in the inline snippet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color_primary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_color_secondary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_position: Option<WidgetPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub widget_size: Option<WidgetSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// The inline `window.FeattieChat` object of the embed snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineConfig {
    pub tenant_slug: String,
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(flatten)]
    pub overrides: InlineOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveWidgetConfig {
    pub tenant_id: i64,
    pub tenant_name: String,
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
    pub widget_size: WidgetSize,
    pub language: String,
    pub custom_css: Option<String>,
}

/// Merges inline overrides over the server configuration.
///
/// Inline values win for colors, position, title, welcome message, size and language; blank
/// strings count as absent. Tenant identity, auto-open, typing indicator, sound and custom CSS
/// always come from the server.
pub fn merge(server: ServerWidgetConfig, overrides: &InlineOverrides) -> EffectiveWidgetConfig {
    fn pick(inline: &Option<String>, server: String) -> String {
        match inline.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => value.to_owned(),
            _ => server,
        }
    }

    EffectiveWidgetConfig {
        tenant_id: server.tenant_id,
        tenant_name: server.tenant_name,
        brand_color_primary: pick(&overrides.brand_color_primary, server.brand_color_primary),
        brand_color_secondary: pick(&overrides.brand_color_secondary, server.brand_color_secondary),
        widget_position: overrides.widget_position.unwrap_or(server.widget_position),
        chat_title: pick(&overrides.chat_title, server.chat_title),
        welcome_message: pick(&overrides.welcome_message, server.welcome_message),
        logo_url: server.logo_url,
        avatar_url: server.avatar_url,
        auto_open: server.auto_open,
        auto_open_delay_seconds: server.auto_open_delay_seconds,
        show_typing_indicator: server.show_typing_indicator,
        enable_sound_notifications: server.enable_sound_notifications,
        widget_size: overrides.widget_size.unwrap_or(server.widget_size),
        language: pick(&overrides.language, server.language),
        custom_css: server.custom_css,
    }
}
