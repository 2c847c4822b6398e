//! Widget and embed snippet markup

use crate::widget::WidgetError;
use crate::widget::config::InlineConfig;
use crate::widget::state::WidgetState;
use minijinja::{Environment, Value, context};

const WIDGET_TEMPLATE: &str = r#"<div id="feattie-chat-widget" class="feattie-{{ config.widgetPosition }} feattie-size-{{ config.widgetSize }}" lang="{{ config.language }}" style="--feattie-primary: {{ config.brandColorPrimary }}; --feattie-secondary: {{ config.brandColorSecondary }};">
{% if custom_css %}<style>{{ custom_css }}</style>
{% endif %}<button class="feattie-toggle" aria-expanded="{{ is_open }}" aria-label="{{ config.chatTitle }}"></button>
{% if is_open %}<div class="feattie-window">
<div class="feattie-header">{% if config.logoUrl %}<img src="{{ config.logoUrl }}" class="feattie-logo" alt="">{% endif %}<span class="feattie-title">{{ config.chatTitle }}</span></div>
<div class="feattie-messages">
{% for message in messages %}<div class="feattie-message {{ message.sender }}">{{ message.text }}</div>
{% for product in message.products %}<div class="feattie-message product-card">
{% if product.imageUrl %}<img src="{{ product.imageUrl }}" class="feattie-product-image" alt="{{ product.title }}">{% endif %}
<div class="feattie-product-title">{{ product.title }}</div>
<div class="feattie-product-price">{{ product.price }}</div>
{% if product.url %}<a href="{{ product.url }}" target="_blank" rel="noopener">View product</a>{% endif %}
</div>
{% endfor %}{% endfor %}{% if typing %}<div class="feattie-message assistant typing">{{ typing }}</div>
{% endif %}</div>
<form class="feattie-input"><input type="text"{% if halted %} disabled{% endif %}><button type="submit"{% if loading or halted %} disabled{% endif %}>Send</button></form>
</div>
{% endif %}</div>
"#;

const EMBED_TEMPLATE: &str = r#"<!-- {{ tenant_name }} chat widget -->
<script>
  window.FeattieChat = {{ inline|tojson }};
</script>
<script src="{{ script_url }}" async></script>
"#;

/// Renders the widget markup for its current state. All text is HTML-escaped.
pub fn render_widget(state: &WidgetState) -> Result<String, WidgetError> {
    let mut env = Environment::new();
    env.add_template("widget.html", WIDGET_TEMPLATE)?;

    // `<` is the only character able to end the style element early.
    let custom_css = state
        .config()
        .custom_css
        .as_deref()
        .map(|css| css.replace('<', ""))
        .filter(|css| !css.trim().is_empty())
        .map(Value::from_safe_string)
        .unwrap_or_default();

    let rendered = env.get_template("widget.html")?.render(context! {
        config => state.config(),
        messages => state.messages(),
        is_open => state.is_open(),
        loading => state.is_loading(),
        halted => state.is_halted(),
        typing => state.typing_indicator(),
        custom_css => custom_css,
    })?;

    Ok(rendered)
}

/// Renders the snippet an integrator pastes into the storefront theme.
pub fn render_embed_code(
    tenant_name: &str,
    inline: &InlineConfig,
    script_url: &str,
) -> Result<String, WidgetError> {
    let mut env = Environment::new();
    env.add_template("embed.html", EMBED_TEMPLATE)?;

    let rendered = env.get_template("embed.html")?.render(context! {
        tenant_name => tenant_name,
        inline => inline,
        script_url => script_url,
    })?;

    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::entities::{WidgetPosition, WidgetSize};
    use crate::widget::config::{EffectiveWidgetConfig, InlineOverrides};
    use crate::widget::state::{GatewayReply, ProductCard};

    fn state(custom_css: Option<&str>) -> WidgetState {
        WidgetState::new(EffectiveWidgetConfig {
            tenant_id: 1,
            tenant_name: "Acme".to_owned(),
            brand_color_primary: "#667eea".to_owned(),
            brand_color_secondary: "#764ba2".to_owned(),
            widget_position: WidgetPosition::BottomLeft,
            chat_title: "Acme <Assistant>".to_owned(),
            welcome_message: "Welcome!".to_owned(),
            logo_url: None,
            avatar_url: None,
            auto_open: false,
            auto_open_delay_seconds: 3,
            show_typing_indicator: true,
            enable_sound_notifications: true,
            widget_size: WidgetSize::Small,
            language: "en".to_owned(),
            custom_css: custom_css.map(str::to_owned),
        })
    }

    #[test]
    fn test_closed_widget_renders_only_toggle() {
        let html = render_widget(&state(None)).unwrap();

        assert!(html.contains("feattie-bottom-left"));
        assert!(html.contains("feattie-size-small"));
        assert!(!html.contains("feattie-window"));
        assert!(!html.contains("<style>"));
    }

    #[test]
    fn test_messages_are_escaped() {
        let mut state = state(None);
        state.open();
        state.begin_send("<script>alert(1)</script>", None);
        state.receive(GatewayReply {
            session_id: "s".to_owned(),
            response: "Try these".to_owned(),
            products_referenced: vec![ProductCard {
                id: 1,
                title: "Red \"Shoes\"".to_owned(),
                price: 49.9,
                image_url: None,
                handle: Some("red-shoes".to_owned()),
                url: Some("https://acme.test/products/red-shoes".to_owned()),
            }],
        });

        let html = render_widget(&state).unwrap();

        assert!(html.contains("Acme &lt;Assistant&gt;"));
        assert!(html.contains("&lt;script&gt;alert(1)"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("Red &quot;Shoes&quot;"));
        assert!(html.contains("red-shoes\" target=\"_blank\""));
    }

    #[test]
    fn test_custom_css_cannot_close_style_element() {
        let html = render_widget(&state(Some(".a > .b { color: red }</style><script>x</script>"))).unwrap();

        assert!(html.contains(".a > .b { color: red }"));
        assert!(!html.contains("</style><script>"));
        assert_eq!(html.matches("</style>").count(), 1);
    }

    #[test]
    fn test_embed_code_contains_inline_config() {
        let inline = InlineConfig {
            tenant_slug: "acme".to_owned(),
            api_url: "https://chat.example.com".to_owned(),
            top_k: None,
            overrides: InlineOverrides::default(),
        };

        let code = render_embed_code("Acme", &inline, "https://chat.example.com/widget/widget.js").unwrap();

        assert!(code.contains(r#""tenantSlug":"acme""#));
        assert!(code.contains(r#""apiUrl":"https://chat.example.com""#));
        assert!(code.contains("widget.js\" async></script>"));
    }
}
