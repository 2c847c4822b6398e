//! State of a single widget instance

use crate::widget::WidgetError;
use crate::widget::config::EffectiveWidgetConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const APOLOGY: &str = "Sorry, something went wrong. Please try again.";
pub const UNAVAILABLE: &str = "This chat is currently unavailable.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCard {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub image_url: Option<String>,
    pub handle: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bubble {
    pub sender: Sender,
    pub text: String,
    pub products: Vec<ProductCard>,
}

/// What the gateway answered to one message.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayReply {
    pub session_id: String,
    pub response: String,
    #[serde(default)]
    pub products_referenced: Vec<ProductCard>,
}

/// A message ready to be posted to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outgoing {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct WidgetState {
    config: EffectiveWidgetConfig,
    is_open: bool,
    is_loading: bool,
    halted: bool,
    session_id: Option<String>,
    messages: Vec<Bubble>,
}

impl WidgetState {
    pub fn new(config: EffectiveWidgetConfig) -> WidgetState {
        WidgetState {
            config,
            is_open: false,
            is_loading: false,
            halted: false,
            session_id: None,
            messages: Vec::new(),
        }
    }

    pub fn config(&self) -> &EffectiveWidgetConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn messages(&self) -> &[Bubble] {
        &self.messages
    }

    /// How long after boot the window opens by itself, if it does at all.
    pub fn auto_open_after(&self) -> Option<Duration> {
        self.config.auto_open.then(|| {
            Duration::from_secs(u64::try_from(self.config.auto_open_delay_seconds).unwrap_or(0))
        })
    }

    /// Opens the chat window, greeting with the welcome message the first time.
    pub fn open(&mut self) {
        self.is_open = true;
        if self.messages.is_empty() {
            let welcome = self.config.welcome_message.clone();
            self.push(Sender::Assistant, welcome, Vec::new());
        }
    }

    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn toggle(&mut self) {
        if self.is_open {
            self.close();
        } else {
            self.open();
        }
    }

    /// Records the visitor's message and returns what to send, or `None` when nothing may be
    /// sent right now (blank input, a request in flight, or a halted widget).
    pub fn begin_send(&mut self, text: &str, top_k: Option<u32>) -> Option<Outgoing> {
        let text = text.trim();
        if text.is_empty() || self.is_loading || self.halted {
            return None;
        }

        self.push(Sender::User, text.to_owned(), Vec::new());
        self.is_loading = true;

        Some(Outgoing {
            query: text.to_owned(),
            session_id: self.session_id.clone(),
            top_k,
        })
    }

    pub fn receive(&mut self, reply: GatewayReply) {
        self.is_loading = false;
        if !reply.session_id.is_empty() {
            self.session_id = Some(reply.session_id);
        }
        self.push(Sender::Assistant, reply.response, reply.products_referenced);
    }

    /// Turns a failed send into a chat bubble. The session is kept so that resending
    /// continues the same conversation.
    pub fn fail(&mut self, error: &WidgetError) {
        self.is_loading = false;
        match error {
            WidgetError::TenantUnavailable => {
                self.halted = true;
                self.push(Sender::Assistant, UNAVAILABLE.to_owned(), Vec::new());
            }
            _ => self.push(Sender::Assistant, APOLOGY.to_owned(), Vec::new()),
        }
    }

    /// Text of the pending-answer bubble while a request is in flight.
    pub fn typing_indicator(&self) -> Option<&'static str> {
        match (self.is_loading, self.config.show_typing_indicator) {
            (false, _) => None,
            (true, true) => Some("Thinking..."),
            (true, false) => Some("..."),
        }
    }

    fn push(&mut self, sender: Sender, text: String, products: Vec<ProductCard>) {
        self.messages.push(Bubble {
            sender,
            text,
            products,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::entities::{WidgetPosition, WidgetSize};

    fn state() -> WidgetState {
        WidgetState::new(EffectiveWidgetConfig {
            tenant_id: 1,
            tenant_name: "Acme".to_owned(),
            brand_color_primary: "#667eea".to_owned(),
            brand_color_secondary: "#764ba2".to_owned(),
            widget_position: WidgetPosition::BottomRight,
            chat_title: "Acme Assistant".to_owned(),
            welcome_message: "Welcome!".to_owned(),
            logo_url: None,
            avatar_url: None,
            auto_open: false,
            auto_open_delay_seconds: 3,
            show_typing_indicator: true,
            enable_sound_notifications: true,
            widget_size: WidgetSize::Medium,
            language: "en".to_owned(),
            custom_css: None,
        })
    }

    fn reply(session_id: &str) -> GatewayReply {
        GatewayReply {
            session_id: session_id.to_owned(),
            response: "Here you go".to_owned(),
            products_referenced: Vec::new(),
        }
    }

    #[test]
    fn test_welcome_shown_only_on_first_open() {
        let mut state = state();
        state.open();
        state.close();
        state.toggle();

        assert!(state.is_open());
        assert_eq!(state.messages().len(), 1);
        assert_eq!(state.messages()[0].text, "Welcome!");
    }

    #[test]
    fn test_auto_open_delay() {
        let mut state = state();
        assert_eq!(state.auto_open_after(), None);

        state.config.auto_open = true;
        assert_eq!(state.auto_open_after(), Some(Duration::from_secs(3)));

        state.config.auto_open_delay_seconds = -1;
        assert_eq!(state.auto_open_after(), Some(Duration::ZERO));
    }

    #[test]
    fn test_session_id_round_trips() {
        let mut state = state();

        let first = state.begin_send("red shoes", Some(3)).unwrap();
        assert_eq!(first.session_id, None);
        assert_eq!(state.typing_indicator(), Some("Thinking..."));
        state.receive(reply("abc"));

        let second = state.begin_send("cheaper?", None).unwrap();
        assert_eq!(second.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_no_send_while_loading_or_blank() {
        let mut state = state();

        assert!(state.begin_send("   ", None).is_none());
        assert!(state.begin_send("hello", None).is_some());
        assert!(state.begin_send("again", None).is_none());
        assert_eq!(state.messages().len(), 1);
    }

    #[test]
    fn test_transport_failure_keeps_session() {
        let mut state = state();
        state.begin_send("hi", None);
        state.receive(reply("abc"));

        state.begin_send("more", None);
        state.fail(&WidgetError::Status(500));

        assert!(!state.is_loading());
        assert!(!state.is_halted());
        assert_eq!(state.session_id(), Some("abc"));
        assert_eq!(state.messages().last().unwrap().text, APOLOGY);
        assert!(state.begin_send("retry", None).is_some());
    }

    #[test]
    fn test_unavailable_tenant_halts() {
        let mut state = state();
        state.begin_send("hi", None);
        state.fail(&WidgetError::TenantUnavailable);

        assert!(state.is_halted());
        assert_eq!(state.messages().last().unwrap().text, UNAVAILABLE);
        assert!(state.begin_send("hello?", None).is_none());
    }
}
