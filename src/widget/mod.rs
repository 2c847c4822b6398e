//! Embeddable chat widget
//!
//! A typed model of the script storefronts embed: the configuration it merges, the state of
//! one widget instance, the HTTP client talking to the chat gateway and the markup it renders.

pub mod client;
pub mod config;
pub mod render;
pub mod state;

#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// The tenant is unknown or inactive. The widget stops talking to the server.
    #[error("tenant is unavailable")]
    TenantUnavailable,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server answered with status {0}")]
    Status(u16),

    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("failed to render widget: {0}")]
    Render(#[from] minijinja::Error),
}
