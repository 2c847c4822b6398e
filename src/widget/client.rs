//! HTTP side of the widget

use crate::widget::WidgetError;
use crate::widget::config::{InlineConfig, ServerWidgetConfig, merge};
use crate::widget::state::{GatewayReply, Outgoing, WidgetState};
use log::{error, info};
use reqwest::StatusCode;
use std::time::Duration;
use url::Url;

pub struct WidgetClient {
    http: reqwest::Client,
    api_url: String,
}

impl WidgetClient {
    pub fn new(api_url: &str) -> WidgetClient {
        WidgetClient {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_owned(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, WidgetError> {
        let mut url = Url::parse(&self.api_url)?;
        url.path_segments_mut()
            .map_err(|_| WidgetError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn fetch_config(&self, tenant_slug: &str) -> Result<ServerWidgetConfig, WidgetError> {
        let url = self.endpoint(&["api", "widget", "config", tenant_slug])?;
        let response = self.http.get(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(WidgetError::TenantUnavailable),
            status => Err(WidgetError::Status(status.as_u16())),
        }
    }

    pub async fn send(&self, tenant_id: i64, message: &Outgoing) -> Result<GatewayReply, WidgetError> {
        let url = self.endpoint(&["api", "chat", &tenant_id.to_string()])?;
        let response = self.http.post(url).json(message).send().await?;

        match response.status() {
            status if status.is_success() => Ok(response.json().await?),
            StatusCode::NOT_FOUND => Err(WidgetError::TenantUnavailable),
            status => Err(WidgetError::Status(status.as_u16())),
        }
    }
}

/// A widget booted on a page.
pub struct Widget {
    pub client: WidgetClient,
    pub state: WidgetState,
    top_k: Option<u32>,
}

impl Widget {
    /// Fetches the server configuration and merges the inline overrides over it.
    ///
    /// Any failure is logged and yields no widget; the host page is never disturbed.
    pub async fn load(inline: &InlineConfig) -> Option<Widget> {
        if inline.tenant_slug.trim().is_empty() {
            error!("widget: tenantSlug is required");
            return None;
        }

        let client = WidgetClient::new(&inline.api_url);
        match client.fetch_config(inline.tenant_slug.trim()).await {
            Ok(server) => {
                info!("widget: loaded configuration for tenant {}", server.tenant_id);
                let state = WidgetState::new(merge(server, &inline.overrides));
                let mut widget = Widget {
                    client,
                    state,
                    top_k: inline.top_k,
                };
                if widget.state.auto_open_after() == Some(Duration::ZERO) {
                    widget.state.open();
                }
                Some(widget)
            }
            Err(e) => {
                error!("widget: initialization failed: {e}");
                None
            }
        }
    }

    /// Waits out the configured auto-open delay, then opens the window unless the visitor
    /// already did. Returns immediately when auto-open is off.
    pub async fn auto_open(&mut self) {
        let Some(delay) = self.state.auto_open_after() else {
            return;
        };
        tokio::time::sleep(delay).await;
        if !self.state.is_open() {
            self.state.open();
        }
    }

    /// Sends one visitor message and folds the outcome into the state.
    ///
    /// Returns `false` when nothing was sent.
    pub async fn send(&mut self, text: &str) -> bool {
        let Some(outgoing) = self.state.begin_send(text, self.top_k) else {
            return false;
        };

        let tenant_id = self.state.config().tenant_id;
        match self.client.send(tenant_id, &outgoing).await {
            Ok(reply) => self.state.receive(reply),
            Err(e) => {
                error!("widget: sending message failed: {e}");
                self.state.fail(&e);
            }
        }
        true
    }
}
