//! Public widget bootstrap

use crate::core::Error;
use crate::core::traits::SettingsService;
use crate::widget::config::ServerWidgetConfig;
use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new().route("/config/:slug", get(widget_config))
}

async fn widget_config(
    Inject(settings_service): Inject<dyn SettingsService>,
    Path(slug): Path<String>,
) -> Result<Json<ServerWidgetConfig>, Error> {
    Ok(Json(settings_service.widget_config(&slug).await?))
}
