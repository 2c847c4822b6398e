use crate::core::Error;
use crate::core::auth::AUTH_COOKIE;
use crate::infrastructure::config::AppConfig;
use async_trait::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::{ACCEPT, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderValue, Method};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use log::warn;
use serde::de::DeserializeOwned;
use tower_http::cors::{Any, CorsLayer};

pub mod auth;
pub mod chat;
pub mod contexts;
pub mod error;
pub mod products;
pub mod settings;
pub mod tenants;
pub mod users;
pub mod widget;

/// Raw session token taken from the auth cookie. Verified by the auth service.
#[derive(Debug)]
pub struct AuthToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Error> {
        CookieJar::from_headers(&parts.headers)
            .get(AUTH_COOKIE)
            .map(|cookie| cookie.value().to_owned())
            .filter(|token| !token.is_empty())
            .map(AuthToken)
            .ok_or(Error::Unauthenticated)
    }
}

/// JSON body whose rejections are reported as `400` with the service error shape.
#[derive(Debug)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self, Error> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(Error::BadRequest(rejection.body_text())),
        }
    }
}

/// All routes under `/api`. The public widget/chat surface and the admin surface carry
/// different CORS policies.
pub fn router(config: &AppConfig) -> Router {
    let public = Router::new()
        .nest("/widget", widget::router())
        .nest("/chat", chat::router())
        .layer(public_cors());

    let admin = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/tenants", tenants::router())
        .layer(admin_cors(&config.admin_origins));

    Router::new().nest("/api", public.merge(admin))
}

/// Any storefront may embed the widget; no credentials are involved.
fn public_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT])
}

fn admin_cors(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid admin origin {origin:?}");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT])
}
