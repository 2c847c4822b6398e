//! Authentication endpoints

use crate::api::auth::schemas::{LoginRequest, Membership, User};
use crate::api::{ApiJson, AuthToken};
use crate::core::Error;
use crate::core::auth::{AUTH_COOKIE, Registration};
use crate::core::traits::AuthService;
use crate::infrastructure::config::AppConfig;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/me/tenants", get(my_tenants))
}

async fn register(
    Inject(auth_service): Inject<dyn AuthService>,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<(StatusCode, Json<User>), Error> {
    let user = auth_service.register(registration).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn login(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(config): Inject<AppConfig>,
    jar: CookieJar,
    ApiJson(credentials): ApiJson<LoginRequest>,
) -> Result<(CookieJar, Json<User>), Error> {
    let (user, token) = auth_service
        .login(&credentials.email, &credentials.password)
        .await?;

    let cookie = Cookie::build((AUTH_COOKIE, token))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Strict)
        .path("/");

    Ok((jar.add(cookie), Json(user.into())))
}

async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    (
        jar.remove(Cookie::build(AUTH_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

async fn me(
    Inject(auth_service): Inject<dyn AuthService>,
    AuthToken(token): AuthToken,
) -> Result<Json<User>, Error> {
    let user = auth_service.authenticate(&token).await?;
    Ok(Json(user.into()))
}

async fn my_tenants(
    Inject(auth_service): Inject<dyn AuthService>,
    AuthToken(token): AuthToken,
) -> Result<Json<Vec<Membership>>, Error> {
    let user = auth_service.authenticate(&token).await?;
    let memberships = auth_service.memberships(&user).await?;

    Ok(Json(memberships.into_iter().map(Membership::from).collect()))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::{Role, TenantRole};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug)]
    pub struct LoginRequest {
        #[serde(default)]
        pub email: String,
        #[serde(default)]
        pub password: String,
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct User {
        pub id: i64,
        pub email: String,
        pub role: Role,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        pub last_login_at: Option<DateTime<Utc>>,
    }

    impl From<entities::User> for User {
        fn from(user: entities::User) -> Self {
            User {
                id: user.id,
                email: user.email,
                role: user.role,
                first_name: user.first_name,
                last_name: user.last_name,
                is_active: user.is_active,
                created_at: user.created_at,
                last_login_at: user.last_login_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Membership {
        pub tenant_id: i64,
        pub tenant_name: String,
        pub tenant_slug: String,
        pub is_active: bool,
        pub role: TenantRole,
        pub joined_at: DateTime<Utc>,
    }

    impl From<entities::Membership> for Membership {
        fn from(membership: entities::Membership) -> Self {
            Membership {
                tenant_id: membership.tenant_id,
                tenant_name: membership.name,
                tenant_slug: membership.slug,
                is_active: membership.is_active,
                role: membership.role,
                joined_at: membership.joined_at,
            }
        }
    }
}
