//! User administration endpoints, global admins only

use crate::api::auth::schemas::User;
use crate::api::users::schemas::RoleChange;
use crate::api::{ApiJson, AuthToken};
use crate::core::Error;
use crate::core::traits::AuthService;
use axum::extract::Path;
use axum::routing::{get, put};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/:id/role", put(set_role))
}

async fn list_users(
    Inject(auth_service): Inject<dyn AuthService>,
    AuthToken(token): AuthToken,
) -> Result<Json<Vec<User>>, Error> {
    auth_service.require_admin(&token).await?;
    let users = auth_service.list_users().await?;

    Ok(Json(users.into_iter().map(User::from).collect()))
}

async fn set_role(
    Inject(auth_service): Inject<dyn AuthService>,
    AuthToken(token): AuthToken,
    Path(user_id): Path<i64>,
    ApiJson(change): ApiJson<RoleChange>,
) -> Result<Json<User>, Error> {
    let admin = auth_service.require_admin(&token).await?;
    let user = auth_service.set_role(&admin, user_id, change.role).await?;

    Ok(Json(user.into()))
}

pub mod schemas {
    use crate::infrastructure::entities::Role;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    pub struct RoleChange {
        pub role: Role,
    }
}
