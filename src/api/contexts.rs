//! Business contexts injected into chat prompts

use crate::api::contexts::schemas::{Context, MatchRequest};
use crate::api::{ApiJson, AuthToken};
use crate::core::Error;
use crate::core::contexts::ContextDraft;
use crate::core::traits::{AuthService, ContextService};
use crate::infrastructure::entities::TenantRole;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/:id/contexts", get(list_contexts).post(create_context))
        .route("/:id/contexts/match", post(match_contexts))
        .route(
            "/:id/contexts/:context_id",
            get(get_context).put(update_context).delete(delete_context),
        )
}

async fn list_contexts(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Vec<Context>>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    let contexts = context_service.list(tenant_id).await?;
    Ok(Json(contexts.into_iter().map(Context::from).collect()))
}

async fn create_context(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(draft): ApiJson<ContextDraft>,
) -> Result<(StatusCode, Json<Context>), Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Editor)
        .await?;

    let context = context_service.create(tenant_id, draft).await?;
    Ok((StatusCode::CREATED, Json(context.into())))
}

async fn get_context(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path((tenant_id, context_id)): Path<(i64, i64)>,
) -> Result<Json<Context>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(context_service.get(tenant_id, context_id).await?.into()))
}

async fn update_context(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path((tenant_id, context_id)): Path<(i64, i64)>,
    ApiJson(draft): ApiJson<ContextDraft>,
) -> Result<Json<Context>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Editor)
        .await?;

    let context = context_service.update(tenant_id, context_id, draft).await?;
    Ok(Json(context.into()))
}

async fn delete_context(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path((tenant_id, context_id)): Path<(i64, i64)>,
) -> Result<StatusCode, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Editor)
        .await?;

    context_service.delete(tenant_id, context_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn match_contexts(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(context_service): Inject<dyn ContextService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(request): ApiJson<MatchRequest>,
) -> Result<Json<Vec<Context>>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    let contexts = context_service.matching(tenant_id, &request.query).await?;
    Ok(Json(contexts.into_iter().map(Context::from).collect()))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::ContextKind;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Context {
        pub id: i64,
        pub tenant_id: i64,
        pub title: String,
        pub slug: String,
        pub content: String,
        pub kind: ContextKind,
        pub trigger_keywords: Vec<String>,
        pub always_include: bool,
        pub priority: i64,
        pub is_active: bool,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Context> for Context {
        fn from(context: entities::Context) -> Self {
            Context {
                id: context.id,
                tenant_id: context.tenant_id,
                title: context.title,
                slug: context.slug,
                content: context.content,
                kind: context.kind,
                trigger_keywords: context.trigger_keywords.0,
                always_include: context.always_include,
                priority: context.priority,
                is_active: context.is_active,
                created_at: context.created_at,
                updated_at: context.updated_at,
            }
        }
    }

    #[derive(Deserialize, Debug)]
    pub struct MatchRequest {
        #[serde(default)]
        pub query: String,
    }
}
