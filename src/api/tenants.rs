//! Tenant administration endpoints

use crate::api::tenants::schemas::{
    AddMember, DeleteOptions, ListTenants, Member, Tenant, TenantStats,
};
use crate::api::{ApiJson, AuthToken, contexts, products, settings};
use crate::core::{Error, policy};
use crate::core::tenants::{Page, TenantDraft, TenantPatch};
use crate::core::traits::{AuthService, TenantService};
use crate::infrastructure::entities::TenantRole;
use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_tenants).post(create_tenant))
        .route("/by-slug/:slug", get(tenant_by_slug))
        .route(
            "/:id",
            get(get_tenant).put(update_tenant).delete(delete_tenant),
        )
        .route("/:id/users", get(list_members).post(add_member))
        .route("/:id/users/:user_id", delete(remove_member))
        .route("/:id/stats", get(tenant_stats))
        .merge(settings::router())
        .merge(contexts::router())
        .merge(products::router())
}

async fn list_tenants(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Query(query): Query<ListTenants>,
) -> Result<Json<Vec<Tenant>>, Error> {
    auth_service.require_admin(&token).await?;

    let tenants = tenant_service
        .list(query.is_active, Page::new(query.page, query.page_size))
        .await?;

    Ok(Json(tenants.into_iter().map(Tenant::from).collect()))
}

async fn create_tenant(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    ApiJson(draft): ApiJson<TenantDraft>,
) -> Result<(StatusCode, Json<Tenant>), Error> {
    auth_service.require_admin(&token).await?;
    let tenant = tenant_service.create(draft).await?;

    Ok((StatusCode::CREATED, Json(tenant.into())))
}

async fn get_tenant(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Tenant>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(tenant_service.get(tenant_id).await?.into()))
}

async fn tenant_by_slug(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(slug): Path<String>,
) -> Result<Json<Tenant>, Error> {
    let user = auth_service.authenticate(&token).await?;

    // only global admins learn whether a slug exists
    let tenant = match tenant_service.get_by_slug(&slug).await {
        Err(Error::NotFound(_)) if !policy::is_global_admin(user.role) => {
            return Err(Error::Forbidden);
        }
        result => result?,
    };
    auth_service
        .authorize_tenant(&token, tenant.id, TenantRole::Viewer)
        .await?;

    Ok(Json(tenant.into()))
}

async fn update_tenant(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(patch): ApiJson<TenantPatch>,
) -> Result<Json<Tenant>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Admin)
        .await?;

    Ok(Json(tenant_service.update(tenant_id, patch).await?.into()))
}

async fn delete_tenant(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    Query(options): Query<DeleteOptions>,
) -> Result<StatusCode, Error> {
    auth_service.require_admin(&token).await?;
    tenant_service.delete(tenant_id, options.permanent).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_members(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Vec<Member>>, Error> {
    auth_service.require_admin(&token).await?;
    let members = tenant_service.members(tenant_id).await?;

    Ok(Json(members.into_iter().map(Member::from).collect()))
}

async fn add_member(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(member): ApiJson<AddMember>,
) -> Result<StatusCode, Error> {
    auth_service.require_admin(&token).await?;
    tenant_service
        .add_member(tenant_id, member.user_id, member.role)
        .await?;

    Ok(StatusCode::CREATED)
}

async fn remove_member(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path((tenant_id, user_id)): Path<(i64, i64)>,
) -> Result<StatusCode, Error> {
    auth_service.require_admin(&token).await?;
    tenant_service.remove_member(tenant_id, user_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn tenant_stats(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<TenantStats>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(tenant_service.stats(tenant_id).await?.into()))
}

pub mod schemas {
    use crate::infrastructure::entities;
    use crate::infrastructure::entities::TenantRole;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ListTenants {
        pub is_active: Option<bool>,
        pub page: Option<u32>,
        pub page_size: Option<u32>,
    }

    #[derive(Deserialize, Debug, Default)]
    pub struct DeleteOptions {
        #[serde(default)]
        pub permanent: bool,
    }

    /// A tenant as shown to the dashboard. The store access token is write-only.
    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Tenant {
        pub id: i64,
        pub name: String,
        pub slug: String,
        pub store_url: String,
        pub has_access_token: bool,
        pub is_active: bool,
        pub max_products: i64,
        pub product_count: i64,
        pub last_product_sync: Option<DateTime<Utc>>,
        pub created_at: DateTime<Utc>,
        pub updated_at: DateTime<Utc>,
    }

    impl From<entities::Tenant> for Tenant {
        fn from(tenant: entities::Tenant) -> Self {
            Tenant {
                id: tenant.id,
                name: tenant.name,
                slug: tenant.slug,
                store_url: tenant.store_url,
                has_access_token: tenant.access_token.is_some(),
                is_active: tenant.is_active,
                max_products: tenant.max_products,
                product_count: tenant.product_count,
                last_product_sync: tenant.last_product_sync,
                created_at: tenant.created_at,
                updated_at: tenant.updated_at,
            }
        }
    }

    #[derive(Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct AddMember {
        pub user_id: i64,
        pub role: TenantRole,
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Member {
        pub user_id: i64,
        pub email: String,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub role: TenantRole,
        pub joined_at: DateTime<Utc>,
    }

    impl From<entities::TenantMember> for Member {
        fn from(member: entities::TenantMember) -> Self {
            Member {
                user_id: member.user_id,
                email: member.email,
                first_name: member.first_name,
                last_name: member.last_name,
                role: member.role,
                joined_at: member.joined_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct TenantStats {
        pub product_count: i64,
        pub products_with_embeddings: i64,
        pub context_count: i64,
        pub active_contexts: i64,
        pub user_count: i64,
        pub chat_session_count: i64,
        pub total_messages: i64,
        pub has_rag_configuration: bool,
    }

    impl From<entities::TenantStats> for TenantStats {
        fn from(stats: entities::TenantStats) -> Self {
            TenantStats {
                product_count: stats.product_count,
                products_with_embeddings: stats.products_with_embeddings,
                context_count: stats.context_count,
                active_contexts: stats.active_contexts,
                user_count: stats.user_count,
                chat_session_count: stats.chat_session_count,
                total_messages: stats.total_messages,
                has_rag_configuration: stats.has_rag_configuration,
            }
        }
    }
}
