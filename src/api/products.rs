//! A tenant's synced catalogue and the sync/embedding triggers

use crate::api::products::schemas::{
    EmbeddingResult, GenerateEmbeddings, ListProducts, Product, ProductStats, Purged,
    SyncProducts, SyncResult,
};
use crate::api::{ApiJson, AuthToken};
use crate::core::Error;
use crate::core::tenants::Page;
use crate::core::traits::{AuthService, ProductService, TenantService};
use crate::infrastructure::entities::TenantRole;
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Json, Router};
use di_axum::Inject;

pub fn router() -> Router {
    Router::new()
        .route("/:id/products", get(list_products).delete(purge_products))
        .route("/:id/products/stats", get(product_stats))
        .route("/:id/products/sync", post(sync_products))
        .route("/:id/products/generate-embeddings", post(generate_embeddings))
}

async fn list_products(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(tenant_service): Inject<dyn TenantService>,
    Inject(product_service): Inject<dyn ProductService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    Query(query): Query<ListProducts>,
) -> Result<Json<Vec<Product>>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    let tenant = tenant_service.get(tenant_id).await?;
    let products = product_service
        .list(tenant_id, query.search, Page::new(query.page, query.page_size))
        .await?;

    Ok(Json(
        products
            .into_iter()
            .map(|product| Product::new(product, &tenant.store_url))
            .collect(),
    ))
}

async fn product_stats(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(product_service): Inject<dyn ProductService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<ProductStats>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Viewer)
        .await?;

    Ok(Json(product_service.stats(tenant_id).await?.into()))
}

async fn purge_products(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(product_service): Inject<dyn ProductService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
) -> Result<Json<Purged>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Admin)
        .await?;

    let deleted = product_service.purge(tenant_id).await?;
    Ok(Json(Purged { deleted }))
}

async fn sync_products(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(product_service): Inject<dyn ProductService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(request): ApiJson<SyncProducts>,
) -> Result<Json<SyncResult>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Admin)
        .await?;

    let summary = product_service.sync(tenant_id, request.force_resync).await?;
    Ok(Json(summary.into()))
}

async fn generate_embeddings(
    Inject(auth_service): Inject<dyn AuthService>,
    Inject(product_service): Inject<dyn ProductService>,
    AuthToken(token): AuthToken,
    Path(tenant_id): Path<i64>,
    ApiJson(request): ApiJson<GenerateEmbeddings>,
) -> Result<Json<EmbeddingResult>, Error> {
    auth_service
        .authorize_tenant(&token, tenant_id, TenantRole::Admin)
        .await?;

    let outcome = product_service
        .generate_embeddings(tenant_id, request.force_regenerate, request.batch_size)
        .await?;
    Ok(Json(outcome.into()))
}

pub mod schemas {
    use crate::core::links::product_url;
    use crate::core::products::SyncSummary;
    use crate::core::rag::EmbeddingOutcome;
    use crate::infrastructure::entities;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct ListProducts {
        pub search: Option<String>,
        pub page: Option<u32>,
        pub page_size: Option<u32>,
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct Product {
        pub id: i64,
        pub external_id: i64,
        pub title: String,
        pub vendor: String,
        pub product_type: String,
        pub price: f64,
        pub image_url: Option<String>,
        pub handle: Option<String>,
        pub url: Option<String>,
        pub has_embedding: bool,
        pub synced_at: Option<DateTime<Utc>>,
    }

    impl Product {
        pub fn new(product: entities::Product, store_url: &str) -> Product {
            let url = product_url(Some(store_url), product.handle.as_deref());
            Product {
                id: product.id,
                external_id: product.external_id,
                title: product.title,
                vendor: product.vendor,
                product_type: product.product_type,
                price: product.price,
                image_url: product.image_url,
                handle: product.handle,
                url,
                has_embedding: product.has_embedding,
                synced_at: product.synced_at,
            }
        }
    }

    #[derive(Serialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct ProductStats {
        pub total: i64,
        pub with_embeddings: i64,
        pub average_price: Option<f64>,
    }

    impl From<entities::ProductStats> for ProductStats {
        fn from(stats: entities::ProductStats) -> Self {
            ProductStats {
                total: stats.total,
                with_embeddings: stats.with_embeddings,
                average_price: stats.average_price,
            }
        }
    }

    #[derive(Serialize, Deserialize, Debug)]
    pub struct Purged {
        pub deleted: u64,
    }

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct SyncProducts {
        pub force_resync: bool,
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct SyncResult {
        pub total_products: i64,
        pub new_products: i64,
        pub updated_products: i64,
        pub failed_products: i64,
        pub product_count: i64,
        pub last_product_sync: Option<DateTime<Utc>>,
    }

    impl From<SyncSummary> for SyncResult {
        fn from(summary: SyncSummary) -> Self {
            SyncResult {
                total_products: summary.outcome.total_products,
                new_products: summary.outcome.new_products,
                updated_products: summary.outcome.updated_products,
                failed_products: summary.outcome.failed_products,
                product_count: summary.tenant.product_count,
                last_product_sync: summary.tenant.last_product_sync,
            }
        }
    }

    #[derive(Deserialize, Debug, Default)]
    #[serde(rename_all = "camelCase", default)]
    pub struct GenerateEmbeddings {
        pub force_regenerate: bool,
        pub batch_size: Option<u32>,
    }

    #[derive(Serialize, Deserialize, Debug)]
    #[serde(rename_all = "camelCase")]
    pub struct EmbeddingResult {
        pub total_products: i64,
        pub embeddings_generated: i64,
        pub failed_embeddings: i64,
        pub time_elapsed_seconds: f64,
    }

    impl From<EmbeddingOutcome> for EmbeddingResult {
        fn from(outcome: EmbeddingOutcome) -> Self {
            EmbeddingResult {
                total_products: outcome.total_products,
                embeddings_generated: outcome.embeddings_generated,
                failed_embeddings: outcome.failed_embeddings,
                time_elapsed_seconds: outcome.time_elapsed_seconds,
            }
        }
    }
}
