//! The tenant's product catalogue
//!
//! Reads come straight from the database. Syncing from the store and embedding are done by
//! the external catalogue service; this side only triggers them and records the outcome.

use crate::core::error::{Error, Result};
use crate::core::rag::{EmbeddingOutcome, EmbeddingRequest, RagService, SyncOutcome, SyncRequest};
use crate::core::tenants::Page;
use crate::core::traits::{ProductService, SettingsService};
use crate::core::validation;
use crate::infrastructure::entities::{Product, ProductStats, Tenant};
use crate::infrastructure::traits::{ProductRepository, TenantRepository};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::{error, info};

pub const DEFAULT_EMBEDDING_BATCH: u32 = 32;
const MAX_EMBEDDING_BATCH: u32 = 256;

/// Result of a completed sync together with the tenant's refreshed catalogue figures.
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub outcome: SyncOutcome,
    pub tenant: Tenant,
}

#[injectable(ProductService)]
pub struct MyProductService {
    products: Ref<dyn ProductRepository>,
    tenants: Ref<dyn TenantRepository>,
    settings: Ref<dyn SettingsService>,
    rag: Ref<dyn RagService>,
}

impl MyProductService {
    async fn existing(&self, tenant_id: i64) -> Result<Tenant> {
        self.tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or(Error::NotFound("tenant"))
    }
}

#[async_trait]
impl ProductService for MyProductService {
    async fn list(&self, tenant_id: i64, search: Option<String>, page: Page) -> Result<Vec<Product>> {
        self.existing(tenant_id).await?;

        let search = search.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty());
        Ok(self
            .products
            .list_products(tenant_id, search.as_deref(), page.limit(), page.offset())
            .await?)
    }

    async fn stats(&self, tenant_id: i64) -> Result<ProductStats> {
        self.existing(tenant_id).await?;
        Ok(self.products.product_stats(tenant_id).await?)
    }

    async fn purge(&self, tenant_id: i64) -> Result<u64> {
        self.existing(tenant_id).await?;

        let deleted = self.products.delete_products(tenant_id).await?;
        info!("deleted {deleted} products of tenant {tenant_id}");
        Ok(deleted)
    }

    async fn sync(&self, tenant_id: i64, force_resync: bool) -> Result<SyncSummary> {
        let tenant = self.existing(tenant_id).await?;
        let Some(access_token) = tenant.access_token.clone() else {
            return Err(Error::bad_request("tenant has no store access token"));
        };

        info!("starting product sync for tenant {tenant_id}");
        let request = SyncRequest {
            tenant_id,
            store_url: tenant.store_url.clone(),
            access_token,
            max_products: tenant.max_products,
            force_resync,
        };

        let outcome = self.rag.sync_products(&request).await.map_err(|e| {
            error!("tenant {tenant_id}: product sync failed: {e}");
            Error::Upstream("product sync")
        })?;

        let tenant = self
            .tenants
            .record_product_sync(tenant_id)
            .await?
            .ok_or(Error::NotFound("tenant"))?;

        info!(
            "tenant {tenant_id}: synced {} products ({} new, {} updated, {} failed)",
            outcome.total_products,
            outcome.new_products,
            outcome.updated_products,
            outcome.failed_products
        );
        Ok(SyncSummary { outcome, tenant })
    }

    async fn generate_embeddings(
        &self,
        tenant_id: i64,
        force_regenerate: bool,
        batch_size: Option<u32>,
    ) -> Result<EmbeddingOutcome> {
        let batch_size = validation::in_range(
            "batchSize",
            batch_size.unwrap_or(DEFAULT_EMBEDDING_BATCH),
            1,
            MAX_EMBEDDING_BATCH,
        )?;
        let config = self.settings.rag_config(tenant_id).await?;

        info!("starting embedding generation for tenant {tenant_id}");
        let request = EmbeddingRequest::new(&config, force_regenerate, batch_size);

        let outcome = self.rag.generate_embeddings(&request).await.map_err(|e| {
            error!("tenant {tenant_id}: embedding generation failed: {e}");
            Error::Upstream("embedding generation")
        })?;

        info!(
            "tenant {tenant_id}: {} embeddings generated, {} failed in {:.1}s",
            outcome.embeddings_generated, outcome.failed_embeddings, outcome.time_elapsed_seconds
        );
        Ok(outcome)
    }
}
