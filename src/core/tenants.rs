//! Tenant administration

use crate::core::error::{Error, Result};
use crate::core::traits::TenantService;
use crate::core::validation;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{Tenant, TenantMember, TenantRole, TenantStats};
use crate::infrastructure::repositories::is_unique_violation;
use crate::infrastructure::traits::{NewTenant, TenantRepository, UserRepository};
use async_trait::async_trait;
use di::{Ref, injectable};
use log::info;
use serde::Deserialize;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;
const DEFAULT_MAX_PRODUCTS: i64 = 1000;

/// One-based page request, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Page {
        Page {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(None, None)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub store_url: String,
    pub access_token: Option<String>,
    pub max_products: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantPatch {
    pub name: Option<String>,
    pub store_url: Option<String>,
    /// An empty string removes the stored token.
    pub access_token: Option<String>,
    pub is_active: Option<bool>,
    pub max_products: Option<i64>,
}

#[injectable(TenantService)]
pub struct MyTenantService {
    tenants: Ref<dyn TenantRepository>,
    users: Ref<dyn UserRepository>,
    config: Ref<AppConfig>,
}

impl MyTenantService {
    async fn existing(&self, tenant_id: i64) -> Result<Tenant> {
        self.tenants
            .find_tenant(tenant_id)
            .await?
            .ok_or(Error::NotFound("tenant"))
    }
}

#[async_trait]
impl TenantService for MyTenantService {
    async fn list(&self, is_active: Option<bool>, page: Page) -> Result<Vec<Tenant>> {
        Ok(self
            .tenants
            .list_tenants(is_active, page.limit(), page.offset())
            .await?)
    }

    async fn get(&self, tenant_id: i64) -> Result<Tenant> {
        self.existing(tenant_id).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Tenant> {
        self.tenants
            .find_tenant_by_slug(slug)
            .await?
            .ok_or(Error::NotFound("tenant"))
    }

    async fn create(&self, draft: TenantDraft) -> Result<Tenant> {
        let access_token = match draft.access_token {
            Some(token) => validation::optional_text("accessToken", &token, 512)?,
            None => None,
        };

        let new_tenant = NewTenant {
            name: validation::required_text("name", &draft.name, 200)?,
            slug: validation::slug("slug", &draft.slug)?,
            store_url: validation::http_url("storeUrl", &draft.store_url)?,
            access_token,
            max_products: validation::in_range(
                "maxProducts",
                draft.max_products.unwrap_or(DEFAULT_MAX_PRODUCTS),
                1,
                1_000_000,
            )?,
        };

        if self
            .tenants
            .find_tenant_by_slug(&new_tenant.slug)
            .await?
            .is_some()
        {
            return Err(Error::Conflict(format!(
                "slug {:?} is already in use",
                new_tenant.slug
            )));
        }

        let slug = new_tenant.slug.clone();
        let tenant = self
            .tenants
            .create_tenant(new_tenant, self.config.default_llm_api_key.clone())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict(format!("slug {slug:?} is already in use"))
                } else {
                    Error::from(e)
                }
            })?;

        info!("created tenant {} ({})", tenant.id, tenant.slug);
        Ok(tenant)
    }

    async fn update(&self, tenant_id: i64, patch: TenantPatch) -> Result<Tenant> {
        let mut tenant = self.existing(tenant_id).await?;

        if let Some(name) = patch.name {
            tenant.name = validation::required_text("name", &name, 200)?;
        }
        if let Some(store_url) = patch.store_url {
            tenant.store_url = validation::http_url("storeUrl", &store_url)?;
        }
        if let Some(access_token) = patch.access_token {
            tenant.access_token = validation::optional_text("accessToken", &access_token, 512)?;
        }
        if let Some(is_active) = patch.is_active {
            tenant.is_active = is_active;
        }
        if let Some(max_products) = patch.max_products {
            tenant.max_products = validation::in_range("maxProducts", max_products, 1, 1_000_000)?;
        }

        Ok(self.tenants.update_tenant(&tenant).await?)
    }

    async fn delete(&self, tenant_id: i64, permanent: bool) -> Result<()> {
        let mut tenant = self.existing(tenant_id).await?;

        if permanent {
            self.tenants.delete_tenant(tenant.id).await?;
            info!("permanently deleted tenant {tenant_id}");
        } else {
            tenant.is_active = false;
            self.tenants.update_tenant(&tenant).await?;
            info!("deactivated tenant {tenant_id}");
        }

        Ok(())
    }

    async fn members(&self, tenant_id: i64) -> Result<Vec<TenantMember>> {
        self.existing(tenant_id).await?;
        Ok(self.tenants.list_members(tenant_id).await?)
    }

    async fn add_member(&self, tenant_id: i64, user_id: i64, role: TenantRole) -> Result<()> {
        self.existing(tenant_id).await?;
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(Error::NotFound("user"))?;

        self.tenants
            .add_member(tenant_id, user_id, role)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict("user is already a member of this tenant".to_owned())
                } else {
                    Error::from(e)
                }
            })
    }

    async fn remove_member(&self, tenant_id: i64, user_id: i64) -> Result<()> {
        if self.tenants.remove_member(tenant_id, user_id).await? {
            Ok(())
        } else {
            Err(Error::NotFound("membership"))
        }
    }

    async fn stats(&self, tenant_id: i64) -> Result<TenantStats> {
        self.existing(tenant_id).await?;
        Ok(self.tenants.tenant_stats(tenant_id).await?)
    }
}
