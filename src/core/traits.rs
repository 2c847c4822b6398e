//! DI "Interfaces"

use crate::core::auth::Registration;
use crate::core::chat::{ChatReply, ChatRequest, SessionHistory};
use crate::core::contexts::ContextDraft;
use crate::core::products::SyncSummary;
use crate::core::rag::EmbeddingOutcome;
use crate::core::error::Result;
use crate::core::settings::{EmbedCode, RagConfigUpdate, SettingsUpdate};
use crate::core::tenants::{Page, TenantDraft, TenantPatch};
use crate::infrastructure::entities;
use crate::infrastructure::entities::{Role, TenantRole};
use crate::widget::config::ServerWidgetConfig;
use async_trait::async_trait;

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, registration: Registration) -> Result<entities::User>;

    /// Verifies the credentials and returns the user together with a freshly signed token.
    async fn login(&self, email: &str, password: &str) -> Result<(entities::User, String)>;

    /// Resolves a token to the active user it was issued for.
    async fn authenticate(&self, token: &str) -> Result<entities::User>;

    /// Like [`AuthService::authenticate`], additionally requiring the global `Admin` role.
    async fn require_admin(&self, token: &str) -> Result<entities::User>;

    /// Authenticates and checks that the user holds at least `required` on the tenant.
    ///
    /// Returns `Forbidden` for authenticated users lacking the role, regardless of whether the
    /// tenant exists.
    async fn authorize_tenant(
        &self,
        token: &str,
        tenant_id: i64,
        required: TenantRole,
    ) -> Result<entities::User>;

    async fn memberships(&self, user: &entities::User) -> Result<Vec<entities::Membership>>;

    async fn list_users(&self) -> Result<Vec<entities::User>>;

    async fn set_role(
        &self,
        acting: &entities::User,
        user_id: i64,
        role: Role,
    ) -> Result<entities::User>;

    /// Makes sure at least one global admin exists, creating or promoting `email`.
    async fn ensure_admin(&self, email: &str, password: &str) -> Result<()>;
}

#[async_trait]
pub trait TenantService: Send + Sync {
    async fn list(&self, is_active: Option<bool>, page: Page) -> Result<Vec<entities::Tenant>>;
    async fn get(&self, tenant_id: i64) -> Result<entities::Tenant>;
    async fn get_by_slug(&self, slug: &str) -> Result<entities::Tenant>;
    async fn create(&self, draft: TenantDraft) -> Result<entities::Tenant>;
    async fn update(&self, tenant_id: i64, patch: TenantPatch) -> Result<entities::Tenant>;

    /// Deactivates the tenant, or removes it with everything it owns when `permanent`.
    async fn delete(&self, tenant_id: i64, permanent: bool) -> Result<()>;

    async fn members(&self, tenant_id: i64) -> Result<Vec<entities::TenantMember>>;
    async fn add_member(&self, tenant_id: i64, user_id: i64, role: TenantRole) -> Result<()>;
    async fn remove_member(&self, tenant_id: i64, user_id: i64) -> Result<()>;
    async fn stats(&self, tenant_id: i64) -> Result<entities::TenantStats>;
}

#[async_trait]
pub trait ProductService: Send + Sync {
    async fn list(
        &self,
        tenant_id: i64,
        search: Option<String>,
        page: Page,
    ) -> Result<Vec<entities::Product>>;

    async fn stats(&self, tenant_id: i64) -> Result<entities::ProductStats>;

    /// Removes the tenant's whole catalogue and returns how many products were deleted.
    async fn purge(&self, tenant_id: i64) -> Result<u64>;

    /// Has the catalogue service pull the tenant's products from the store, then stamps the
    /// tenant's last sync.
    async fn sync(&self, tenant_id: i64, force_resync: bool) -> Result<SyncSummary>;

    async fn generate_embeddings(
        &self,
        tenant_id: i64,
        force_regenerate: bool,
        batch_size: Option<u32>,
    ) -> Result<EmbeddingOutcome>;
}

#[async_trait]
pub trait SettingsService: Send + Sync {
    /// Stored settings, or the defaults when the tenant never saved any. Never writes.
    async fn settings(&self, tenant_id: i64) -> Result<entities::TenantSettings>;

    async fn update_settings(
        &self,
        tenant_id: i64,
        update: SettingsUpdate,
    ) -> Result<entities::TenantSettings>;

    async fn embed_code(&self, tenant_id: i64) -> Result<EmbedCode>;

    /// Public presentation settings of an active tenant. Never writes.
    async fn widget_config(&self, slug: &str) -> Result<ServerWidgetConfig>;

    async fn rag_config(&self, tenant_id: i64) -> Result<entities::RagConfiguration>;

    async fn update_rag_config(
        &self,
        tenant_id: i64,
        update: RagConfigUpdate,
    ) -> Result<entities::RagConfiguration>;
}

#[async_trait]
pub trait ContextService: Send + Sync {
    async fn list(&self, tenant_id: i64) -> Result<Vec<entities::Context>>;
    async fn get(&self, tenant_id: i64, context_id: i64) -> Result<entities::Context>;
    async fn create(&self, tenant_id: i64, draft: ContextDraft) -> Result<entities::Context>;

    async fn update(
        &self,
        tenant_id: i64,
        context_id: i64,
        draft: ContextDraft,
    ) -> Result<entities::Context>;

    async fn delete(&self, tenant_id: i64, context_id: i64) -> Result<()>;

    /// The contexts the chat gateway would inject for `query`.
    async fn matching(&self, tenant_id: i64, query: &str) -> Result<Vec<entities::Context>>;
}

#[async_trait]
pub trait ChatService: Send + Sync {
    /// Runs one chat turn for an anonymous visitor.
    ///
    /// Upstream failures never surface as errors; the reply then carries an apology instead.
    async fn send(&self, tenant_id: i64, request: ChatRequest) -> Result<ChatReply>;

    /// A session with its messages, oldest first. The session must belong to the tenant.
    async fn history(&self, tenant_id: i64, session_id: &str) -> Result<SessionHistory>;
}
