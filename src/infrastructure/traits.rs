//! Infrastructure traits, used for DI on higher levels

use crate::infrastructure::entities;
use crate::infrastructure::entities::{MessageKind, Role, TenantRole};
use async_trait::async_trait;

pub type StoreResult<T> = Result<T, sqlx::Error>;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub slug: String,
    pub store_url: String,
    pub access_token: Option<String>,
    pub max_products: i64,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub kind: MessageKind,
    pub content: String,
    pub product_ids: Option<Vec<i64>>,
    pub context_ids: Option<Vec<i64>>,
}

/// Everything one chat turn writes, applied atomically.
#[derive(Debug, Clone)]
pub struct TurnRecord {
    pub tenant_id: i64,
    pub session_key: String,
    pub user_fingerprint: Option<String>,
    pub messages: Vec<NewMessage>,
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, user_id: i64) -> StoreResult<Option<entities::User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<entities::User>>;
    async fn create_user(&self, user: NewUser) -> StoreResult<entities::User>;
    async fn record_login(&self, user_id: i64) -> StoreResult<()>;
    async fn list_users(&self) -> StoreResult<Vec<entities::User>>;
    async fn set_role(&self, user_id: i64, role: Role) -> StoreResult<Option<entities::User>>;
    async fn any_admin(&self) -> StoreResult<bool>;

    /// Lists the tenants a user belongs to together with the granted role.
    async fn memberships(&self, user_id: i64) -> StoreResult<Vec<entities::Membership>>;

    async fn membership_role(&self, user_id: i64, tenant_id: i64)
    -> StoreResult<Option<TenantRole>>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn list_tenants(
        &self,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<entities::Tenant>>;

    async fn find_tenant(&self, tenant_id: i64) -> StoreResult<Option<entities::Tenant>>;

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<entities::Tenant>>;

    /// Inserts the tenant and its default RAG configuration in one transaction.
    async fn create_tenant(
        &self,
        tenant: NewTenant,
        default_llm_api_key: Option<String>,
    ) -> StoreResult<entities::Tenant>;

    async fn update_tenant(&self, tenant: &entities::Tenant) -> StoreResult<entities::Tenant>;

    async fn delete_tenant(&self, tenant_id: i64) -> StoreResult<bool>;

    /// Stamps a completed catalogue sync and recounts the tenant's products.
    async fn record_product_sync(&self, tenant_id: i64) -> StoreResult<Option<entities::Tenant>>;

    async fn list_members(&self, tenant_id: i64) -> StoreResult<Vec<entities::TenantMember>>;

    async fn add_member(&self, tenant_id: i64, user_id: i64, role: TenantRole)
    -> StoreResult<()>;

    async fn remove_member(&self, tenant_id: i64, user_id: i64) -> StoreResult<bool>;

    async fn tenant_stats(&self, tenant_id: i64) -> StoreResult<entities::TenantStats>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn list_products(
        &self,
        tenant_id: i64,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<entities::Product>>;

    /// Loads the given products, silently skipping ids owned by other tenants.
    async fn find_products(
        &self,
        tenant_id: i64,
        product_ids: &[i64],
    ) -> StoreResult<Vec<entities::Product>>;

    async fn product_stats(&self, tenant_id: i64) -> StoreResult<entities::ProductStats>;

    async fn delete_products(&self, tenant_id: i64) -> StoreResult<u64>;
}

#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn find_settings(&self, tenant_id: i64) -> StoreResult<Option<entities::TenantSettings>>;

    async fn save_settings(
        &self,
        settings: &entities::TenantSettings,
    ) -> StoreResult<entities::TenantSettings>;

    async fn find_rag_config(
        &self,
        tenant_id: i64,
    ) -> StoreResult<Option<entities::RagConfiguration>>;

    async fn save_rag_config(
        &self,
        config: &entities::RagConfiguration,
    ) -> StoreResult<entities::RagConfiguration>;
}

#[async_trait]
pub trait ContextRepository: Send + Sync {
    async fn list_contexts(
        &self,
        tenant_id: i64,
        active_only: bool,
    ) -> StoreResult<Vec<entities::Context>>;

    async fn find_context(
        &self,
        tenant_id: i64,
        context_id: i64,
    ) -> StoreResult<Option<entities::Context>>;

    async fn create_context(&self, context: &entities::Context) -> StoreResult<entities::Context>;

    async fn update_context(&self, context: &entities::Context) -> StoreResult<entities::Context>;

    async fn delete_context(&self, tenant_id: i64, context_id: i64) -> StoreResult<bool>;
}

#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Looks a session up by its opaque key, regardless of tenant.
    async fn find_session(&self, session_key: &str) -> StoreResult<Option<entities::ChatSession>>;

    /// Returns the newest `limit` messages of a session, oldest first.
    async fn recent_messages(
        &self,
        session_id: i64,
        limit: i64,
    ) -> StoreResult<Vec<entities::Message>>;

    async fn list_messages(&self, session_id: i64) -> StoreResult<Vec<entities::Message>>;

    /// Creates the session if needed, appends the messages and bumps the message count.
    ///
    /// Returns `None` and writes nothing when the session key belongs to another tenant.
    async fn record_turn(&self, turn: TurnRecord) -> StoreResult<Option<entities::ChatSession>>;
}
