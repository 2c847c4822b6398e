//! DB Repository abstractions

use crate::infrastructure::database::DatabaseConnection;
use crate::infrastructure::entities::{
    ChatSession, Context, Membership, Message, Product, ProductStats, RagConfiguration, Role,
    Tenant, TenantMember, TenantRole, TenantSettings, TenantStats, User,
};
use crate::infrastructure::traits::{
    ChatRepository, ContextRepository, NewTenant, NewUser, ProductRepository,
    SettingsRepository, StoreResult, TenantRepository, TurnRecord, UserRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use log::error;
use sqlx::types::Json;
use sqlx::{Executor, QueryBuilder, Sqlite};

/// True when the error was caused by a UNIQUE or PRIMARY KEY constraint.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    error
        .as_database_error()
        .is_some_and(|e| e.is_unique_violation())
}

#[injectable(UserRepository)]
pub struct DbUserRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl UserRepository for DbUserRepository {
    async fn find_by_id(&self, user_id: i64) -> StoreResult<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        sqlx::query_as(
            "INSERT INTO users (email, password_hash, role, first_name, last_name, is_active, created_at) VALUES (?, ?, ?, ?, ?, 1, ?) RETURNING *",
        )
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.role)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(Utc::now())
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn record_login(&self, user_id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(user_id)
            .execute(&**self.connection)
            .await
            .map(|_| ())
            .inspect_err(|e| error!("{e}"))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        sqlx::query_as("SELECT * FROM users ORDER BY datetime(created_at) DESC, id DESC")
            .fetch_all(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn set_role(&self, user_id: i64, role: Role) -> StoreResult<Option<User>> {
        sqlx::query_as("UPDATE users SET role = ? WHERE id = ? RETURNING *")
            .bind(role)
            .bind(user_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn any_admin(&self) -> StoreResult<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE role = ?)")
            .bind(Role::Admin)
            .fetch_one(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn memberships(&self, user_id: i64) -> StoreResult<Vec<Membership>> {
        sqlx::query_as(
            "SELECT tenants.id AS tenant_id, tenants.name, tenants.slug, tenants.is_active, tenant_users.role, tenant_users.joined_at FROM tenant_users INNER JOIN tenants ON tenants.id = tenant_users.tenant_id WHERE tenant_users.user_id = ? ORDER BY tenants.name ASC",
        )
        .bind(user_id)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn membership_role(&self, user_id: i64, tenant_id: i64) -> StoreResult<Option<TenantRole>> {
        sqlx::query_scalar("SELECT role FROM tenant_users WHERE user_id = ? AND tenant_id = ?")
            .bind(user_id)
            .bind(tenant_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }
}

#[injectable(TenantRepository)]
pub struct DbTenantRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbTenantRepository {
    async fn insert_tenant_with_config(
        &self,
        tenant: NewTenant,
        default_llm_api_key: Option<String>,
    ) -> StoreResult<Tenant> {
        let mut tx = self.connection.begin().await?;
        let now = Utc::now();

        let tenant: Tenant = sqlx::query_as(
            "INSERT INTO tenants (name, slug, store_url, access_token, is_active, max_products, product_count, created_at, updated_at) VALUES (?, ?, ?, ?, 1, ?, 0, ?, ?) RETURNING *",
        )
        .bind(tenant.name)
        .bind(tenant.slug)
        .bind(tenant.store_url)
        .bind(tenant.access_token)
        .bind(tenant.max_products)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        upsert_rag_config(
            &mut *tx,
            &RagConfiguration::defaults_for(&tenant, default_llm_api_key),
        )
        .await?;

        tx.commit().await?;
        Ok(tenant)
    }
}

#[async_trait]
impl TenantRepository for DbTenantRepository {
    async fn list_tenants(
        &self,
        is_active: Option<bool>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Tenant>> {
        sqlx::query_as(
            "SELECT * FROM tenants WHERE (? IS NULL OR is_active = ?) ORDER BY datetime(created_at) DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(is_active)
        .bind(is_active)
        .bind(limit)
        .bind(offset)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn find_tenant(&self, tenant_id: i64) -> StoreResult<Option<Tenant>> {
        sqlx::query_as("SELECT * FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn find_tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        sqlx::query_as("SELECT * FROM tenants WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn create_tenant(
        &self,
        tenant: NewTenant,
        default_llm_api_key: Option<String>,
    ) -> StoreResult<Tenant> {
        self.insert_tenant_with_config(tenant, default_llm_api_key)
            .await
            .inspect_err(|e| error!("failed to create tenant: {e}"))
    }

    async fn update_tenant(&self, tenant: &Tenant) -> StoreResult<Tenant> {
        sqlx::query_as(
            "UPDATE tenants SET name = ?, store_url = ?, access_token = ?, is_active = ?, max_products = ?, updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(&tenant.name)
        .bind(&tenant.store_url)
        .bind(&tenant.access_token)
        .bind(tenant.is_active)
        .bind(tenant.max_products)
        .bind(Utc::now())
        .bind(tenant.id)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn delete_tenant(&self, tenant_id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(tenant_id)
            .execute(&**self.connection)
            .await
            .map(|result| result.rows_affected() > 0)
            .inspect_err(|e| error!("{e}"))
    }

    async fn record_product_sync(&self, tenant_id: i64) -> StoreResult<Option<Tenant>> {
        let now = Utc::now();
        sqlx::query_as(
            "UPDATE tenants SET last_product_sync = ?, product_count = (SELECT COUNT(*) FROM products WHERE products.tenant_id = tenants.id), updated_at = ? WHERE id = ? RETURNING *",
        )
        .bind(now)
        .bind(now)
        .bind(tenant_id)
        .fetch_optional(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn list_members(&self, tenant_id: i64) -> StoreResult<Vec<TenantMember>> {
        sqlx::query_as(
            "SELECT tenant_users.tenant_id, tenant_users.user_id, users.email, users.first_name, users.last_name, tenant_users.role, tenant_users.joined_at FROM tenant_users INNER JOIN users ON users.id = tenant_users.user_id WHERE tenant_users.tenant_id = ? ORDER BY datetime(tenant_users.joined_at) ASC",
        )
        .bind(tenant_id)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn add_member(&self, tenant_id: i64, user_id: i64, role: TenantRole) -> StoreResult<()> {
        sqlx::query("INSERT INTO tenant_users (tenant_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)")
            .bind(tenant_id)
            .bind(user_id)
            .bind(role)
            .bind(Utc::now())
            .execute(&**self.connection)
            .await
            .map(|_| ())
            .inspect_err(|e| {
                if !is_unique_violation(e) {
                    error!("{e}")
                }
            })
    }

    async fn remove_member(&self, tenant_id: i64, user_id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM tenant_users WHERE tenant_id = ? AND user_id = ?")
            .bind(tenant_id)
            .bind(user_id)
            .execute(&**self.connection)
            .await
            .map(|result| result.rows_affected() > 0)
            .inspect_err(|e| error!("{e}"))
    }

    async fn tenant_stats(&self, tenant_id: i64) -> StoreResult<TenantStats> {
        sqlx::query_as(
            r#"SELECT
                (SELECT COUNT(*) FROM products WHERE tenant_id = ?1) AS product_count,
                (SELECT COUNT(*) FROM products WHERE tenant_id = ?1 AND has_embedding = 1) AS products_with_embeddings,
                (SELECT COUNT(*) FROM contexts WHERE tenant_id = ?1) AS context_count,
                (SELECT COUNT(*) FROM contexts WHERE tenant_id = ?1 AND is_active = 1) AS active_contexts,
                (SELECT COUNT(*) FROM tenant_users WHERE tenant_id = ?1) AS user_count,
                (SELECT COUNT(*) FROM chat_sessions WHERE tenant_id = ?1) AS chat_session_count,
                (SELECT COUNT(*) FROM chat_messages INNER JOIN chat_sessions ON chat_sessions.id = chat_messages.session_id WHERE chat_sessions.tenant_id = ?1) AS total_messages,
                EXISTS (SELECT 1 FROM rag_configurations WHERE tenant_id = ?1) AS has_rag_configuration"#,
        )
        .bind(tenant_id)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }
}

#[injectable(ProductRepository)]
pub struct DbProductRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbProductRepository {
    async fn purge(&self, tenant_id: i64) -> StoreResult<u64> {
        let mut tx = self.connection.begin().await?;

        let deleted = sqlx::query("DELETE FROM products WHERE tenant_id = ?")
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("UPDATE tenants SET product_count = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(tenant_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(deleted)
    }
}

#[async_trait]
impl ProductRepository for DbProductRepository {
    async fn list_products(
        &self,
        tenant_id: i64,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Product>> {
        sqlx::query_as(
            "SELECT * FROM products WHERE tenant_id = ? AND (? IS NULL OR title LIKE '%' || ? || '%') ORDER BY title ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(tenant_id)
        .bind(search)
        .bind(search)
        .bind(limit)
        .bind(offset)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn find_products(&self, tenant_id: i64, product_ids: &[i64]) -> StoreResult<Vec<Product>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM products WHERE tenant_id = ");
        builder.push_bind(tenant_id);
        builder.push(" AND id IN (");
        let mut ids = builder.separated(", ");
        for id in product_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        builder
            .build_query_as::<Product>()
            .fetch_all(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn product_stats(&self, tenant_id: i64) -> StoreResult<ProductStats> {
        sqlx::query_as(
            "SELECT COUNT(*) AS total, COALESCE(SUM(has_embedding), 0) AS with_embeddings, AVG(price) AS average_price FROM products WHERE tenant_id = ?",
        )
        .bind(tenant_id)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn delete_products(&self, tenant_id: i64) -> StoreResult<u64> {
        self.purge(tenant_id)
            .await
            .inspect_err(|e| error!("failed to delete products of tenant {tenant_id}: {e}"))
    }
}

#[injectable(SettingsRepository)]
pub struct DbSettingsRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl SettingsRepository for DbSettingsRepository {
    async fn find_settings(&self, tenant_id: i64) -> StoreResult<Option<TenantSettings>> {
        sqlx::query_as("SELECT * FROM tenant_settings WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn save_settings(&self, settings: &TenantSettings) -> StoreResult<TenantSettings> {
        sqlx::query_as(
            r#"INSERT INTO tenant_settings (tenant_id, brand_color_primary, brand_color_secondary, widget_position, chat_title, welcome_message, logo_url, avatar_url, auto_open, auto_open_delay_seconds, show_typing_indicator, enable_sound_notifications, allowed_domains, widget_size, language, timezone, custom_css, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (tenant_id) DO UPDATE SET
                brand_color_primary = excluded.brand_color_primary,
                brand_color_secondary = excluded.brand_color_secondary,
                widget_position = excluded.widget_position,
                chat_title = excluded.chat_title,
                welcome_message = excluded.welcome_message,
                logo_url = excluded.logo_url,
                avatar_url = excluded.avatar_url,
                auto_open = excluded.auto_open,
                auto_open_delay_seconds = excluded.auto_open_delay_seconds,
                show_typing_indicator = excluded.show_typing_indicator,
                enable_sound_notifications = excluded.enable_sound_notifications,
                allowed_domains = excluded.allowed_domains,
                widget_size = excluded.widget_size,
                language = excluded.language,
                timezone = excluded.timezone,
                custom_css = excluded.custom_css,
                updated_at = excluded.updated_at
            RETURNING *"#,
        )
        .bind(settings.tenant_id)
        .bind(&settings.brand_color_primary)
        .bind(&settings.brand_color_secondary)
        .bind(settings.widget_position)
        .bind(&settings.chat_title)
        .bind(&settings.welcome_message)
        .bind(&settings.logo_url)
        .bind(&settings.avatar_url)
        .bind(settings.auto_open)
        .bind(settings.auto_open_delay_seconds)
        .bind(settings.show_typing_indicator)
        .bind(settings.enable_sound_notifications)
        .bind(settings.allowed_domains.clone())
        .bind(settings.widget_size)
        .bind(&settings.language)
        .bind(&settings.timezone)
        .bind(&settings.custom_css)
        .bind(settings.created_at)
        .bind(Utc::now())
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn find_rag_config(&self, tenant_id: i64) -> StoreResult<Option<RagConfiguration>> {
        sqlx::query_as("SELECT * FROM rag_configurations WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn save_rag_config(&self, config: &RagConfiguration) -> StoreResult<RagConfiguration> {
        upsert_rag_config(&**self.connection, config)
            .await
            .inspect_err(|e| error!("{e}"))
    }
}

async fn upsert_rag_config<'e, E>(executor: E, config: &RagConfiguration) -> StoreResult<RagConfiguration>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as(
        r#"INSERT INTO rag_configurations (tenant_id, embedding_provider, embedding_model, openai_api_key, llm_provider, llm_model, llm_api_key, temperature, max_tokens, default_top_k, deduplicate_results, min_similarity, language, system_prompt, enable_context_injection, enable_conversation_history, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (tenant_id) DO UPDATE SET
            embedding_provider = excluded.embedding_provider,
            embedding_model = excluded.embedding_model,
            openai_api_key = excluded.openai_api_key,
            llm_provider = excluded.llm_provider,
            llm_model = excluded.llm_model,
            llm_api_key = excluded.llm_api_key,
            temperature = excluded.temperature,
            max_tokens = excluded.max_tokens,
            default_top_k = excluded.default_top_k,
            deduplicate_results = excluded.deduplicate_results,
            min_similarity = excluded.min_similarity,
            language = excluded.language,
            system_prompt = excluded.system_prompt,
            enable_context_injection = excluded.enable_context_injection,
            enable_conversation_history = excluded.enable_conversation_history,
            updated_at = excluded.updated_at
        RETURNING *"#,
    )
    .bind(config.tenant_id)
    .bind(config.embedding_provider)
    .bind(&config.embedding_model)
    .bind(&config.openai_api_key)
    .bind(config.llm_provider)
    .bind(&config.llm_model)
    .bind(&config.llm_api_key)
    .bind(config.temperature)
    .bind(config.max_tokens)
    .bind(config.default_top_k)
    .bind(config.deduplicate_results)
    .bind(config.min_similarity)
    .bind(&config.language)
    .bind(&config.system_prompt)
    .bind(config.enable_context_injection)
    .bind(config.enable_conversation_history)
    .bind(config.created_at)
    .bind(Utc::now())
    .fetch_one(executor)
    .await
}

#[injectable(ContextRepository)]
pub struct DbContextRepository {
    connection: Ref<DatabaseConnection>,
}

#[async_trait]
impl ContextRepository for DbContextRepository {
    async fn list_contexts(&self, tenant_id: i64, active_only: bool) -> StoreResult<Vec<Context>> {
        sqlx::query_as(
            "SELECT * FROM contexts WHERE tenant_id = ? AND (? = 0 OR is_active = 1) ORDER BY priority DESC, id ASC",
        )
        .bind(tenant_id)
        .bind(active_only)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn find_context(&self, tenant_id: i64, context_id: i64) -> StoreResult<Option<Context>> {
        sqlx::query_as("SELECT * FROM contexts WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(context_id)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn create_context(&self, context: &Context) -> StoreResult<Context> {
        sqlx::query_as(
            "INSERT INTO contexts (tenant_id, title, slug, content, kind, trigger_keywords, always_include, priority, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING *",
        )
        .bind(context.tenant_id)
        .bind(&context.title)
        .bind(&context.slug)
        .bind(&context.content)
        .bind(context.kind)
        .bind(context.trigger_keywords.clone())
        .bind(context.always_include)
        .bind(context.priority)
        .bind(context.is_active)
        .bind(context.created_at)
        .bind(context.updated_at)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| {
            if !is_unique_violation(e) {
                error!("{e}")
            }
        })
    }

    async fn update_context(&self, context: &Context) -> StoreResult<Context> {
        sqlx::query_as(
            "UPDATE contexts SET title = ?, slug = ?, content = ?, kind = ?, trigger_keywords = ?, always_include = ?, priority = ?, is_active = ?, updated_at = ? WHERE tenant_id = ? AND id = ? RETURNING *",
        )
        .bind(&context.title)
        .bind(&context.slug)
        .bind(&context.content)
        .bind(context.kind)
        .bind(context.trigger_keywords.clone())
        .bind(context.always_include)
        .bind(context.priority)
        .bind(context.is_active)
        .bind(Utc::now())
        .bind(context.tenant_id)
        .bind(context.id)
        .fetch_one(&**self.connection)
        .await
        .inspect_err(|e| {
            if !is_unique_violation(e) {
                error!("{e}")
            }
        })
    }

    async fn delete_context(&self, tenant_id: i64, context_id: i64) -> StoreResult<bool> {
        sqlx::query("DELETE FROM contexts WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(context_id)
            .execute(&**self.connection)
            .await
            .map(|result| result.rows_affected() > 0)
            .inspect_err(|e| error!("{e}"))
    }
}

#[injectable(ChatRepository)]
pub struct DbChatRepository {
    connection: Ref<DatabaseConnection>,
}

impl DbChatRepository {
    pub fn new(connection: Ref<DatabaseConnection>) -> DbChatRepository {
        DbChatRepository { connection }
    }

    async fn write_turn(&self, turn: TurnRecord) -> StoreResult<Option<ChatSession>> {
        let mut tx = self.connection.begin().await?;
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO chat_sessions (tenant_id, session_key, user_fingerprint, started_at, message_count) VALUES (?, ?, ?, ?, 0) ON CONFLICT (session_key) DO NOTHING",
        )
        .bind(turn.tenant_id)
        .bind(&turn.session_key)
        .bind(&turn.user_fingerprint)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        // A key that already belongs to another tenant must never be appended to.
        let session: Option<ChatSession> =
            sqlx::query_as("SELECT * FROM chat_sessions WHERE session_key = ? AND tenant_id = ?")
                .bind(&turn.session_key)
                .bind(turn.tenant_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(session) = session else {
            tx.rollback().await?;
            return Ok(None);
        };

        for message in &turn.messages {
            sqlx::query(
                "INSERT INTO chat_messages (session_id, kind, content, product_ids, context_ids, created_at) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(session.id)
            .bind(message.kind)
            .bind(&message.content)
            .bind(message.product_ids.clone().map(Json))
            .bind(message.context_ids.clone().map(Json))
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        let session = sqlx::query_as(
            "UPDATE chat_sessions SET message_count = message_count + ?, ended_at = ? WHERE id = ? RETURNING *",
        )
        .bind(turn.messages.len() as i64)
        .bind(now)
        .bind(session.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(session))
    }
}

#[async_trait]
impl ChatRepository for DbChatRepository {
    async fn find_session(&self, session_key: &str) -> StoreResult<Option<ChatSession>> {
        sqlx::query_as("SELECT * FROM chat_sessions WHERE session_key = ?")
            .bind(session_key)
            .fetch_optional(&**self.connection)
            .await
            .inspect_err(|e| error!("{e}"))
    }

    async fn recent_messages(&self, session_id: i64, limit: i64) -> StoreResult<Vec<Message>> {
        sqlx::query_as(
            "SELECT * FROM (SELECT * FROM chat_messages WHERE session_id = ? ORDER BY datetime(created_at) DESC, id DESC LIMIT ?) ORDER BY datetime(created_at) ASC, id ASC",
        )
        .bind(session_id)
        .bind(limit)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn list_messages(&self, session_id: i64) -> StoreResult<Vec<Message>> {
        sqlx::query_as(
            "SELECT * FROM chat_messages WHERE session_id = ? ORDER BY datetime(created_at) ASC, id ASC",
        )
        .bind(session_id)
        .fetch_all(&**self.connection)
        .await
        .inspect_err(|e| error!("{e}"))
    }

    async fn record_turn(&self, turn: TurnRecord) -> StoreResult<Option<ChatSession>> {
        let tenant_id = turn.tenant_id;
        self.write_turn(turn)
            .await
            .inspect_err(|e| error!("failed to record chat turn for tenant {tenant_id}: {e}"))
    }
}
