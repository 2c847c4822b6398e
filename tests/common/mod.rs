//! Shared helpers for the integration tests
//!
//! Tests are serialized because they share a global test pool.
//!
//! The `more-di` DI framework doesn't support injecting custom pools. We work around this by
//! using `DatabaseConnection::set_test_pool()` to set a global pool that the DI-created
//! DatabaseConnection will use.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use di::{Injectable, Ref, ServiceCollection, existing_as_self, inject, injectable};
use di_axum::RouterServiceProviderExtensions;
use feattie_chat_api::api;
use feattie_chat_api::core::auth::MyAuthService;
use feattie_chat_api::core::chat::MyChatService;
use feattie_chat_api::core::contexts::MyContextService;
use feattie_chat_api::core::products::MyProductService;
use feattie_chat_api::core::rag::{
    EmbeddingOutcome, EmbeddingRequest, RagAnswer, RagError, RagRequest, RagService,
    ScoredProduct, SyncOutcome, SyncRequest,
};
use feattie_chat_api::core::settings::MySettingsService;
use feattie_chat_api::core::tenants::MyTenantService;
use feattie_chat_api::infrastructure::config::AppConfig;
use feattie_chat_api::infrastructure::database::DatabaseConnection;
use feattie_chat_api::infrastructure::entities::{ChatSession, Message};
use feattie_chat_api::infrastructure::repositories::{
    DbChatRepository, DbContextRepository, DbProductRepository, DbSettingsRepository,
    DbTenantRepository, DbUserRepository,
};
use feattie_chat_api::infrastructure::traits::{ChatRepository, StoreResult, TurnRecord};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery";

/// Counter for unique test database URIs
static TEST_DB_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Requests the fake RAG service received, oldest first.
pub static RAG_CALLS: Mutex<Vec<RagRequest>> = Mutex::new(Vec::new());

/// Ranking the fake RAG service answers with.
pub static RAG_PRODUCTS: Mutex<Vec<ScoredProduct>> = Mutex::new(Vec::new());

/// Catalogue sync requests the fake RAG service received.
pub static SYNC_CALLS: Mutex<Vec<SyncRequest>> = Mutex::new(Vec::new());

/// Embedding requests the fake RAG service received.
pub static EMBEDDING_CALLS: Mutex<Vec<EmbeddingRequest>> = Mutex::new(Vec::new());

/// Setup test database with migrations and returns pool
/// Uses in-memory SQLite for test isolation
pub async fn setup_test_db() -> SqlitePool {
    let db_num = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    // Use file URI format with shared cache - each test gets a unique DB
    let db_url = format!("sqlite:file:testdb{}?mode=memory&cache=shared", db_num);

    let pool = SqlitePool::connect(&db_url).await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    // Set this pool as the global test pool so DI uses it
    DatabaseConnection::set_test_pool(pool.clone());

    RAG_CALLS.lock().unwrap().clear();
    RAG_PRODUCTS.lock().unwrap().clear();
    SYNC_CALLS.lock().unwrap().clear();
    EMBEDDING_CALLS.lock().unwrap().clear();

    pool
}

/// Clean up after test
pub fn cleanup_test_db() {
    DatabaseConnection::clear_test_pool();
}

/// Answers every query and records what it was asked.
pub struct FakeRag;

#[injectable(RagService)]
impl FakeRag {
    #[inject]
    pub fn create() -> FakeRag {
        FakeRag
    }
}

#[async_trait]
impl RagService for FakeRag {
    async fn chat(&self, request: &RagRequest) -> Result<RagAnswer, RagError> {
        RAG_CALLS.lock().unwrap().push(request.clone());

        Ok(RagAnswer {
            response: format!("Here is what I found for {}", request.query),
            products: RAG_PRODUCTS.lock().unwrap().clone(),
            search_query: None,
            tokens_used: Some(42),
        })
    }

    async fn sync_products(&self, request: &SyncRequest) -> Result<SyncOutcome, RagError> {
        SYNC_CALLS.lock().unwrap().push(request.clone());

        Ok(SyncOutcome {
            total_products: 3,
            new_products: 2,
            updated_products: 1,
            failed_products: 0,
        })
    }

    async fn generate_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingOutcome, RagError> {
        EMBEDDING_CALLS.lock().unwrap().push(request.clone());

        Ok(EmbeddingOutcome {
            total_products: 3,
            embeddings_generated: 3,
            failed_embeddings: 0,
            time_elapsed_seconds: 0.5,
        })
    }
}

/// Simulates an unreachable upstream.
pub struct FailingRag;

#[injectable(RagService)]
impl FailingRag {
    #[inject]
    pub fn create() -> FailingRag {
        FailingRag
    }
}

#[async_trait]
impl RagService for FailingRag {
    async fn chat(&self, request: &RagRequest) -> Result<RagAnswer, RagError> {
        RAG_CALLS.lock().unwrap().push(request.clone());
        Err(RagError::Status(503))
    }

    async fn sync_products(&self, request: &SyncRequest) -> Result<SyncOutcome, RagError> {
        SYNC_CALLS.lock().unwrap().push(request.clone());
        Err(RagError::Status(503))
    }

    async fn generate_embeddings(
        &self,
        request: &EmbeddingRequest,
    ) -> Result<EmbeddingOutcome, RagError> {
        EMBEDDING_CALLS.lock().unwrap().push(request.clone());
        Err(RagError::Status(503))
    }
}

/// Chat store whose session lookups always miss, as when another tenant claims a key between
/// the lookup and the write.
pub struct LaggingSessionLookup {
    inner: DbChatRepository,
}

#[injectable(ChatRepository)]
impl LaggingSessionLookup {
    #[inject]
    pub fn create(connection: Ref<DatabaseConnection>) -> LaggingSessionLookup {
        LaggingSessionLookup {
            inner: DbChatRepository::new(connection),
        }
    }
}

#[async_trait]
impl ChatRepository for LaggingSessionLookup {
    async fn find_session(&self, _session_key: &str) -> StoreResult<Option<ChatSession>> {
        Ok(None)
    }

    async fn recent_messages(&self, session_id: i64, limit: i64) -> StoreResult<Vec<Message>> {
        self.inner.recent_messages(session_id, limit).await
    }

    async fn list_messages(&self, session_id: i64) -> StoreResult<Vec<Message>> {
        self.inner.list_messages(session_id).await
    }

    async fn record_turn(&self, turn: TurnRecord) -> StoreResult<Option<ChatSession>> {
        self.inner.record_turn(turn).await
    }
}

fn services() -> ServiceCollection {
    let mut services = ServiceCollection::new();
    services
        .add(AppConfig::singleton())
        .add(DatabaseConnection::transient())
        .add(DbUserRepository::scoped())
        .add(DbTenantRepository::scoped())
        .add(DbProductRepository::scoped())
        .add(DbSettingsRepository::scoped())
        .add(DbContextRepository::scoped())
        .add(DbChatRepository::scoped())
        .add(MyAuthService::scoped())
        .add(MyTenantService::scoped())
        .add(MyProductService::scoped())
        .add(MySettingsService::scoped())
        .add(MyContextService::scoped())
        .add(MyChatService::scoped());
    services
}

/// Create test app - uses the global test pool set by setup_test_db()
pub fn create_test_app() -> axum::Router {
    let provider = services().add(FakeRag::singleton()).build_provider().unwrap();
    api::router(&AppConfig::from_env()).with_provider(provider)
}

/// Same as [`create_test_app`] with `config` in place of the environment's configuration.
pub fn create_test_app_with_config(config: AppConfig) -> axum::Router {
    let provider = services()
        .add(FakeRag::singleton())
        .add(existing_as_self(config.clone()))
        .build_provider()
        .unwrap();
    api::router(&config).with_provider(provider)
}

/// Same as [`create_test_app`] with session lookups that never see the stored session.
pub fn create_lagging_session_app() -> axum::Router {
    let provider = services()
        .add(FakeRag::singleton())
        .add(LaggingSessionLookup::scoped())
        .build_provider()
        .unwrap();
    api::router(&AppConfig::from_env()).with_provider(provider)
}

/// Same as [`create_test_app`] with an upstream that always fails.
pub fn create_failing_app() -> axum::Router {
    let provider = services()
        .add(FailingRag::singleton())
        .build_provider()
        .unwrap();
    api::router(&AppConfig::from_env()).with_provider(provider)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub json: Value,
}

pub async fn call(
    app: &axum::Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .map(|value| value.to_str().unwrap().to_owned());

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    TestResponse {
        status,
        set_cookie,
        json,
    }
}

pub async fn register(app: &axum::Router, email: &str) -> i64 {
    let response = call(
        app,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);
    response.json["id"].as_i64().unwrap()
}

/// Logs in and returns the `name=value` pair to send back as `Cookie`.
pub async fn login(app: &axum::Router, email: &str) -> String {
    let response = call(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK, "{}", response.json);

    let set_cookie = response.set_cookie.expect("login sets the auth cookie");
    set_cookie.split(';').next().unwrap().to_owned()
}

/// Registers a user, promotes them to global admin and returns their cookie.
pub async fn admin_cookie(app: &axum::Router, pool: &SqlitePool) -> String {
    let user_id = register(app, "admin@example.com").await;
    sqlx::query("UPDATE users SET role = 1 WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .unwrap();
    login(app, "admin@example.com").await
}

pub async fn create_tenant(app: &axum::Router, admin: &str, slug: &str) -> i64 {
    let response = call(
        app,
        Method::POST,
        "/api/tenants",
        Some(admin),
        Some(json!({
            "name": format!("{slug} store"),
            "slug": slug,
            "storeUrl": format!("https://{slug}.myshopify.com"),
            "accessToken": "shpat_secret_token",
        })),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);
    response.json["id"].as_i64().unwrap()
}

pub async fn seed_product(
    pool: &SqlitePool,
    tenant_id: i64,
    external_id: i64,
    title: &str,
    price: f64,
    handle: &str,
) -> i64 {
    let now = Utc::now();
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO products (tenant_id, external_id, title, vendor, product_type, price, image_url, handle, has_embedding, created_at, updated_at)
         VALUES (?, ?, ?, 'Acme', 'Shoes', ?, NULL, ?, 1, ?, ?)
         RETURNING id",
    )
    .bind(tenant_id)
    .bind(external_id)
    .bind(title)
    .bind(price)
    .bind(handle)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

pub async fn count(pool: &SqlitePool, sql: &str) -> i64 {
    let row: (i64,) = sqlx::query_as(sql).fetch_one(pool).await.unwrap();
    row.0
}
