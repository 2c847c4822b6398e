//! Database and schema tests
//!
//! Tests SQLite migrations, entity storage, and the chat repository's tenant scoping

mod common;

use chrono::Utc;
use common::{cleanup_test_db, setup_test_db};
use di::{Injectable, ServiceCollection, ServiceProvider};
use feattie_chat_api::infrastructure::config::AppConfig;
use feattie_chat_api::infrastructure::database::DatabaseConnection;
use feattie_chat_api::infrastructure::entities::MessageKind;
use feattie_chat_api::infrastructure::repositories::{
    DbChatRepository, DbTenantRepository, is_unique_violation,
};
use feattie_chat_api::infrastructure::traits::{
    ChatRepository, NewMessage, NewTenant, TenantRepository, TurnRecord,
};
use serial_test::serial;
use sqlx::SqlitePool;

fn provider() -> ServiceProvider {
    ServiceCollection::new()
        .add(AppConfig::singleton())
        .add(DatabaseConnection::transient())
        .add(DbTenantRepository::scoped())
        .add(DbChatRepository::scoped())
        .build_provider()
        .unwrap()
}

async fn insert_tenant(pool: &SqlitePool, slug: &str) -> i64 {
    let now = Utc::now();
    let row: (i64,) = sqlx::query_as(
        "INSERT INTO tenants (name, slug, store_url, created_at, updated_at) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(slug)
    .bind(slug)
    .bind(format!("https://{slug}.test"))
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .unwrap();
    row.0
}

fn message(kind: MessageKind, content: &str) -> NewMessage {
    NewMessage {
        kind,
        content: content.to_owned(),
        product_ids: None,
        context_ids: None,
    }
}

fn turn(tenant_id: i64, session_key: &str, messages: Vec<NewMessage>) -> TurnRecord {
    TurnRecord {
        tenant_id,
        session_key: session_key.to_owned(),
        user_fingerprint: None,
        messages,
    }
}

#[tokio::test]
async fn test_database_migrations_work() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    let tables: Vec<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
    let tables: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();

    for expected in [
        "chat_messages",
        "chat_sessions",
        "contexts",
        "products",
        "rag_configurations",
        "tenant_settings",
        "tenant_users",
        "tenants",
        "users",
    ] {
        assert!(tables.contains(&expected), "missing table {expected}");
    }
}

#[tokio::test]
async fn test_duplicate_slug_is_a_unique_violation() {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    sqlx::migrate!().run(&pool).await.unwrap();

    insert_tenant(&pool, "acme").await;
    let now = Utc::now();
    let err = sqlx::query(
        "INSERT INTO tenants (name, slug, store_url, created_at, updated_at) VALUES ('x', 'acme', 'https://x.test', ?, ?)",
    )
    .bind(now)
    .bind(now)
    .execute(&pool)
    .await
    .unwrap_err();

    assert!(is_unique_violation(&err));
}

#[tokio::test]
#[serial]
async fn test_create_tenant_writes_default_rag_configuration() {
    let pool = setup_test_db().await;
    let provider = provider();
    let tenants = provider.get_required::<dyn TenantRepository>();

    let tenant = tenants
        .create_tenant(
            NewTenant {
                name: "Acme".to_owned(),
                slug: "acme".to_owned(),
                store_url: "https://acme.test".to_owned(),
                access_token: None,
                max_products: 100,
            },
            Some("sk-default".to_owned()),
        )
        .await
        .unwrap();

    let row: (i64, Option<String>, i64) = sqlx::query_as(
        "SELECT tenant_id, llm_api_key, enable_conversation_history FROM rag_configurations",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(row, (tenant.id, Some("sk-default".to_owned()), 1));

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_record_turn_creates_session_and_counts_messages() {
    let pool = setup_test_db().await;
    let tenant_id = insert_tenant(&pool, "acme").await;
    let provider = provider();
    let chats = provider.get_required::<dyn ChatRepository>();

    let session = chats
        .record_turn(turn(
            tenant_id,
            "session-1",
            vec![
                message(MessageKind::User, "hello"),
                NewMessage {
                    product_ids: Some(vec![3, 1]),
                    context_ids: Some(vec![]),
                    ..message(MessageKind::Bot, "hi there")
                },
            ],
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.message_count, 2);
    assert_eq!(session.tenant_id, tenant_id);
    assert!(session.ended_at.is_some());

    let session = chats
        .record_turn(turn(
            tenant_id,
            "session-1",
            vec![message(MessageKind::User, "anyone?")],
        ))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.message_count, 3);

    let messages = chats.list_messages(session.id).await.unwrap();
    let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["hello", "hi there", "anyone?"]);
    assert_eq!(messages[1].kind, MessageKind::Bot);
    assert_eq!(
        messages[1].product_ids.as_ref().map(|ids| ids.0.clone()),
        Some(vec![3, 1])
    );

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_record_turn_refuses_foreign_session_key() {
    let pool = setup_test_db().await;
    let acme = insert_tenant(&pool, "acme").await;
    let other = insert_tenant(&pool, "other").await;
    let provider = provider();
    let chats = provider.get_required::<dyn ChatRepository>();

    chats
        .record_turn(turn(acme, "shared-key", vec![message(MessageKind::User, "mine")]))
        .await
        .unwrap();

    let result = chats
        .record_turn(turn(other, "shared-key", vec![message(MessageKind::User, "theirs")]))
        .await
        .unwrap();
    assert!(result.is_none());

    // the failed turn was rolled back entirely
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 1);

    let session = chats.find_session("shared-key").await.unwrap().unwrap();
    assert_eq!(session.tenant_id, acme);
    assert_eq!(session.message_count, 1);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_recent_messages_keeps_newest_oldest_first() {
    let pool = setup_test_db().await;
    let tenant_id = insert_tenant(&pool, "acme").await;
    let provider = provider();
    let chats = provider.get_required::<dyn ChatRepository>();

    let mut session = None;
    for i in 1..=5 {
        session = Some(
            chats
                .record_turn(turn(
                    tenant_id,
                    "long-session",
                    vec![message(MessageKind::User, &format!("message {i}"))],
                ))
                .await
                .unwrap()
                .unwrap(),
        );
    }
    let session = session.unwrap();

    let recent = chats.recent_messages(session.id, 3).await.unwrap();
    let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["message 3", "message 4", "message 5"]);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_tenant_delete_cascades_to_chat_rows() {
    let pool = setup_test_db().await;
    let tenant_id = insert_tenant(&pool, "acme").await;
    let provider = provider();
    let chats = provider.get_required::<dyn ChatRepository>();
    let tenants = provider.get_required::<dyn TenantRepository>();

    chats
        .record_turn(turn(tenant_id, "doomed", vec![message(MessageKind::User, "bye")]))
        .await
        .unwrap();

    assert!(tenants.delete_tenant(tenant_id).await.unwrap());
    assert!(chats.find_session("doomed").await.unwrap().is_none());

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM chat_messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count.0, 0);

    cleanup_test_db();
}

#[tokio::test]
#[serial]
async fn test_record_product_sync_stamps_and_recounts() {
    let pool = setup_test_db().await;
    let tenant_id = insert_tenant(&pool, "acme").await;
    let other = insert_tenant(&pool, "other").await;
    let now = Utc::now();
    for (tenant, external_id) in [(tenant_id, 1), (tenant_id, 2), (other, 3)] {
        sqlx::query(
            "INSERT INTO products (tenant_id, external_id, title, created_at, updated_at) VALUES (?, ?, 'p', ?, ?)",
        )
        .bind(tenant)
        .bind(external_id)
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();
    }
    let provider = provider();
    let tenants = provider.get_required::<dyn TenantRepository>();

    let tenant = tenants.record_product_sync(tenant_id).await.unwrap().unwrap();
    assert_eq!(tenant.product_count, 2);
    assert!(tenant.last_product_sync.is_some());

    assert!(tenants.record_product_sync(999_999).await.unwrap().is_none());

    cleanup_test_db();
}
