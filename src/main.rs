//! Multi-tenant shopping assistant gateway

use feattie_chat_api::api;
use feattie_chat_api::core::auth::MyAuthService;
use feattie_chat_api::core::chat::MyChatService;
use feattie_chat_api::core::contexts::MyContextService;
use feattie_chat_api::core::products::MyProductService;
use feattie_chat_api::core::rag::HttpRagService;
use feattie_chat_api::core::settings::MySettingsService;
use feattie_chat_api::core::tenants::MyTenantService;
use feattie_chat_api::core::traits::AuthService;
use feattie_chat_api::infrastructure::config::AppConfig;
use feattie_chat_api::infrastructure::database::DatabaseConnection;
use feattie_chat_api::infrastructure::repositories::{
    DbChatRepository, DbContextRepository, DbProductRepository, DbSettingsRepository,
    DbTenantRepository, DbUserRepository,
};

use anyhow::anyhow;
use di::{Injectable, ServiceCollection, ServiceProvider};
use di_axum::RouterServiceProviderExtensions;
use log::{info, warn};
use tokio::runtime::{Builder, Runtime};

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(web_server_task())
}

fn service_provider() -> anyhow::Result<ServiceProvider> {
    ServiceCollection::new()
        .add(AppConfig::singleton())
        .add(DatabaseConnection::singleton())
        .add(DbUserRepository::scoped())
        .add(DbTenantRepository::scoped())
        .add(DbProductRepository::scoped())
        .add(DbSettingsRepository::scoped())
        .add(DbContextRepository::scoped())
        .add(DbChatRepository::scoped())
        .add(HttpRagService::singleton())
        .add(MyAuthService::scoped())
        .add(MyTenantService::scoped())
        .add(MyProductService::scoped())
        .add(MySettingsService::scoped())
        .add(MyContextService::scoped())
        .add(MyChatService::scoped())
        .build_provider()
        .map_err(|e| anyhow!("invalid service registrations: {e:?}"))
}

async fn web_server_task() -> anyhow::Result<()> {
    let provider = service_provider()?;
    let config = provider.get_required::<AppConfig>();

    let database = provider.get_required::<DatabaseConnection>();
    sqlx::migrate!().run(&**database).await?;
    info!("database migrations applied");

    match &config.bootstrap_admin {
        Some((email, password)) => provider
            .get_required::<dyn AuthService>()
            .ensure_admin(email, password)
            .await
            .map_err(|e| anyhow!("failed to bootstrap admin account: {e}"))?,
        None => warn!("ADMIN_EMAIL/ADMIN_PASSWORD not set, no admin account is bootstrapped"),
    }

    let app = api::router(&config).with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    info!("Shutting down...");

    Ok(())
}
