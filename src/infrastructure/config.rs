//! Environment driven application configuration

use di::inject;
use di::injectable;
use log::warn;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEV_JWT_SECRET: &str = "feattie-development-secret-change-me-please-0123456789";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_address: String,
    pub public_base_url: String,
    pub admin_origins: Vec<String>,
    pub jwt: JwtConfig,
    pub secure_cookies: bool,
    pub rag_base_url: String,
    pub rag_timeout: Duration,
    pub default_llm_api_key: Option<String>,
    pub bootstrap_admin: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub expires_minutes: i64,
}

#[injectable]
impl AppConfig {
    #[inject]
    pub fn create() -> AppConfig {
        dotenvy::dotenv().ok();
        AppConfig::from_env()
    }
}

impl AppConfig {
    /// Reads every setting from the process environment, falling back to development defaults.
    pub fn from_env() -> AppConfig {
        let secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ => {
                warn!("JWT_SECRET is not set, using the development secret");
                DEV_JWT_SECRET.to_owned()
            }
        };

        let bootstrap_admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        AppConfig {
            database_url: var_or("DATABASE_URL", "sqlite://feattie.db?mode=rwc"),
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:3000"),
            public_base_url: var_or("PUBLIC_BASE_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_owned(),
            admin_origins: split_list(&var_or(
                "ADMIN_ORIGINS",
                "http://localhost:3000,http://localhost:5173",
            )),
            jwt: JwtConfig {
                secret,
                issuer: var_or("JWT_ISSUER", "feattie"),
                audience: var_or("JWT_AUDIENCE", "feattie-admin"),
                expires_minutes: parsed_or("JWT_EXPIRES_MINUTES", 60),
            },
            secure_cookies: parsed_or("SECURE_COOKIES", true),
            rag_base_url: var_or("RAG_BASE_URL", "http://localhost:8000")
                .trim_end_matches('/')
                .to_owned(),
            rag_timeout: Duration::from_secs(parsed_or("RAG_TIMEOUT_SECONDS", 30)),
            default_llm_api_key: env::var("DEFAULT_LLM_API_KEY")
                .ok()
                .filter(|key| !key.is_empty()),
            bootstrap_admin,
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn parsed_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring invalid value for {name}: {raw:?}");
            default
        }),
        Err(_) => default,
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}
