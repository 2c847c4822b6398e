//! Cookie token authentication and user administration

use crate::core::error::{Error, Result};
use crate::core::policy;
use crate::core::traits::AuthService;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::entities::{Membership, Role, TenantRole, User};
use crate::infrastructure::repositories::is_unique_violation;
use crate::infrastructure::traits::{NewUser, UserRepository};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use chrono::Utc;
use di::{Ref, injectable};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

/// Name of the cookie carrying the session token.
pub const AUTH_COOKIE: &str = "jwt";

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[injectable(AuthService)]
pub struct MyAuthService {
    users: Ref<dyn UserRepository>,
    config: Ref<AppConfig>,
}

impl MyAuthService {
    fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            iss: self.config.jwt.issuer.clone(),
            aud: self.config.jwt.audience.clone(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::minutes(self.config.jwt.expires_minutes)).timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt.secret.as_bytes()),
        )
        .map_err(|e| {
            error!("failed to sign token: {e}");
            Error::Internal("failed to sign token".to_owned())
        })
    }

    fn decode_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt.issuer]);
        validation.set_audience(&[&self.config.jwt.audience]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| {
            debug!("rejected token: {e}");
            Error::Unauthenticated
        })
    }
}

#[async_trait]
impl AuthService for MyAuthService {
    async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email)?;
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(Error::bad_request(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(Error::Conflict("email is already registered".to_owned()));
        }

        let password_hash = hash_password(registration.password).await?;
        let user = self
            .users
            .create_user(NewUser {
                email,
                password_hash,
                role: Role::User,
                first_name: trimmed(registration.first_name),
                last_name: trimmed(registration.last_name),
            })
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    Error::Conflict("email is already registered".to_owned())
                } else {
                    Error::from(e)
                }
            })?;

        info!("registered user {}", user.id);
        Ok(user)
    }

    async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let invalid = || Error::Unauthorized("invalid email or password".to_owned());

        let email = email.trim().to_lowercase();
        let user = self.users.find_by_email(&email).await?.ok_or_else(invalid)?;

        if !verify_password(password.to_owned(), user.password_hash.clone()).await {
            return Err(invalid());
        }
        if !user.is_active {
            return Err(Error::Unauthorized("account is disabled".to_owned()));
        }

        self.users.record_login(user.id).await?;
        let token = self.issue_token(&user)?;

        info!("user {} logged in", user.id);
        Ok((user, token))
    }

    async fn authenticate(&self, token: &str) -> Result<User> {
        let claims = self.decode_token(token)?;
        let user_id: i64 = claims.sub.parse().map_err(|_| Error::Unauthenticated)?;

        match self.users.find_by_id(user_id).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(Error::Unauthenticated),
        }
    }

    async fn require_admin(&self, token: &str) -> Result<User> {
        let user = self.authenticate(token).await?;
        if policy::is_global_admin(user.role) {
            Ok(user)
        } else {
            Err(Error::Forbidden)
        }
    }

    async fn authorize_tenant(&self, token: &str, tenant_id: i64, required: TenantRole) -> Result<User> {
        let user = self.authenticate(token).await?;
        if policy::is_global_admin(user.role) {
            return Ok(user);
        }

        let membership = self.users.membership_role(user.id, tenant_id).await?;
        if policy::can_access_tenant(user.role, membership, required) {
            Ok(user)
        } else {
            Err(Error::Forbidden)
        }
    }

    async fn memberships(&self, user: &User) -> Result<Vec<Membership>> {
        Ok(self.users.memberships(user.id).await?)
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.users.list_users().await?)
    }

    async fn set_role(&self, acting: &User, user_id: i64, role: Role) -> Result<User> {
        if acting.id == user_id && role != Role::Admin {
            return Err(Error::bad_request("administrators cannot revoke their own role"));
        }

        let user = self
            .users
            .set_role(user_id, role)
            .await?
            .ok_or(Error::NotFound("user"))?;

        info!("user {} changed role of user {} to {:?}", acting.id, user_id, role);
        Ok(user)
    }

    async fn ensure_admin(&self, email: &str, password: &str) -> Result<()> {
        if self.users.any_admin().await? {
            return Ok(());
        }

        let email = normalize_email(email)?;
        match self.users.find_by_email(&email).await? {
            Some(user) => {
                self.users.set_role(user.id, Role::Admin).await?;
                warn!("promoted existing user {} to administrator", user.id);
            }
            None => {
                let password_hash = hash_password(password.to_owned()).await?;
                let user = self
                    .users
                    .create_user(NewUser {
                        email,
                        password_hash,
                        role: Role::Admin,
                        first_name: None,
                        last_name: None,
                    })
                    .await?;
                info!("created bootstrap administrator {}", user.id);
            }
        }

        Ok(())
    }
}

fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() && email.len() <= 254 => {
            Ok(email)
        }
        _ => Err(Error::bad_request("a valid email address is required")),
    }
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Argon2id with the library defaults, run off the async workers.
async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .map_err(|e| Error::Internal(e.to_string()))?
    .map_err(|e| {
        error!("password hashing failed: {e}");
        Error::Internal("password processing failed".to_owned())
    })
}

async fn verify_password(password: String, stored_hash: String) -> bool {
    tokio::task::spawn_blocking(move || {
        PasswordHash::new(&stored_hash)
            .map(|parsed| {
                Argon2::default()
                    .verify_password(password.as_bytes(), &parsed)
                    .is_ok()
            })
            .unwrap_or(false)
    })
    .await
    .unwrap_or(false)
}
