use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env, SuperadminConfig},
    error::AppError,
    models::{NewUser, PermissionLevel, User},
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the JWTs issued by `POST /api/auth/login`. `name`, `avatar` and
/// `permissionLevel` are informational for clients; the server always re-reads
/// the account on each request.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    /// Subject: the e-mail address of the account.
    pub sub: String,
    pub name: String,
    pub avatar: Option<Uuid>,
    pub permission_level: PermissionLevel,
    /// Issued At (iat).
    pub iat: usize,
    /// Expiration Time (exp). Validated on every request.
    pub exp: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    /// E-mail address, the account's primary key.
    pub id: String,
    pub name: String,
    pub level: PermissionLevel,
}

impl AuthUser {
    /// Fails with 403 unless the caller holds at least `level`.
    pub fn require(&self, level: PermissionLevel) -> Result<(), AppError> {
        if self.level >= level {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        AuthUser {
            id: user.id.clone(),
            name: user.name.clone(),
            level: user.permission_level,
        }
    }
}

/// Viewer
///
/// A possibly anonymous caller. Used by public endpoints whose answer depends
/// on who is asking (hidden articles, gated content).
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    pub fn anonymous() -> Self {
        Viewer(None)
    }

    pub fn user(&self) -> Option<&AuthUser> {
        self.0.as_ref()
    }
}

// --- Passwords ---

/// hash_password
///
/// Argon2id with a random salt, run on the blocking pool since hashing is
/// deliberately CPU-expensive.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))
    })
    .await
    .map_err(|e| AppError::Internal(format!("password hashing task failed: {e}")))?
}

pub async fn verify_password(password: String, password_hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&password_hash)
            .map_err(|e| AppError::Internal(format!("stored password hash is malformed: {e}")))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(format!("password verification task failed: {e}")))?
}

// --- Tokens ---

pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, AppError> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.id.clone(),
        name: user.name.clone(),
        avatar: user.avatar,
        permission_level: user.permission_level,
        iat: now,
        exp: now + config.token_ttl_secs as usize,
    };

    let key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key)
        .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => tracing::debug!("rejected expired token"),
                other => tracing::debug!(reason = ?other, "rejected invalid token"),
            }
            AppError::Unauthenticated
        })
}

// --- Extractors ---

/// resolve_identity
///
/// Shared by `AuthUser` and `Viewer`:
/// 1. Development bypass: only with `DEV_AUTH_BYPASS` set outside production,
///    an `x-user-id` header naming an existing account authenticates as it.
/// 2. No `Authorization` header: anonymous (`Ok(None)`).
/// 3. A bearer token that is malformed, expired, badly signed, or names a
///    deleted account: 401.
async fn resolve_identity(
    parts: &Parts,
    repo: &RepositoryState,
    config: &AppConfig,
) -> Result<Option<AuthUser>, AppError> {
    if config.dev_auth_bypass && config.env == Env::Local {
        if let Some(id) = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
        {
            if let Some(user) = repo.get_user(id).await? {
                return Ok(Some(AuthUser::from(&user)));
            }
        }
    }

    let Some(auth_header) = parts.headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };

    let token = auth_header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(AppError::Unauthenticated)?;

    let claims = verify_token(token, &config.jwt_secret)?;

    let user = repo
        .get_user(&claims.sub)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    Ok(Some(AuthUser::from(&user)))
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(parts, &repo, &config)
            .await?
            .ok_or(AppError::Unauthenticated)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_identity(parts, &repo, &config).await.map(Viewer)
    }
}

// --- Bootstrap ---

/// ensure_superadmin
///
/// Creates the configured superadmin account, or promotes it if it exists at a
/// lower level. The stored password of an existing account is left alone.
pub async fn ensure_superadmin(
    repo: &RepositoryState,
    admin: &SuperadminConfig,
) -> Result<(), AppError> {
    match repo.get_user(&admin.email).await? {
        Some(user) if user.permission_level == PermissionLevel::Superadmin => Ok(()),
        Some(_) => {
            repo.set_permission_level(&admin.email, PermissionLevel::Superadmin)
                .await?;
            tracing::info!(email = %admin.email, "promoted existing account to superadmin");
            Ok(())
        }
        None => {
            let password_hash = hash_password(admin.password.clone()).await?;
            repo.create_user(NewUser {
                id: admin.email.clone(),
                password_hash,
                name: "Superadmin".to_string(),
                permission_level: PermissionLevel::Superadmin,
            })
            .await?;
            tracing::info!(email = %admin.email, "created superadmin account");
            Ok(())
        }
    }
}
