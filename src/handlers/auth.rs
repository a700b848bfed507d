use axum::{Json, extract::State, http::StatusCode};

use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    models::{
        AuthLoginRequest, AuthLoginResponse, AuthRegisterRequest, AuthRegisterResponse, NewUser,
        PermissionLevel, UserInfo,
    },
};

/// register
///
/// [Public Route] Creates a `User`-level account. The password is stored as an
/// Argon2 hash; the display name defaults to the local part of the address.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = AuthRegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthRegisterResponse),
        (status = 400, description = "Invalid e-mail or password"),
        (status = 409, description = "E-mail already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<AuthRegisterRequest>,
) -> Result<(StatusCode, Json<AuthRegisterResponse>), AppError> {
    payload.validate()?;

    let name = payload.display_name();
    let password_hash = auth::hash_password(payload.password).await?;

    let user = state
        .repo
        .create_user(NewUser {
            id: payload.email,
            password_hash,
            name,
            permission_level: PermissionLevel::User,
        })
        .await?;

    tracing::info!(email = %user.id, "registered new account");
    Ok((
        StatusCode::CREATED,
        Json(AuthRegisterResponse { email: user.id }),
    ))
}

/// login
///
/// [Public Route] Exchanges credentials for a signed JWT. Unknown addresses and
/// wrong passwords get the same answer.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = AuthLoginRequest,
    responses(
        (status = 201, description = "Token issued", body = AuthLoginResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<AuthLoginRequest>,
) -> Result<(StatusCode, Json<AuthLoginResponse>), AppError> {
    payload.validate()?;

    let user = state
        .repo
        .get_user(&payload.email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !auth::verify_password(payload.password, user.password_hash.clone()).await? {
        tracing::debug!(email = %user.id, "login rejected");
        return Err(AppError::InvalidCredentials);
    }

    let jwt = auth::issue_token(&user, &state.config)?;
    tracing::info!(email = %user.id, "login succeeded");
    Ok((StatusCode::CREATED, Json(AuthLoginResponse { jwt })))
}

/// check_login
///
/// [Authenticated Route] Returns the caller's current profile.
#[utoipa::path(
    get,
    path = "/api/auth/checklogin",
    tag = "auth",
    responses(
        (status = 200, description = "Caller profile", body = UserInfo),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer" = []))
)]
pub async fn check_login(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserInfo>, AppError> {
    let user = state
        .repo
        .get_user(&user.id)
        .await?
        .ok_or(AppError::Unauthenticated)?;
    Ok(Json(user.info()))
}
