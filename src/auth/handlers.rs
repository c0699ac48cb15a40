use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::cookies::{clear_refresh_cookie, get_cookie_value, refresh_cookie};
use crate::auth::password;
use crate::db::models::{Credentials, NewUser, User, UserProfile};
use crate::db::users;
use crate::error::{conflict_on_unique, AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::routes::{required, required_password};
use crate::state::AppState;

// -- Request types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SignUpRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SignInRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GoogleLoginRequest {
    pub code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountRequest {
    pub id: Option<String>,
}

/// Body returned whenever a session is established or refreshed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user: UserProfile,
    pub access_token: String,
}

// -- Helpers --

/// bcrypt is CPU-bound; keep it off the async workers.
pub(crate) async fn hash_blocking(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(AppError::from)
}

async fn verify_blocking(plain: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Issues a token pair, stores the refresh token as the user's only session
/// and sets the cookie.
fn establish_session(state: &AppState, user: &User) -> AppResult<Response> {
    let pair = state.tokens.issue_pair(user)?;

    let conn = state.db.get()?;
    users::replace_refresh_token(&conn, &user.id, &pair.refresh)?;

    let body = SessionResponse {
        user: user.profile(),
        access_token: pair.access,
    };
    let cookie = refresh_cookie(&state.config.auth, &pair.refresh);

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn reject_session(state: &AppState) -> Response {
    let cookie = clear_refresh_cookie(&state.config.auth);
    (StatusCode::FORBIDDEN, [(header::SET_COOKIE, cookie)], "Forbidden").into_response()
}

/// Deletes the account and its avatar. The avatar goes first: if the asset
/// host refuses, the account is kept.
pub async fn remove_account(state: &AppState, id: &str) -> AppResult<()> {
    let user = {
        let conn = state.db.get()?;
        users::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?
    };

    if let Some(public_id) = user.avatar_public_id.as_deref() {
        state
            .assets
            .delete(public_id)
            .await
            .map_err(|e| AppError::Internal(format!("avatar delete failed: {}", e)))?;
    }

    let conn = state.db.get()?;
    users::delete(&conn, &user.id)?;
    tracing::info!("Deleted account {}", user.id);
    Ok(())
}

// -- Handlers --

pub async fn sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> AppResult<StatusCode> {
    let email = required(req.email, "email")?;
    let plain = required_password(req.password)?;
    let username = format!(
        "{} {}",
        req.first_name.unwrap_or_default().trim(),
        req.last_name.unwrap_or_default().trim()
    )
    .trim()
    .to_string();
    if username.is_empty() {
        return Err(AppError::BadRequest("Missing name".into()));
    }

    {
        let conn = state.db.get()?;
        if users::find_by_email(&conn, &email)?.is_some() {
            return Err(AppError::Conflict("Email already registered".into()));
        }
    }

    let hash = hash_blocking(plain).await?;

    let conn = state.db.get()?;
    let user = users::create(
        &conn,
        &NewUser {
            username,
            email,
            avatar_url: None,
            credentials: Credentials::Password(hash),
        },
    )
    .map_err(|e| conflict_on_unique(e, "Email already registered"))?;

    tracing::info!("Registered user {}", user.id);
    Ok(StatusCode::CREATED)
}

pub async fn sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> AppResult<Response> {
    let email = required(req.email, "email")?;
    let plain = required_password(req.password)?;

    let user = {
        let conn = state.db.get()?;
        users::find_by_email(&conn, &email)?.ok_or(AppError::NotFound)?
    };

    // Accounts created through the identity provider have no password.
    let hash = user.password_hash.clone().ok_or(AppError::Unauthorized)?;
    if !verify_blocking(plain, hash).await? {
        return Err(AppError::Unauthorized);
    }

    tracing::info!("User {} signed in", user.id);
    establish_session(&state, &user)
}

pub async fn sign_out(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let config = &state.config.auth;

    if let Some(token) = get_cookie_value(&headers, &config.cookie_name) {
        let conn = state.db.get()?;
        if let Some(user) = users::find_by_refresh_token(&conn, token)? {
            users::clear_refresh_token(&conn, &user.id)?;
            tracing::info!("User {} signed out", user.id);
        }
    }

    let cookie = clear_refresh_cookie(config);
    Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response())
}

pub async fn google_login(
    State(state): State<AppState>,
    Json(req): Json<GoogleLoginRequest>,
) -> AppResult<Response> {
    let code = required(req.code, "code")?;

    let identity = state.identity.exchange(&code).await.map_err(|e| {
        tracing::warn!("Identity exchange failed: {}", e);
        AppError::NotFound
    })?;

    let conn = state.db.get()?;
    let user = match users::find_by_subject(&conn, &identity.subject)? {
        Some(user) => user,
        None => {
            let username = if identity.name.trim().is_empty() {
                identity.email.clone()
            } else {
                identity.name.clone()
            };
            let user = users::create(
                &conn,
                &NewUser {
                    username,
                    email: identity.email.clone(),
                    avatar_url: identity.picture.clone(),
                    credentials: Credentials::Google {
                        subject: identity.subject.clone(),
                    },
                },
            )
            .map_err(|e| conflict_on_unique(e, "Email already registered"))?;
            tracing::info!("Registered external account {}", user.id);
            user
        }
    };
    drop(conn);

    establish_session(&state, &user)
}

/// Mints a new access token from the refresh cookie. The refresh token
/// itself is not rotated.
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    let Some(token) = get_cookie_value(&headers, &state.config.auth.cookie_name) else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };

    let holder = {
        let conn = state.db.get()?;
        users::find_by_refresh_token(&conn, token)?
    };
    let Some(user) = holder else {
        tracing::debug!("Refresh token not held by any user");
        return Ok(reject_session(&state));
    };

    match state.tokens.verify_refresh(token) {
        Ok(claims) if claims.id == user.id => {}
        Ok(_) => {
            tracing::warn!("Refresh token subject mismatch for user {}", user.id);
            return Ok(reject_session(&state));
        }
        Err(e) => {
            tracing::debug!("Refresh token rejected: {}", e);
            return Ok(reject_session(&state));
        }
    }

    let access_token = state.tokens.issue_access(&user)?;
    Ok(Json(SessionResponse {
        user: user.profile(),
        access_token,
    })
    .into_response())
}

pub async fn delete_account(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AccountRequest>,
) -> AppResult<Response> {
    let id = required(req.id, "id")?;
    remove_account(&state, &id).await?;

    let config = &state.config.auth;
    if get_cookie_value(&headers, &config.cookie_name).is_some() {
        let cookie = clear_refresh_cookie(config);
        return Ok((StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)]).into_response());
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub async fn me(State(state): State<AppState>, current: CurrentUser) -> AppResult<Json<UserProfile>> {
    let conn = state.db.get()?;
    let user = users::find_by_id(&conn, &current.id)?.ok_or(AppError::NotFound)?;
    Ok(Json(user.profile()))
}
