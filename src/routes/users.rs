use axum::extract::{Multipart, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::assets::{discard, upload_staged};
use crate::auth::handlers::{hash_blocking, remove_account};
use crate::db::dashboard::{self, Dashboard};
use crate::db::models::UserSummary;
use crate::db::users::{self, ProfileChanges};
use crate::db::new_id;
use crate::error::{conflict_on_unique, AppError, AppResult};
use crate::routes::{multipart_error, non_empty, required, upload_extension, IdResponse};
use crate::state::AppState;

/// Multipart field carrying a new profile picture.
pub const AVATAR_FIELD: &str = "avatar";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteUserRequest {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
}

/// Fields read from the profile form before anything is touched.
#[derive(Default)]
struct ProfileForm {
    id: Option<String>,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    avatar: Option<AvatarUpload>,
}

struct AvatarUpload {
    ext: Option<String>,
    bytes: Bytes,
}

impl ProfileForm {
    async fn read(mut multipart: Multipart) -> AppResult<Self> {
        let mut form = ProfileForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                AVATAR_FIELD => {
                    let ext = upload_extension(field.file_name(), field.content_type());
                    let bytes = field.bytes().await.map_err(multipart_error)?;
                    if !bytes.is_empty() {
                        form.avatar = Some(AvatarUpload { ext, bytes });
                    }
                }
                "id" | "username" | "email" => {
                    let value = non_empty(Some(field.text().await.map_err(multipart_error)?));
                    match name.as_str() {
                        "id" => form.id = value,
                        "username" => form.username = value,
                        _ => form.email = value,
                    }
                }
                // Passwords are taken verbatim, surrounding spaces included.
                "password" => {
                    let value = field.text().await.map_err(multipart_error)?;
                    form.password = Some(value).filter(|v| !v.is_empty());
                }
                _ => {}
            }
        }

        Ok(form)
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/users", get(list_users))
        .route("/user/dashboard", get(dashboard))
        .route("/user/profile", post(update_profile))
        .route("/user/delete-user", post(delete_user))
}

async fn list_users(State(state): State<AppState>) -> AppResult<Json<Vec<UserSummary>>> {
    let conn = state.db.get()?;
    Ok(Json(users::list(&conn)?))
}

async fn dashboard(State(state): State<AppState>) -> AppResult<Json<Dashboard>> {
    let conn = state.db.get()?;
    Ok(Json(dashboard::build(&conn, Utc::now())?))
}

/// Changes any of name, e-mail, password and avatar. Everything that can be
/// rejected is checked before the new avatar is uploaded. The row is written
/// next and the old avatar deleted last; if that delete fails the row is put
/// back and the new upload discarded.
async fn update_profile(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ProfileResponse>> {
    let form = ProfileForm::read(multipart).await?;
    let id = required(form.id, "id")?;

    if form.username.is_none()
        && form.email.is_none()
        && form.password.is_none()
        && form.avatar.is_none()
    {
        return Err(AppError::BadRequest("Nothing to update".into()));
    }

    let user = {
        let conn = state.db.get()?;
        let user = users::find_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
        if let Some(email) = form.email.as_deref() {
            if let Some(owner) = users::find_by_email(&conn, email)? {
                if owner.id != user.id {
                    return Err(AppError::Conflict("Email already registered".into()));
                }
            }
        }
        user
    };

    let mut changes = ProfileChanges {
        username: form.username,
        email: form.email,
        ..ProfileChanges::default()
    };

    if let Some(plain) = form.password {
        changes.password_hash = Some(hash_blocking(plain).await?);
    }

    if let Some(upload) = form.avatar {
        let path = state
            .staging
            .stage(&format!("avatar-{}", new_id()), upload.ext.as_deref(), &upload.bytes)
            .await?;
        let avatar = upload_staged(state.assets.as_ref(), &path)
            .await
            .map_err(|e| AppError::BadGateway(e.to_string()))?;
        changes.avatar = Some(avatar);
    }

    if let Err(e) = write_profile(&state, &user.id, &changes) {
        if let Some(avatar) = &changes.avatar {
            discard(state.assets.as_ref(), avatar).await;
        }
        return Err(e);
    }

    if let (Some(avatar), Some(old)) = (&changes.avatar, user.avatar_public_id.as_deref()) {
        if let Err(e) = state.assets.delete(old).await {
            {
                let conn = state.db.get()?;
                users::restore_profile(&conn, &user)?;
            }
            discard(state.assets.as_ref(), avatar).await;
            return Err(AppError::Internal(format!("avatar delete failed: {}", e)));
        }
    }

    let conn = state.db.get()?;
    let updated = users::find_by_id(&conn, &user.id)?.ok_or(AppError::NotFound)?;

    tracing::info!("Updated profile of user {}", updated.id);
    Ok(Json(ProfileResponse {
        name: updated.username,
        email: updated.email,
        avatar: updated.avatar_url,
    }))
}

fn write_profile(state: &AppState, id: &str, changes: &ProfileChanges) -> AppResult<()> {
    let conn = state.db.get()?;
    users::update_profile(&conn, id, changes)
        .map_err(|e| conflict_on_unique(e, "Email already registered"))
}

async fn delete_user(
    State(state): State<AppState>,
    Json(req): Json<DeleteUserRequest>,
) -> AppResult<Json<IdResponse>> {
    let id = required(req.id, "id")?;
    remove_account(&state, &id).await?;
    Ok(Json(IdResponse { id }))
}
