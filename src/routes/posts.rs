use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::assets::{discard, upload_staged};
use crate::db::models::{Asset, PostCard, PostDetail, PostListItem};
use crate::db::posts::{self, NewPost, SearchFilter, SortOrder};
use crate::error::{AppError, AppResult};
use crate::routes::{multipart_error, non_empty, required, upload_extension, IdResponse};
use crate::state::AppState;

/// Multipart field carrying the post image.
pub const IMAGE_FIELD: &str = "postImg";

#[derive(Deserialize)]
struct PostQuery {
    id: Option<String>,
}

#[derive(Deserialize)]
struct SearchQuery {
    #[serde(rename = "for")]
    term: Option<String>,
    sort: Option<String>,
    category: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageQuery {
    img_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StagedImage {
    img_id: String,
    file_name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreatePostRequest {
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub img_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdatePostRequest {
    pub id: Option<String>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub content: Option<String>,
    pub img_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeletePostRequest {
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeletedPost {
    id: String,
    deleted_comments: usize,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/post/post", get(get_post))
        .route("/post/posts", get(list_posts))
        .route("/post/recent", get(recent_posts))
        .route("/post/search", get(search_posts))
        .route("/post/upload-post-img", post(stage_image))
        .route("/post/delete-post-img", post(clear_staged_images))
        .route("/post/create-post", post(create_post))
        .route("/post/update-post", post(update_post))
        .route("/post/delete-post", post(delete_post))
}

async fn get_post(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> AppResult<Json<PostDetail>> {
    let id = required(query.id, "id")?;
    let conn = state.db.get()?;
    let post = posts::find_by_id(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Json(post.into()))
}

async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostListItem>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::list(&conn)?))
}

async fn recent_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostCard>>> {
    let conn = state.db.get()?;
    Ok(Json(posts::recent(&conn)?))
}

async fn search_posts(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let term = non_empty(query.term);
    let sort = non_empty(query.sort);
    let category = non_empty(query.category);
    if term.is_none() && sort.is_none() && category.is_none() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let filter = SearchFilter::new(term.as_deref(), category.as_deref())
        .map_err(|e| AppError::BadRequest(format!("Invalid search: {}", e)))?;
    let order = SortOrder::from_param(sort.as_deref());

    let conn = state.db.get()?;
    let results = posts::search(&conn, &filter, order)?;
    Ok(Json(results).into_response())
}

/// Writes the `postImg` upload to the staging directory as `<imgId>.<ext>`.
async fn stage_image(
    State(state): State<AppState>,
    Query(query): Query<StageQuery>,
    mut multipart: Multipart,
) -> AppResult<Json<StagedImage>> {
    let img_id = required(query.img_id, "imgId")?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let ext = upload_extension(field.file_name(), field.content_type());
        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.is_empty() {
            break;
        }

        let path = state.staging.stage(&img_id, ext.as_deref(), &bytes).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("Staged image {} ({} bytes)", file_name, bytes.len());
        return Ok(Json(StagedImage { img_id, file_name }));
    }

    Err(AppError::BadRequest("No image uploaded".into()))
}

async fn clear_staged_images(State(state): State<AppState>) -> AppResult<StatusCode> {
    let removed = state.staging.clear().await?;
    tracing::info!("Cleared {} staged file(s)", removed);
    Ok(StatusCode::NO_CONTENT)
}

/// Resolves a staged image id and pushes the file to the asset host.
async fn publish_staged(state: &AppState, img_id: &str) -> AppResult<Asset> {
    let path = state
        .staging
        .find(img_id)
        .await?
        .ok_or(AppError::NotFound)?;

    upload_staged(state.assets.as_ref(), &path)
        .await
        .map_err(|e| AppError::BadGateway(e.to_string()))
}

async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<IdResponse>)> {
    let title = required(req.title, "title")?;
    let category = required(req.category, "category")?;
    let content = required(req.content, "content")?;
    let img_id = non_empty(req.img_id)
        .ok_or_else(|| AppError::Unprocessable("Post image is required".into()))?;

    let image = publish_staged(&state, &img_id).await?;

    let conn = state.db.get()?;
    let id = posts::create(
        &conn,
        &NewPost {
            title: &title,
            category: &category,
            content: &content,
            image: &image,
        },
    )?;

    tracing::info!("Created post {}", id);
    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

/// Partial update: only supplied, non-blank fields change. A new image is
/// uploaded before anything is written, and the old asset is deleted only
/// once the post points at the replacement. A failed write discards the
/// new upload.
async fn update_post(
    State(state): State<AppState>,
    Json(req): Json<UpdatePostRequest>,
) -> AppResult<Json<IdResponse>> {
    let id = required(req.id, "id")?;

    let mut post = {
        let conn = state.db.get()?;
        posts::find_by_id(&conn, &id)?.ok_or(AppError::NotFound)?
    };

    let replaced = match non_empty(req.img_id) {
        Some(img_id) => {
            let image = publish_staged(&state, &img_id).await?;
            Some(std::mem::replace(&mut post.image, image))
        }
        None => None,
    };

    if let Some(title) = non_empty(req.title) {
        post.title = title;
    }
    if let Some(category) = non_empty(req.category) {
        post.category = category;
    }
    if let Some(content) = non_empty(req.content) {
        post.content = content;
    }

    let saved = state
        .db
        .get()
        .map_err(AppError::from)
        .and_then(|conn| posts::save(&conn, &post).map_err(AppError::from));
    if let Err(e) = saved {
        if replaced.is_some() {
            discard(state.assets.as_ref(), &post.image).await;
        }
        return Err(e);
    }

    if let Some(old) = replaced {
        if let Err(e) = state.assets.delete(&old.public_id).await {
            tracing::warn!("Failed to delete replaced image {}: {}", old.public_id, e);
        }
    }

    tracing::info!("Updated post {}", post.id);
    Ok(Json(IdResponse { id: post.id }))
}

async fn delete_post(
    State(state): State<AppState>,
    Json(req): Json<DeletePostRequest>,
) -> AppResult<Json<DeletedPost>> {
    let id = required(req.id, "id")?;

    let post = {
        let conn = state.db.get()?;
        posts::find_by_id(&conn, &id)?.ok_or(AppError::NotFound)?
    };

    state
        .assets
        .delete(&post.image.public_id)
        .await
        .map_err(|e| AppError::Internal(format!("image delete failed: {}", e)))?;

    let mut conn = state.db.get()?;
    let deleted_comments = posts::delete_with_comments(&mut conn, &post.id)?;

    tracing::info!("Deleted post {} and {} comment(s)", post.id, deleted_comments);
    Ok(Json(DeletedPost {
        id: post.id,
        deleted_comments,
    }))
}
