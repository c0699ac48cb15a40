use axum::extract::{Query, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::db::models::{CommentListItem, LikeState, PostComment};
use crate::db::{comments, posts, users};
use crate::error::{AppError, AppResult};
use crate::routes::{required, IdResponse};
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostCommentsQuery {
    /// Viewer the relative fields are computed for.
    id: Option<String>,
    post_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AddCommentRequest {
    pub comment: Option<String>,
    pub commented_by: Option<String>,
    pub commented_on: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LikeRequest {
    /// The liking user.
    pub id: Option<String>,
    pub comment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EditCommentRequest {
    pub id: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteCommentRequest {
    pub id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/comment/comments", get(list_comments))
        .route("/comment/post", get(post_comments))
        .route("/comment/add-comment", post(add_comment))
        .route("/comment/like", patch(toggle_like))
        .route("/comment/edit", patch(edit_comment))
        .route("/comment/delete", delete(delete_comment))
}

async fn list_comments(State(state): State<AppState>) -> AppResult<Json<Vec<CommentListItem>>> {
    let conn = state.db.get()?;
    Ok(Json(comments::list(&conn)?))
}

async fn post_comments(
    State(state): State<AppState>,
    Query(query): Query<PostCommentsQuery>,
) -> AppResult<Json<Vec<PostComment>>> {
    let viewer_id = required(query.id, "id")?;
    let post_id = required(query.post_id, "postId")?;

    let conn = state.db.get()?;
    if !posts::exists(&conn, &post_id)? {
        return Err(AppError::NotFound);
    }
    Ok(Json(comments::for_post(&conn, &post_id, &viewer_id)?))
}

async fn add_comment(
    State(state): State<AppState>,
    Json(req): Json<AddCommentRequest>,
) -> AppResult<Json<IdResponse>> {
    let text = required(req.comment, "comment")?;
    let author = required(req.commented_by, "commentedBy")?;
    let post_id = required(req.commented_on, "commentedOn")?;

    let conn = state.db.get()?;
    if !users::exists(&conn, &author)? {
        return Err(AppError::Unauthorized);
    }
    if !posts::exists(&conn, &post_id)? {
        return Err(AppError::NotFound);
    }

    let id = comments::create(&conn, &text, &author, &post_id)?;
    tracing::info!("User {} commented on post {}", author, post_id);
    Ok(Json(IdResponse { id }))
}

async fn toggle_like(
    State(state): State<AppState>,
    Json(req): Json<LikeRequest>,
) -> AppResult<Json<LikeState>> {
    let user_id = required(req.id, "id")?;
    let comment_id = required(req.comment_id, "commentId")?;

    let mut conn = state.db.get()?;
    if !users::exists(&conn, &user_id)? {
        return Err(AppError::Unauthorized);
    }
    if comments::find_by_id(&conn, &comment_id)?.is_none() {
        return Err(AppError::NotFound);
    }

    Ok(Json(comments::toggle_like(&mut conn, &comment_id, &user_id)?))
}

async fn edit_comment(
    State(state): State<AppState>,
    Json(req): Json<EditCommentRequest>,
) -> AppResult<Json<IdResponse>> {
    let id = required(req.id, "id")?;
    let content = required(req.content, "content")?;

    let conn = state.db.get()?;
    if !comments::update_text(&conn, &id, &content)? {
        return Err(AppError::NotFound);
    }
    Ok(Json(IdResponse { id }))
}

async fn delete_comment(
    State(state): State<AppState>,
    Json(req): Json<DeleteCommentRequest>,
) -> AppResult<Json<IdResponse>> {
    let id = required(req.id, "id")?;

    let conn = state.db.get()?;
    if !comments::delete(&conn, &id)? {
        return Err(AppError::NotFound);
    }
    tracing::info!("Deleted comment {}", id);
    Ok(Json(IdResponse { id }))
}
