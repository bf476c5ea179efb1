use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{CommentBody, CommentView, Pagination};
use super::repo;
use crate::auth::jwt::AuthUser;
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/comments/:video_id",
            get(list_comments).post(add_comment),
        )
        .route(
            "/comments/c/:comment_id",
            patch(update_comment).delete(delete_comment),
        )
}

#[instrument(skip(state))]
async fn list_comments(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(video_id): Path<Uuid>,
    Query(p): Query<Pagination>,
) -> AppResult<Json<ApiResponse<Vec<CommentView>>>> {
    let rows = repo::list_by_video(&state.db, video_id, p.limit, p.offset).await?;
    let comments = rows.into_iter().map(CommentView::from).collect();
    Ok(Json(ApiResponse::ok(
        comments,
        "comments fetched successfully",
    )))
}

#[instrument(skip(state, payload))]
async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(video_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> AppResult<(StatusCode, Json<ApiResponse<CommentView>>)> {
    if payload.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    let id = repo::insert(&state.db, video_id, user_id, payload.content.trim()).await?;
    let row = repo::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::Internal("comment row missing after create".into()))?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::created(
            CommentView::from(row),
            "comment added successfully",
        )),
    ))
}

#[instrument(skip(state, payload))]
async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(comment_id): Path<Uuid>,
    Json(payload): Json<CommentBody>,
) -> AppResult<Json<ApiResponse<CommentView>>> {
    if payload.content.trim().is_empty() {
        return Err(AppError::Validation("content is required".into()));
    }
    let updated =
        repo::update_owned(&state.db, comment_id, user_id, payload.content.trim()).await?;
    if !updated {
        return Err(AppError::NotFound("comment not found".into()));
    }
    let row = repo::get_by_id(&state.db, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("comment not found".into()))?;
    Ok(Json(ApiResponse::ok(
        CommentView::from(row),
        "comment updated successfully",
    )))
}

#[instrument(skip(state))]
async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    let deleted = repo::delete_owned(&state.db, comment_id, user_id).await?;
    if !deleted {
        return Err(AppError::NotFound("comment not found".into()));
    }
    Ok(Json(ApiResponse::ok(
        serde_json::json!({}),
        "comment deleted successfully",
    )))
}
