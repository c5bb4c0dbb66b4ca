// Thread HTTP interface - axum routes over ThreadService

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::middleware::{viewer_context_middleware, Vc},
    models::{
        Comment, CommentId, CommentNode, Like, LikeState, LikeableKind, Subject, SubjectId,
        SubjectKind,
    },
};

// HTTP Request/Response types
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterSubjectRequest {
    pub kind: SubjectKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContentRequest {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct RecentLikesQuery {
    pub limit: Option<u32>,
}

// HTTP Handlers

pub async fn health_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.database.health_check().await?;
    Ok(Json(json!({"status": "ok"})))
}

pub async fn register_subject_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<RegisterSubjectRequest>,
) -> AppResult<Json<Subject>> {
    let subject = state.service.register_subject(SubjectId(id), req.kind).await?;
    Ok(Json(subject))
}

pub async fn get_subject_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Subject>> {
    let subject = state.service.get_subject(SubjectId(id)).await?;
    Ok(Json(subject))
}

pub async fn get_thread_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Vec<CommentNode>>> {
    let tree = state.service.fetch_tree(&vc, SubjectId(id)).await?;
    Ok(Json(tree))
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath(id): AxumPath<i64>,
    Json(req): Json<ContentRequest>,
) -> AppResult<(StatusCode, Json<CommentNode>)> {
    let node = state
        .service
        .submit_comment(&vc, SubjectId(id), &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn create_reply_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath((id, parent_id)): AxumPath<(i64, i64)>,
    Json(req): Json<ContentRequest>,
) -> AppResult<(StatusCode, Json<CommentNode>)> {
    let node = state
        .service
        .submit_reply(&vc, SubjectId(id), CommentId(parent_id), &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_replies_handler(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<i64>,
) -> AppResult<Json<Vec<Comment>>> {
    let replies = state.service.find_children(CommentId(id)).await?;
    Ok(Json(replies))
}

pub async fn toggle_like_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath((kind, id)): AxumPath<(String, i64)>,
) -> AppResult<Json<LikeState>> {
    let kind: LikeableKind = kind.parse()?;
    let like_state = state.service.toggle_like(&vc, id, kind).await?;
    Ok(Json(like_state))
}

pub async fn get_like_state_handler(
    State(state): State<AppState>,
    vc: Vc,
    AxumPath((kind, id)): AxumPath<(String, i64)>,
) -> AppResult<Json<LikeState>> {
    let kind: LikeableKind = kind.parse()?;
    let like_state = state.service.like_state(&vc, id, kind).await?;
    Ok(Json(like_state))
}

pub async fn recent_likes_handler(
    State(state): State<AppState>,
    AxumPath((kind, id)): AxumPath<(String, i64)>,
    Query(params): Query<RecentLikesQuery>,
) -> AppResult<Json<Vec<Like>>> {
    let kind: LikeableKind = kind.parse()?;
    let likes = state
        .service
        .recent_likes(id, kind, params.limit.unwrap_or(20))
        .await?;
    Ok(Json(likes))
}

async fn fallback_handler() -> AppError {
    AppError::NotFound("No such route".to_string())
}

/// Every route runs behind the viewer context middleware, so handlers can
/// take a `Vc` without further setup.
pub fn create_thread_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        // Subjects
        .route(
            "/api/v1/subjects/{id}",
            get(get_subject_handler).put(register_subject_handler),
        )
        // Threads
        .route(
            "/api/v1/subjects/{id}/comments",
            get(get_thread_handler).post(create_comment_handler),
        )
        .route(
            "/api/v1/subjects/{id}/comments/{parent_id}/replies",
            post(create_reply_handler),
        )
        .route("/api/v1/comments/{id}/replies", get(get_replies_handler))
        // Likes
        .route(
            "/api/v1/likes/{kind}/{id}",
            get(get_like_state_handler).post(toggle_like_handler),
        )
        .route("/api/v1/likes/{kind}/{id}/recent", get(recent_likes_handler))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            viewer_context_middleware::<AppState>,
        ))
        .with_state(state)
}
