use crate::models::{CreatePost, PostQueryParams, UpdatePost};
use crate::services::posts::{self, PostError};
use crate::services::rate_limit::RateLimitInfo;
use crate::services::slug::validate_slug;
use crate::web::error::{AppError, AppResult};
use crate::web::extractors::ClientIp;
use crate::web::state::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};
use std::sync::Arc;

fn checked_slug(slug: &str) -> AppResult<&str> {
    if validate_slug(slug) {
        Ok(slug)
    } else {
        Err(AppError::BadRequest("Invalid slug provided".to_string()))
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, info: RateLimitInfo) {
    headers.insert("x-ratelimit-remaining", HeaderValue::from(info.remaining));
    headers.insert("x-ratelimit-reset", HeaderValue::from(info.reset_time));
}

/// GET /api/posts
pub async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PostQueryParams>,
) -> AppResult<Json<Value>> {
    let query = posts::parse_query(params).map_err(|e| match e {
        PostError::Validation(details) => AppError::InvalidQuery(details),
        other => AppError::Post(other),
    })?;
    let page = posts::list_posts(&state.db, &query)?;
    Ok(Json(json!(page)))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    ClientIp(ip): ClientIp,
    body: Result<Json<CreatePost>, JsonRejection>,
) -> Response {
    let limits = &state.config.rate_limit;
    let window = limits.create_window();

    // checked before any database access
    let admitted = state
        .rate_limiter
        .admit(&ip, limits.create_max_requests, window);
    let info = state.rate_limiter.remaining(&ip, window);

    let mut response = if admitted {
        create(&state, body).into_response()
    } else {
        tracing::warn!("Rate limit exceeded for client {}", ip);
        AppError::RateLimited.into_response()
    };
    apply_rate_limit_headers(response.headers_mut(), info);
    response
}

fn create(
    state: &AppState,
    body: Result<Json<CreatePost>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Value>)> {
    let Json(input) = body?;
    let post = posts::create_post(&state.db, &state.sanitizer, input)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Post created successfully",
            "post": {
                "id": post.id,
                "title": post.title,
                "slug": post.slug,
                "status": post.status,
                "createdAt": post.created_at,
            }
        })),
    ))
}

/// GET /api/posts/:slug
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let slug = checked_slug(&slug)?;
    let post = posts::view_published_post(&state.db, slug)?.ok_or(PostError::NotFound)?;
    Ok(Json(json!({ "post": post })))
}

/// PUT /api/posts/:slug
pub async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    body: Result<Json<UpdatePost>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let slug = checked_slug(&slug)?;
    let Json(input) = body?;
    let post = posts::update_post(&state.db, &state.sanitizer, slug, input)?;
    Ok(Json(json!({
        "message": "Post updated successfully",
        "post": post,
    })))
}

/// DELETE /api/posts/:slug
pub async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Response> {
    let slug = checked_slug(&slug)?;
    if posts::delete_post(&state.db, slug)? {
        Ok(Json(json!({ "message": "Post deleted successfully" })).into_response())
    } else {
        Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Post not found or already deleted" })),
        )
            .into_response())
    }
}

/// GET /api/admin/posts/:slug
pub async fn admin_get_post(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> AppResult<Json<Value>> {
    let slug = checked_slug(&slug)?;
    let post = posts::get_post(&state.db, slug)?.ok_or(PostError::NotFound)?;
    Ok(Json(json!({ "post": post })))
}

/// GET /api/admin/stats
pub async fn stats(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let stats = posts::post_stats(&state.db)?;
    Ok(Json(json!({ "stats": stats })))
}
