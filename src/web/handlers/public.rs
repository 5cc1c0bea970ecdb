use crate::services::{feeds, posts};
use crate::web::error::AppResult;
use crate::web::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use std::sync::Arc;

const FEED_CACHE_CONTROL: &str = "public, max-age=3600, s-maxage=3600";

fn cached(content_type: &'static str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, FEED_CACHE_CONTROL),
        ],
        body,
    )
        .into_response()
}

pub async fn rss_feed(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let posts = posts::recent_published(&state.db, feeds::FEED_ITEM_LIMIT)?;
    let rss = feeds::render_rss(&state.config.site, &posts, Utc::now());
    Ok(cached("application/rss+xml; charset=utf-8", rss))
}

pub async fn sitemap(State(state): State<Arc<AppState>>) -> AppResult<Response> {
    let entries = posts::sitemap_entries(&state.db)?;
    let sitemap = feeds::render_sitemap(&state.config.site, &entries, Utc::now());
    Ok(cached("application/xml; charset=utf-8", sitemap))
}

pub async fn robots(State(state): State<Arc<AppState>>) -> Response {
    cached(
        "text/plain; charset=utf-8",
        feeds::render_robots(&state.config.site),
    )
}

pub async fn health() -> &'static str {
    "ok"
}
