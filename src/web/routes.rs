use super::handlers;
use super::state::AppState;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/api/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        .route(
            "/api/posts/:slug",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route(
            "/api/admin/posts/:slug",
            get(handlers::posts::admin_get_post),
        )
        .route("/api/admin/stats", get(handlers::posts::stats))
}

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/rss", get(handlers::public::rss_feed))
        .route("/rss.xml", get(handlers::public::rss_feed))
        .route("/api/sitemap", get(handlers::public::sitemap))
        .route("/sitemap.xml", get(handlers::public::sitemap))
        .route("/api/robots", get(handlers::public::robots))
        .route("/robots.txt", get(handlers::public::robots))
        .route("/health", get(handlers::public::health))
}
