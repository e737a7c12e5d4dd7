//! Dashboard route handlers.
//!
//! Serves the embedded viewer page that listens on `/ws`.

use axum::response::{Html, IntoResponse};

const DASHBOARD_HTML: &str = include_str!("../../../../assets/web/index.html");

/// GET / - Serve the viewer page.
pub async fn index() -> impl IntoResponse {
    Html(DASHBOARD_HTML)
}

/// GET /health - Liveness check.
pub async fn health() -> &'static str {
    "ok"
}
