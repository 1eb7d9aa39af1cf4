//! Route table
//!
//! - `POST /send` - bulk send endpoint
//! - `GET /` - login page from the public directory
//! - anything else - static files from the public directory

use axum::{extract::DefaultBodyLimit, routing::post, Router};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

/// Build the application router
#[must_use]
pub fn router(state: AppState) -> Router {
    let server = &state.config().server;
    let index = ServeFile::new(server.public_dir.join(&server.index_file));
    let assets = ServeDir::new(&server.public_dir);
    let body_limit = server.body_limit_bytes;

    Router::new()
        .route("/send", post(handlers::send))
        .route_service("/", index)
        .fallback_service(assets)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
