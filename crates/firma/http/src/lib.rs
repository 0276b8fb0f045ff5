//! Firma HTTP Layer
//!
//! Axum handlers for the signing endpoint and the liveness endpoint.

mod form;
mod handlers;
mod middleware;

pub use form::*;
pub use handlers::*;
pub use middleware::*;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use firma_assets::Fetcher;
use firma_service::SigningPipeline;
use tower_http::cors::CorsLayer;

/// Create the signing router.
///
/// The upload limit comes from `server.max_upload_bytes` of the pipeline's
/// configuration.
pub fn sign_router<F>(pipeline: Arc<SigningPipeline<F>>) -> Router
where
    F: Fetcher + 'static,
{
    use axum::routing::{get, post};

    let max_upload_bytes = pipeline.config().server.max_upload_bytes;

    Router::new()
        .route("/sign_pdf", post(handlers::sign_handler::<F>))
        .route("/hola", get(handlers::hello_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(CorsLayer::permissive())
        .with_state(pipeline)
}
