//! Route tree.
//!
//! ```text
//! /health                      liveness + version
//!
//! /api/v1/generate             POST start a generation, GET list recent jobs
//! /api/v1/voice/generate       POST synthesize speech (standard | hd tier)
//! ```

pub mod generate;
pub mod health;
pub mod voice;

use axum::routing::post;
use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate::create).get(generate::list))
        .route("/voice/generate", post(voice::create))
}
