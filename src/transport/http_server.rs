use std::sync::Arc;

use axum::{Router, routing::get};

use crate::server::AppState;
use crate::transport::routes::{audio, info};

const API: &str = "/api";

pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/audio", get(audio::stream_audio).options(audio::preflight))
        .route("/formats", get(audio::list_formats));

    Router::new()
        .nest(API, api_routes)
        .route("/version", get(info::get_version))
        .with_state(state)
}
