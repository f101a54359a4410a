// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! HTTP server assembly (axum)
//!
//! Routes the versioned REST surface and the live WebSocket onto one
//! listener, with permissive CORS and request tracing.

use crate::control::ControlAdapter;
use crate::endpoints::{configs, dbscan, filters, sensors, sinks, snapshot};
use crate::ws;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the complete application router.
pub fn build_router(adapter: Arc<ControlAdapter>) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_router())
        .route("/ws/live", get(ws::ws_live_handler))
        .with_state(adapter)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
}

fn api_v1_router() -> Router<Arc<ControlAdapter>> {
    Router::new()
        .route("/sensors", get(sensors::list).post(sensors::create))
        .route(
            "/sensors/:id",
            get(sensors::get_one)
                .patch(sensors::patch_one)
                .delete(sensors::remove),
        )
        .route("/filters", get(filters::get_all))
        .route(
            "/filters/prefilter",
            get(filters::get_prefilter).put(filters::put_prefilter),
        )
        .route(
            "/filters/postfilter",
            get(filters::get_postfilter).put(filters::put_postfilter),
        )
        .route("/dbscan", get(dbscan::get).put(dbscan::put))
        .route("/sinks", get(sinks::list).post(sinks::create))
        .route(
            "/sinks/:index",
            axum::routing::patch(sinks::patch_one).delete(sinks::remove),
        )
        .route("/snapshot", get(snapshot::get))
        .route("/configs/list", get(configs::list))
        .route("/configs/load", axum::routing::post(configs::load))
        .route("/configs/import", axum::routing::post(configs::import))
        .route("/configs/save", axum::routing::post(configs::save))
        .route("/configs/export", get(configs::export))
}

/// Permissive CORS for the browser UI.
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
