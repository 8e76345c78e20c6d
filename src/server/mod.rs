// Web服务器模块

pub mod handlers;
pub mod state;

pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

/// 构建路由（不含中间件层）
pub fn router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;
    let api_routes = Router::new()
        .route("/invoke", post(handlers::invoke_method))
        .layer(DefaultBodyLimit::max(body_limit));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(handlers::health_check))
        .with_state(state)
}
