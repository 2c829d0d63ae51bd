//! 路由定义
//!
//! 集中管理所有 API 路由，按守卫分三组：
//! - 公开：/health, /metrics, /auth/login, /auth/refresh
//! - JWT：/auth/config/*, /directory/*, /history/*
//! - 客户端证书：/things/{thingID}/td, /things/{thingID}/events

use super::AppState;
use super::handlers::*;
use axum::{
    Router,
    routing::{get, post, put},
};
use hub_auth::TokenVerifier;
use hub_server::HubRouter;
use std::sync::Arc;

/// 创建 API 路由
pub fn create_router(state: AppState, verifier: Arc<TokenVerifier>) -> Router {
    HubRouter::new(verifier)
        .public("/health", get(health))
        .public("/metrics", get(get_metrics))
        .public("/auth/login", post(login))
        .public("/auth/refresh", post(refresh_token))
        .jwt(
            "/auth/config/:app_id",
            get(get_app_config).put(put_app_config),
        )
        .jwt("/directory/things", get(list_things))
        .jwt("/directory/things/:thing_id", get(get_thing))
        .jwt("/directory/query", get(query_things))
        .jwt("/history/:thing_id/events", get(get_events))
        .jwt(
            "/history/:thing_id/actions",
            get(get_actions).post(post_action),
        )
        .jwt("/history/:thing_id/latest", get(get_latest))
        .cert(
            "/things/:thing_id/td",
            put(update_thing_td).delete(remove_thing_td),
        )
        .cert("/things/:thing_id/events", post(post_events))
        .build(state)
}
