//! 认证相关 handlers：健康检查、登录、刷新 token
//!
//! ## 提供的端点（均无需认证）
//! - `GET /health` - 健康检查，返回 `{"ok": true}`
//! - `POST /auth/login` - 校验 `{loginID, password}`，返回 access/refresh token 对
//! - `POST /auth/refresh` - 用请求体中的 refresh token 换取新的 token 对
//!
//! refresh token 只从请求体读取，不接受 `Authorization: Bearer`。

use crate::AppState;
use crate::utils::response::auth_error;
use api_contract::{LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse};
use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use hub_auth::AuthError;
use hub_server::{internal_error, ok};
use hub_telemetry::record_authn_failure;
use tracing::info;

/// 健康检查端点
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "ok": true }))
}

/// 登录接口
///
/// 口令哈希校验是 CPU 密集操作，放到阻塞线程池执行。
///
/// # Errors
///
/// - `401 UNAUTHORIZED`: loginID 不存在或口令错误
/// - `500 INTERNAL SERVER ERROR`: 签发失败
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> Response {
    let auth = state.auth.clone();
    let login_id = req.login_id.clone();
    let result =
        match tokio::task::spawn_blocking(move || auth.login(&req.login_id, &req.password)).await {
            Ok(result) => result,
            Err(err) => return internal_error(err.to_string()),
        };
    match result {
        Ok(tokens) => {
            info!(target: "hub.api", login_id = %login_id, "login_succeeded");
            ok(LoginResponse {
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
                expires: tokens.expires_at.saturating_mul(1000),
                login_id,
            })
        }
        Err(err) => {
            if matches!(err, AuthError::InvalidCredentials) {
                record_authn_failure();
                info!(target: "hub.api", login_id = %login_id, "login_rejected");
            }
            auth_error(err)
        }
    }
}

/// 刷新 token 接口
///
/// 成功时 access/refresh 成对轮换。
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Response {
    match state.auth.refresh(&req.refresh_token) {
        Ok(tokens) => ok(RefreshTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            expires: tokens.expires_at.saturating_mul(1000),
        }),
        Err(err) => {
            record_authn_failure();
            auth_error(err)
        }
    }
}
