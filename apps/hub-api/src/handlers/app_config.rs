//! 按用户、按应用的配置文本
//!
//! - GET /auth/config/{appID}
//! - PUT /auth/config/{appID}

use crate::AppState;
use crate::utils::response::storage_error;
use api_contract::{AppConfigDto, UpdateAppConfigRequest};
use axum::{
    Extension, Json,
    extract::{Path, State},
    response::Response,
};
use hub_server::{AuthenticatedUser, ok};

/// 读取当前用户的应用配置；未保存过时返回空文本。
pub async fn get_app_config(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(app_id): Path<String>,
) -> Response {
    match state.app_config.get(&user.login_id, &app_id) {
        Ok(config) => ok(AppConfigDto {
            app_id,
            config: config.unwrap_or_default(),
        }),
        Err(err) => storage_error(err),
    }
}

pub async fn put_app_config(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(app_id): Path<String>,
    Json(req): Json<UpdateAppConfigRequest>,
) -> Response {
    match state
        .app_config
        .set(&user.login_id, &app_id, req.config.clone())
    {
        Ok(()) => ok(AppConfigDto {
            app_id,
            config: req.config,
        }),
        Err(err) => storage_error(err),
    }
}
