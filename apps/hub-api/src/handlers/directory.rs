//! TD 目录 handlers
//!
//! JWT 路由（消费者，需对 Thing 有读取 td 的权限）：
//! - GET /directory/things?limit&offset - 列出可读 TD
//! - GET /directory/things/{thingID} - 获取单个 TD（原样返回）
//! - GET /directory/query?path&limit&offset - JSONPath 查询
//!
//! 证书路由（设备 / 插件，需写 td 权限）：
//! - PUT /things/{thingID}/td - 发布或替换 TD
//! - DELETE /things/{thingID}/td - 移除 TD
//!
//! 列表和查询只返回调用方可读的 Thing，不可读的条目被过滤而不是报 403。

use crate::AppState;
use crate::middleware::{Caller, require_thing_access};
use crate::utils::response::{raw_documents, storage_error};
use api_contract::{DirectoryQuery, PageQuery};
use axum::{
    Extension,
    extract::{Path, Query, State},
    response::Response,
};
use domain::MessageType;
use hub_server::{AuthenticatedUser, PeerIdentity, ok};
use hub_storage::IdFilter;
use hub_telemetry::record_td_stored;
use serde_json::value::RawValue;
use tracing::info;

/// 列出调用方可读的 TD
pub async fn list_things(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(page): Query<PageQuery>,
) -> Response {
    let caller = Caller::from(user);
    let readable = |thing_id: &str| caller.can(&state, thing_id, false, MessageType::Td);
    let filter: IdFilter<'_> = &readable;
    match state.directory.list_tds(
        page.limit.unwrap_or_default(),
        page.offset.unwrap_or_default(),
        Some(filter),
    ) {
        Ok(docs) => match raw_documents(docs) {
            Ok(docs) => ok(docs),
            Err(response) => response,
        },
        Err(err) => storage_error(err),
    }
}

/// 获取单个 TD
pub async fn get_thing(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(thing_id): Path<String>,
) -> Response {
    let caller = Caller::from(user);
    if let Err(response) = require_thing_access(&state, &caller, &thing_id, false, MessageType::Td)
    {
        return response;
    }
    let td = match state.directory.get_td(&thing_id) {
        Ok(td) => td,
        Err(err) => return storage_error(err),
    };
    match RawValue::from_string(td) {
        Ok(raw) => ok(raw),
        Err(err) => hub_server::internal_error(err.to_string()),
    }
}

/// JSONPath 查询；路径非法时返回 400。
pub async fn query_things(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<DirectoryQuery>,
) -> Response {
    let caller = Caller::from(user);
    let readable = |thing_id: &str| caller.can(&state, thing_id, false, MessageType::Td);
    let filter: IdFilter<'_> = &readable;
    match state.directory.query_tds(
        &query.path,
        query.limit.unwrap_or_default(),
        query.offset.unwrap_or_default(),
        Some(filter),
    ) {
        Ok(docs) => match raw_documents(docs) {
            Ok(docs) => ok(docs),
            Err(response) => response,
        },
        Err(err) => storage_error(err),
    }
}

/// 发布 TD；请求体即 TD 原文。
pub async fn update_thing_td(
    State(state): State<AppState>,
    Extension(peer): Extension<PeerIdentity>,
    Path(thing_id): Path<String>,
    body: String,
) -> Response {
    let caller = Caller::from(peer);
    if let Err(response) = require_thing_access(&state, &caller, &thing_id, true, MessageType::Td) {
        return response;
    }
    match state.directory.update_td(&thing_id, &body) {
        Ok(()) => {
            record_td_stored();
            info!(target: "hub.api", thing_id = %thing_id, publisher = %caller.login_id, "td_updated");
            ok(serde_json::json!({ "thingID": thing_id }))
        }
        Err(err) => storage_error(err),
    }
}

/// 移除 TD（幂等）。
pub async fn remove_thing_td(
    State(state): State<AppState>,
    Extension(peer): Extension<PeerIdentity>,
    Path(thing_id): Path<String>,
) -> Response {
    let caller = Caller::from(peer);
    if let Err(response) = require_thing_access(&state, &caller, &thing_id, true, MessageType::Td) {
        return response;
    }
    match state.directory.remove_td(&thing_id) {
        Ok(()) => ok(serde_json::json!({ "thingID": thing_id })),
        Err(err) => storage_error(err),
    }
}
