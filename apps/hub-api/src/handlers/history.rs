//! 事件 / 动作历史 handlers
//!
//! JWT 路由：
//! - GET /history/{thingID}/events?name&after&before&limit - 事件历史（需读 event 权限）
//! - GET /history/{thingID}/actions?... - 动作历史（需读 action 权限）
//! - POST /history/{thingID}/actions - 记录动作请求（需写 action 权限，editor 及以上）
//! - GET /history/{thingID}/latest - 每个属性的最新值
//!
//! 证书路由：
//! - POST /things/{thingID}/events - 设备上报单个事件或事件数组（需写 event 权限）
//!
//! 请求体中的 thingID 总是以路径为准。

use crate::AppState;
use crate::middleware::{Caller, require_thing_access};
use crate::utils::response::storage_error;
use api_contract::HistoryQueryParams;
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Response,
};
use domain::{MessageType, ThingValue};
use hub_server::{AuthenticatedUser, PeerIdentity, ok};
use hub_storage::HistoryQuery;
use hub_telemetry::record_history_values_stored;
use serde::Deserialize;
use tracing::info;

/// 值数组或单个值。数组在前，空数组不会被当作全默认的单值。
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ThingValues {
    Many(Vec<ThingValue>),
    One(ThingValue),
}

impl ThingValues {
    pub fn into_vec(self) -> Vec<ThingValue> {
        match self {
            ThingValues::One(value) => vec![value],
            ThingValues::Many(values) => values,
        }
    }

    /// 展开为数组，并把 thingID 统一为 `thing_id`。
    pub fn into_values(self, thing_id: &str) -> Vec<ThingValue> {
        self.into_vec()
            .into_iter()
            .map(|mut value| {
                value.thing_id = thing_id.to_string();
                value
            })
            .collect()
    }
}

fn history_query(thing_id: String, params: HistoryQueryParams) -> HistoryQuery {
    HistoryQuery {
        thing_id,
        name: params.name.filter(|name| !name.is_empty()),
        after: params.after,
        before: params.before,
        limit: params.limit,
    }
}

pub async fn get_events(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(thing_id): Path<String>,
    Query(params): Query<HistoryQueryParams>,
) -> Response {
    let caller = Caller::from(user);
    if let Err(response) =
        require_thing_access(&state, &caller, &thing_id, false, MessageType::Event)
    {
        return response;
    }
    match state
        .history
        .get_event_history(&history_query(thing_id, params))
        .await
    {
        Ok(values) => ok(values),
        Err(err) => storage_error(err),
    }
}

pub async fn get_actions(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(thing_id): Path<String>,
    Query(params): Query<HistoryQueryParams>,
) -> Response {
    let caller = Caller::from(user);
    if let Err(response) =
        require_thing_access(&state, &caller, &thing_id, false, MessageType::Action)
    {
        return response;
    }
    match state
        .history
        .get_action_history(&history_query(thing_id, params))
        .await
    {
        Ok(values) => ok(values),
        Err(err) => storage_error(err),
    }
}

pub async fn get_latest(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(thing_id): Path<String>,
) -> Response {
    let caller = Caller::from(user);
    if let Err(response) =
        require_thing_access(&state, &caller, &thing_id, false, MessageType::Event)
    {
        return response;
    }
    match state.history.get_latest_values(&thing_id).await {
        Ok(latest) => ok(latest),
        Err(err) => storage_error(err),
    }
}

/// 记录消费者发出的动作请求
pub async fn post_action(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(thing_id): Path<String>,
    Json(mut value): Json<ThingValue>,
) -> Response {
    let caller = Caller::from(user);
    if let Err(response) =
        require_thing_access(&state, &caller, &thing_id, true, MessageType::Action)
    {
        return response;
    }
    value.thing_id = thing_id;
    match state.history.add_action(&value).await {
        Ok(()) => {
            record_history_values_stored(1);
            info!(
                target: "hub.api",
                thing_id = %value.thing_id,
                name = %value.name,
                login_id = %caller.login_id,
                "action_recorded"
            );
            ok(value)
        }
        Err(err) => storage_error(err),
    }
}

/// 设备上报事件
pub async fn post_events(
    State(state): State<AppState>,
    Extension(peer): Extension<PeerIdentity>,
    Path(thing_id): Path<String>,
    Json(values): Json<ThingValues>,
) -> Response {
    let caller = Caller::from(peer);
    if let Err(response) =
        require_thing_access(&state, &caller, &thing_id, true, MessageType::Event)
    {
        return response;
    }
    let values = values.into_values(&thing_id);
    match state.history.add_events(&values).await {
        Ok(stored) => {
            record_history_values_stored(stored as u64);
            ok(serde_json::json!({ "stored": stored }))
        }
        Err(err) => storage_error(err),
    }
}
