//! Thing 级授权：把调用方身份交给 [`Authenticator::authorize`]，
//! 拒绝时返回 403 并计数。

use crate::AppState;
use axum::response::Response;
use domain::MessageType;
use hub_server::{AuthenticatedUser, PeerIdentity, forbidden};
use hub_telemetry::record_authz_denial;
use tracing::info;

/// 调用方：JWT 用户（无 OU）或证书客户端（CN + OU）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub login_id: String,
    pub ou: Option<String>,
}

impl From<AuthenticatedUser> for Caller {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            login_id: user.login_id,
            ou: None,
        }
    }
}

impl From<PeerIdentity> for Caller {
    fn from(peer: PeerIdentity) -> Self {
        Self {
            login_id: peer.common_name,
            ou: peer.organizational_unit,
        }
    }
}

impl Caller {
    /// 仅判断是否允许，不记录拒绝（用于列表过滤）。
    pub fn can(&self, state: &AppState, thing_id: &str, writing: bool, kind: MessageType) -> bool {
        state
            .authenticator
            .authorize(&self.login_id, self.ou.as_deref(), thing_id, writing, kind)
            .is_ok()
    }
}

/// 要求调用方对 Thing 具有指定操作权限。
pub fn require_thing_access(
    state: &AppState,
    caller: &Caller,
    thing_id: &str,
    writing: bool,
    kind: MessageType,
) -> Result<(), Response> {
    state
        .authenticator
        .authorize(&caller.login_id, caller.ou.as_deref(), thing_id, writing, kind)
        .map_err(|err| {
            record_authz_denial();
            info!(
                target: "hub.api",
                login_id = %caller.login_id,
                thing_id,
                writing,
                message_type = kind.as_str(),
                error = %err,
                "authz_denied"
            );
            forbidden(err.to_string())
        })
}
