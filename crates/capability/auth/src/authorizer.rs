//! 认证与授权：把口令库、ACL 与证书 OU 组合成访问判断。

use crate::{AclStore, AuthError, AuthzError, CredentialStore, verify_hash};
use domain::{MessageType, OU_ADMIN, OU_IOT_DEVICE, OU_PLUGIN, Role, ThingId};
use std::sync::Arc;
use tracing::debug;

/// 认证器。
pub struct Authenticator {
    credentials: Arc<CredentialStore>,
    acl: Arc<AclStore>,
}

impl Authenticator {
    pub fn new(credentials: Arc<CredentialStore>, acl: Arc<AclStore>) -> Self {
        Self { credentials, acl }
    }

    /// 校验登录口令。
    pub fn verify_login(&self, login_id: &str, password: &str) -> Result<(), AuthError> {
        let Some(hash) = self.credentials.get_hash(login_id) else {
            return Err(AuthError::InvalidCredentials);
        };
        if verify_hash(&hash, password) {
            Ok(())
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// 判断 `login_id`（可带证书 OU）能否对 Thing 执行读/写。
    pub fn authorize(
        &self,
        login_id: &str,
        ou: Option<&str>,
        thing_id: &str,
        writing: bool,
        message_type: MessageType,
    ) -> Result<(), AuthzError> {
        match ou {
            Some(OU_PLUGIN) | Some(OU_ADMIN) => return Ok(()),
            Some(OU_IOT_DEVICE) => {
                let parsed = ThingId::parse(thing_id);
                return if parsed.publisher() == Some(login_id) {
                    Ok(())
                } else {
                    Err(AuthzError::CrossPublisher {
                        login_id: login_id.to_string(),
                        thing_id: thing_id.to_string(),
                    })
                };
            }
            _ => {}
        }

        let snapshot = self.acl.snapshot();
        let groups = snapshot.thing_groups(thing_id);
        if groups.is_empty() {
            return Err(AuthzError::NotInGroup {
                thing_id: thing_id.to_string(),
            });
        }
        let role = snapshot.highest_role(login_id, &groups);
        debug!(
            target: "hub.auth",
            login_id,
            thing_id,
            role = %role,
            writing,
            message_type = message_type.as_str(),
            "authorize"
        );
        if permits(role, writing, message_type) {
            Ok(())
        } else {
            Err(AuthzError::RoleTooLow {
                login_id: login_id.to_string(),
                thing_id: thing_id.to_string(),
                role,
                operation: format!(
                    "{} {}",
                    if writing { "write" } else { "read" },
                    message_type.as_str()
                ),
            })
        }
    }
}

/// 角色权限表。
pub fn permits(role: Role, writing: bool, message_type: MessageType) -> bool {
    if role == Role::Thing {
        return true;
    }
    if !writing {
        return role.is_at_least(Role::Viewer);
    }
    match message_type {
        MessageType::Action => role.is_at_least(Role::Editor),
        MessageType::Configure => role == Role::Manager,
        MessageType::Td | MessageType::Event => false,
    }
}
