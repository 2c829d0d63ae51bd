//! 分组角色。
//!
//! 消费者角色按权限升序排列：`none < viewer < editor < manager`。
//! `thing` 标记 IoT 设备，不参与消费者阶梯比较。

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    None,
    Viewer,
    Editor,
    Manager,
    Thing,
}

impl Role {
    /// 解析角色名；未知角色视为 `none`。
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "viewer" => Role::Viewer,
            "editor" => Role::Editor,
            "manager" => Role::Manager,
            "thing" => Role::Thing,
            _ => Role::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::None => "none",
            Role::Viewer => "viewer",
            Role::Editor => "editor",
            Role::Manager => "manager",
            Role::Thing => "thing",
        }
    }

    /// `self >= min`：
    /// 相等、`min` 为 none、`min` 为 viewer 且 `self` 非 none、`min` 为 editor 且 `self` 为 manager。
    pub fn is_at_least(&self, min: Role) -> bool {
        *self == min
            || min == Role::None
            || (min == Role::Viewer && *self != Role::None)
            || (min == Role::Editor && *self == Role::Manager)
    }

    /// 在多个角色中取上确界。`thing` 拥有全部权限，优先于消费者阶梯。
    pub fn supremum(roles: impl IntoIterator<Item = Role>) -> Role {
        roles.into_iter().fold(Role::None, |best, role| {
            if best == Role::Thing || role == Role::Thing {
                Role::Thing
            } else if role.ladder_rank() > best.ladder_rank() {
                role
            } else {
                best
            }
        })
    }

    fn ladder_rank(&self) -> u8 {
        match self {
            Role::None => 0,
            Role::Viewer => 1,
            Role::Editor => 2,
            Role::Manager => 3,
            Role::Thing => 4,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
