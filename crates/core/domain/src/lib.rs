//! Hub 领域模型：Thing 标识、角色、消息类型与错误分类。

pub mod data;
pub mod error;
pub mod role;
pub mod thing;

pub use data::ThingValue;
pub use error::ErrorKind;
pub use role::Role;
pub use thing::{MessageType, ThingId};

/// 证书 OU：插件服务。
pub const OU_PLUGIN: &str = "plugin";
/// 证书 OU：管理员。
pub const OU_ADMIN: &str = "admin";
/// 证书 OU：IoT 设备（只能发布自身 Thing）。
pub const OU_IOT_DEVICE: &str = "iot-device";

/// 隐式分组：ACL 中存在该分组时，所有 Thing 视为其成员。
pub const ALL_GROUP: &str = "all";
