use serde::{Deserialize, Serialize};

/// 授权判断所用的消息类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Td,
    Configure,
    Event,
    Action,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Td => "td",
            MessageType::Configure => "configure",
            MessageType::Event => "event",
            MessageType::Action => "action",
        }
    }
}

/// 已拆分的 Thing 标识。
///
/// 规范形式为 `urn:<zone>:<publisherID>:<deviceID>[:<deviceType>]`，
/// 四段形式 `urn:zone:publisher:device` 同样带发布者。
/// 更短的形式（`urn:device:type`、`urn:device`）或非 urn 标识不含发布者段。
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThingId {
    pub zone: String,
    pub publisher: String,
    pub device_id: String,
    pub device_type: String,
}

impl ThingId {
    pub fn parse(thing_id: &str) -> Self {
        let parts: Vec<&str> = thing_id.split(':').collect();
        if parts.len() < 2 || !parts[0].eq_ignore_ascii_case("urn") {
            return Self {
                device_id: thing_id.to_string(),
                ..Self::default()
            };
        }
        match parts.len() {
            2 => Self {
                device_id: parts[1].to_string(),
                ..Self::default()
            },
            3 => Self {
                device_id: parts[1].to_string(),
                device_type: parts[2].to_string(),
                ..Self::default()
            },
            4 => Self {
                zone: parts[1].to_string(),
                publisher: parts[2].to_string(),
                device_id: parts[3].to_string(),
                device_type: String::new(),
            },
            _ => Self {
                zone: parts[1].to_string(),
                publisher: parts[2].to_string(),
                device_id: parts[3].to_string(),
                device_type: parts[4..].join(":"),
            },
        }
    }

    /// 发布者段；无发布者时返回 None。
    pub fn publisher(&self) -> Option<&str> {
        if self.publisher.is_empty() {
            None
        } else {
            Some(&self.publisher)
        }
    }

    /// 组合规范形式的 Thing 标识。
    pub fn format(zone: &str, publisher: &str, device_id: &str, device_type: &str) -> String {
        if device_type.is_empty() {
            format!("urn:{zone}:{publisher}:{device_id}")
        } else {
            format!("urn:{zone}:{publisher}:{device_id}:{device_type}")
        }
    }
}
