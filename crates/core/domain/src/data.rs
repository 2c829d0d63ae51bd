use serde::{Deserialize, Serialize};

/// 写入历史库的事件/动作值。
///
/// `created` 为 RFC 3339 时间戳；缺省时由存储层补齐为当前 UTC 时间。
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ThingValue {
    #[serde(rename = "thingID", default)]
    pub thing_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub created: String,
    #[serde(rename = "valueID", default, skip_serializing_if = "Option::is_none")]
    pub value_id: Option<String>,
    #[serde(rename = "actionID", default, skip_serializing_if = "Option::is_none")]
    pub action_id: Option<String>,
}

impl ThingValue {
    /// 以 thingID / name / value 构造，created 留空。
    pub fn new(
        thing_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            thing_id: thing_id.into(),
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }

    /// 指定 created 时间戳。
    pub fn created_at(mut self, created: impl Into<String>) -> Self {
        self.created = created.into();
        self
    }
}
