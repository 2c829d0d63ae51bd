//! 验证辅助函数
//!
//! - prepare_value：校验必填字段，补齐 created / valueID
//! - parse_timestamp：解析 RFC 3339 时间戳
//! - parse_bound：解析可选的查询时间边界

use crate::error::StorageError;
use chrono::{DateTime, SecondsFormat, Utc};
use domain::ThingValue;

/// 已校验的历史值及其解析后的时间戳。
#[derive(Debug, Clone)]
pub struct PreparedValue {
    pub value: ThingValue,
    pub created: DateTime<Utc>,
}

/// 校验并补齐待写入的值。
///
/// 缺少 `thingID` 或 `name` 返回校验错误；`created` 缺省为当前 UTC 时间，
/// `valueID` 缺省为新的 uuid。
pub fn prepare_value(value: &ThingValue) -> Result<PreparedValue, StorageError> {
    if value.thing_id.trim().is_empty() {
        return Err(StorageError::validation("thingID required"));
    }
    if value.name.trim().is_empty() {
        return Err(StorageError::validation("name required"));
    }
    let mut value = value.clone();
    let created = if value.created.is_empty() {
        let now = Utc::now();
        value.created = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        now
    } else {
        parse_timestamp(&value.created)?
    };
    if value.value_id.as_deref().is_none_or(str::is_empty) {
        value.value_id = Some(uuid::Uuid::new_v4().to_string());
    }
    Ok(PreparedValue { value, created })
}

/// 解析 RFC 3339 时间戳。
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| StorageError::validation(format!("invalid timestamp '{raw}': {err}")))
}

pub fn parse_bound(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StorageError> {
    match raw {
        Some(raw) if !raw.is_empty() => parse_timestamp(raw).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_bound, prepare_value};
    use domain::{ErrorKind, ThingValue};

    #[test]
    fn missing_fields_are_rejected() {
        let err = prepare_value(&ThingValue::new("", "temp", "1")).expect_err("thingID");
        assert_eq!(err.kind(), ErrorKind::Validation);
        let err = prepare_value(&ThingValue::new("t1", "", "1")).expect_err("name");
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn defaults_are_filled() {
        let prepared = prepare_value(&ThingValue::new("t1", "temp", "1")).expect("prepare");
        assert!(!prepared.value.created.is_empty());
        assert!(prepared.value.value_id.is_some());
    }

    #[test]
    fn offsets_are_normalised_for_comparison() {
        let a = prepare_value(
            &ThingValue::new("t1", "temp", "1").created_at("2024-01-01T10:00:00+02:00"),
        )
        .expect("a");
        let b = prepare_value(&ThingValue::new("t1", "temp", "1").created_at("2024-01-01T08:30:00Z"))
            .expect("b");
        assert!(b.created > a.created);
        assert_eq!(a.value.created, "2024-01-01T10:00:00+02:00");
    }

    #[test]
    fn bad_timestamps_are_rejected() {
        let err = prepare_value(&ThingValue::new("t1", "temp", "1").created_at("yesterday"))
            .expect_err("timestamp");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(parse_bound(Some("nope")).is_err());
        assert!(parse_bound(Some("")).expect("empty").is_none());
        assert!(parse_bound(None).expect("none").is_none());
    }
}
