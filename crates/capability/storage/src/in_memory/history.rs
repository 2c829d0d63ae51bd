//! 历史数据内存实现
//!
//! 事件 / 动作按 thingID 分片追加；最新值索引为每个 Thing 一份
//! `name -> value` 文档，在 DashMap 条目锁内比较并替换。

use crate::error::StorageError;
use crate::models::HistoryQuery;
use crate::traits::HistoryStore;
use crate::validation::{PreparedValue, parse_bound, prepare_value};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use domain::ThingValue;
use std::collections::{BTreeMap, HashMap};

type Stream = DashMap<String, Vec<PreparedValue>>;

/// 历史数据内存存储
#[derive(Default)]
pub struct InMemoryHistoryStore {
    events: Stream,
    actions: Stream,
    latest: DashMap<String, HashMap<String, PreparedValue>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 事件总数（用于测试）
    pub fn event_count(&self) -> usize {
        self.events.iter().map(|entry| entry.value().len()).sum()
    }

    fn append(stream: &Stream, prepared: PreparedValue) {
        stream
            .entry(prepared.value.thing_id.clone())
            .or_default()
            .push(prepared);
    }

    /// 仅当新值更新时替换；条目锁保证同一 Thing 的比较与替换是原子的。
    fn update_latest(&self, prepared: &PreparedValue) {
        let mut doc = self
            .latest
            .entry(prepared.value.thing_id.clone())
            .or_default();
        let newer = doc
            .get(&prepared.value.name)
            .is_none_or(|existing| prepared.created > existing.created);
        if newer {
            doc.insert(prepared.value.name.clone(), prepared.clone());
        }
    }

    fn query(stream: &Stream, query: &HistoryQuery) -> Result<Vec<ThingValue>, StorageError> {
        let after = parse_bound(query.after.as_deref())?;
        let before = parse_bound(query.before.as_deref())?;
        let Some(values) = stream.get(&query.thing_id) else {
            return Ok(Vec::new());
        };
        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(values
            .iter()
            .filter(|item| matches_window(item, query.name.as_deref(), after, before))
            .take(limit)
            .map(|item| item.value.clone())
            .collect())
    }

    /// 通过扫描事件流推导最新值（仅用于与索引结果对比）
    #[cfg(feature = "scan-latest")]
    pub fn latest_values_by_scan(&self, thing_id: &str) -> BTreeMap<String, ThingValue> {
        let mut latest: BTreeMap<String, &PreparedValue> = BTreeMap::new();
        let Some(values) = self.events.get(thing_id) else {
            return BTreeMap::new();
        };
        for item in values.iter() {
            let newer = latest
                .get(&item.value.name)
                .is_none_or(|existing| item.created > existing.created);
            if newer {
                latest.insert(item.value.name.clone(), item);
            }
        }
        latest
            .into_iter()
            .map(|(name, item)| (name, item.value.clone()))
            .collect()
    }
}

fn matches_window(
    item: &PreparedValue,
    name: Option<&str>,
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
) -> bool {
    if name.is_some_and(|name| name != item.value.name) {
        return false;
    }
    if after.is_some_and(|after| item.created <= after) {
        return false;
    }
    if before.is_some_and(|before| item.created >= before) {
        return false;
    }
    true
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn add_event(&self, value: &ThingValue) -> Result<(), StorageError> {
        let prepared = prepare_value(value)?;
        self.update_latest(&prepared);
        Self::append(&self.events, prepared);
        Ok(())
    }

    async fn add_events(&self, values: &[ThingValue]) -> Result<usize, StorageError> {
        let prepared = values
            .iter()
            .map(prepare_value)
            .collect::<Result<Vec<_>, _>>()?;
        let count = prepared.len();
        for item in prepared {
            self.update_latest(&item);
            Self::append(&self.events, item);
        }
        Ok(count)
    }

    async fn add_action(&self, value: &ThingValue) -> Result<(), StorageError> {
        let prepared = prepare_value(value)?;
        Self::append(&self.actions, prepared);
        Ok(())
    }

    async fn get_event_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError> {
        Self::query(&self.events, query)
    }

    async fn get_action_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError> {
        Self::query(&self.actions, query)
    }

    async fn get_latest_values(
        &self,
        thing_id: &str,
    ) -> Result<BTreeMap<String, ThingValue>, StorageError> {
        Ok(self
            .latest
            .get(thing_id)
            .map(|doc| {
                doc.iter()
                    .map(|(name, item)| (name.clone(), item.value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
