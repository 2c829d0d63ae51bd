//! 目录存储：`thingID -> TD` 原样保存，支持分页列表与 JSONPath 查询。
//!
//! JSONPath 在 `{ thingID: TD }` 包装文档上求值，因此 `$.*` 匹配 TD 本身，
//! 例如 `$[?@.title == 'Lamp']`。解析结果按 thingID 缓存，
//! 更新或删除该 TD 时在同一把缓存写锁内失效。

use crate::error::StorageError;
use crate::json_map::JsonMapStore;
use serde_json::Value;
use serde_json::value::RawValue;
use serde_json_path::JsonPath;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

/// 默认分页大小（limit 为 0 时使用）。
pub const DEFAULT_PAGE_SIZE: usize = 100;
/// 单页上限。
pub const MAX_PAGE_SIZE: usize = 1000;

/// 调用方提供的 thingID 过滤器（通常是授权判断）。
pub type IdFilter<'a> = &'a (dyn Fn(&str) -> bool + Send + Sync);

pub struct DirectoryStore {
    map: JsonMapStore<Box<RawValue>>,
    parsed: RwLock<HashMap<String, Arc<Value>>>,
}

impl DirectoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Ok(Self {
            map: JsonMapStore::open(path)?,
            parsed: RwLock::new(HashMap::new()),
        })
    }

    /// 启动自动保存。
    pub fn start(&self, interval: Duration) -> Result<(), StorageError> {
        self.map.start(interval)
    }

    /// 停止自动保存并落盘。
    pub fn close(&self) -> Result<(), StorageError> {
        self.map.close()
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.map.flush()
    }

    pub fn count(&self) -> usize {
        self.map.len()
    }

    /// 保存 TD；内容必须是合法 JSON，原样保存。
    pub fn update_td(&self, thing_id: &str, td: &str) -> Result<(), StorageError> {
        if thing_id.trim().is_empty() {
            return Err(StorageError::validation("thingID required"));
        }
        let raw = RawValue::from_string(td.to_string())
            .map_err(|err| StorageError::validation(format!("invalid TD document: {err}")))?;
        let mut parsed = self
            .parsed
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        self.map.set(thing_id, raw)?;
        parsed.remove(thing_id);
        debug!(target: "hub.storage", thing_id, "td_updated");
        Ok(())
    }

    pub fn get_td(&self, thing_id: &str) -> Result<String, StorageError> {
        self.map
            .get(thing_id)?
            .map(|raw| raw.get().to_string())
            .ok_or_else(|| StorageError::not_found(format!("thing '{thing_id}' not found")))
    }

    /// 删除 TD；不存在时视为成功。
    pub fn remove_td(&self, thing_id: &str) -> Result<(), StorageError> {
        let mut parsed = self
            .parsed
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        self.map.remove(thing_id)?;
        parsed.remove(thing_id);
        Ok(())
    }

    /// 分页列出 TD。分页时（offset > 0 或 limit 小于总数）按 thingID 排序。
    pub fn list_tds(
        &self,
        limit: usize,
        offset: usize,
        id_filter: Option<IdFilter<'_>>,
    ) -> Result<Vec<String>, StorageError> {
        let limit = page_size(limit);
        self.map.read(|map| {
            let mut ids: Vec<&String> = map
                .keys()
                .filter(|id| id_filter.is_none_or(|filter| filter(id.as_str())))
                .collect();
            if offset > 0 || limit < ids.len() {
                ids.sort();
            }
            ids.into_iter()
                .skip(offset)
                .take(limit)
                .filter_map(|id| map.get(id))
                .map(|raw| raw.get().to_string())
                .collect()
        })
    }

    /// JSONPath 查询；先过滤再分页，结果按 thingID 排序。
    pub fn query_tds(
        &self,
        json_path: &str,
        limit: usize,
        offset: usize,
        id_filter: Option<IdFilter<'_>>,
    ) -> Result<Vec<String>, StorageError> {
        let path = JsonPath::parse(json_path)
            .map_err(|err| StorageError::validation(format!("invalid JSONPath: {err}")))?;
        let limit = page_size(limit);
        let mut ids = self.map.read(|map| {
            map.keys()
                .filter(|id| id_filter.is_none_or(|filter| filter(id.as_str())))
                .cloned()
                .collect::<Vec<_>>()
        })?;
        ids.sort();

        let mut matched = Vec::new();
        for id in ids {
            let Some(doc) = self.parsed_doc(&id)? else {
                continue;
            };
            if path.query(&doc).is_empty() {
                continue;
            }
            matched.push(id);
        }

        let mut items = Vec::new();
        for id in matched.into_iter().skip(offset).take(limit) {
            if let Some(raw) = self.map.get(&id)? {
                items.push(raw.get().to_string());
            }
        }
        Ok(items)
    }

    /// 解析后的包装文档；缓存未命中时在缓存写锁内解析并写入。
    fn parsed_doc(&self, thing_id: &str) -> Result<Option<Arc<Value>>, StorageError> {
        {
            let parsed = self
                .parsed
                .read()
                .map_err(|_| StorageError::new("lock failed"))?;
            if let Some(doc) = parsed.get(thing_id) {
                return Ok(Some(doc.clone()));
            }
        }
        let mut parsed = self
            .parsed
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        if let Some(doc) = parsed.get(thing_id) {
            return Ok(Some(doc.clone()));
        }
        let Some(raw) = self.map.get(thing_id)? else {
            return Ok(None);
        };
        let td: Value = serde_json::from_str(raw.get())?;
        let mut wrapper = serde_json::Map::new();
        wrapper.insert(thing_id.to_string(), td);
        let doc = Arc::new(Value::Object(wrapper));
        parsed.insert(thing_id.to_string(), doc.clone());
        Ok(Some(doc))
    }

    #[cfg(test)]
    fn cached(&self, thing_id: &str) -> bool {
        self.parsed
            .read()
            .map(|parsed| parsed.contains_key(thing_id))
            .unwrap_or(false)
    }
}

fn page_size(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        limit.min(MAX_PAGE_SIZE)
    }
}
