//! 存储接口 Trait 定义
//!
//! - HistoryStore：Thing 事件 / 动作历史与最新值索引
//!
//! 使用 async_trait 支持 `Arc<dyn HistoryStore>` 动态分发。

use crate::error::StorageError;
use crate::models::HistoryQuery;
use async_trait::async_trait;
use domain::ThingValue;
use std::collections::BTreeMap;

/// 历史存储接口
///
/// 事件与动作各为一条只追加的流；另维护按 `(thingID, name)` 的最新值索引，
/// 仅当新值的 `created` 严格更大时才覆盖。
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// 写入单个事件并更新最新值索引
    async fn add_event(&self, value: &ThingValue) -> Result<(), StorageError>;

    /// 批量写入事件；任一值校验失败时整批不写入
    async fn add_events(&self, values: &[ThingValue]) -> Result<usize, StorageError>;

    /// 写入动作
    async fn add_action(&self, value: &ThingValue) -> Result<(), StorageError>;

    /// 按写入顺序返回事件历史
    async fn get_event_history(&self, query: &HistoryQuery)
    -> Result<Vec<ThingValue>, StorageError>;

    /// 按写入顺序返回动作历史
    async fn get_action_history(
        &self,
        query: &HistoryQuery,
    ) -> Result<Vec<ThingValue>, StorageError>;

    /// 每个属性名的最新事件
    async fn get_latest_values(
        &self,
        thing_id: &str,
    ) -> Result<BTreeMap<String, ThingValue>, StorageError>;
}
