//! # Hub Storage 模块
//!
//! 历史库、目录库与持久化 JSON 映射。
//!
//! ## 模块说明
//!
//! - [`traits`]：`HistoryStore` 异步接口
//! - [`models`]：查询条件
//! - [`validation`]：写入前校验与时间戳解析
//! - [`in_memory`]：内存历史库（开发模式、测试）
//! - [`postgres`]：PostgreSQL 历史库（生产环境）
//! - [`json_map`]：带自动保存的 JSON 文件映射
//! - [`directory`]：TD 目录（列表、JSONPath 查询）
//! - [`app_config`]：按用户、按应用的配置文本
//!
//! ## 最新值索引
//!
//! 两种历史库实现都维护每个 Thing 一份 `name -> value` 文档，
//! 仅当新值 `created` 严格更大时覆盖，乱序写入不会回退最新值。
//! 启用 `scan-latest` 特性时另提供 `latest_values_by_scan`，
//! 通过扫描事件流推导同样的结果，仅用于正确性对比。

pub mod app_config;
pub mod connection;
pub mod directory;
pub mod error;
pub mod in_memory;
pub mod json_map;
pub mod models;
pub mod postgres;
pub mod traits;
pub mod validation;

pub use app_config::ConfigStore;
pub use connection::*;
pub use directory::{DEFAULT_PAGE_SIZE, DirectoryStore, IdFilter, MAX_PAGE_SIZE};
pub use error::*;
pub use in_memory::InMemoryHistoryStore;
pub use json_map::{DEFAULT_AUTOSAVE_INTERVAL, JsonMapStore};
pub use models::*;
pub use postgres::PgHistoryStore;
pub use traits::*;
