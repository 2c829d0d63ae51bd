//! # PostgreSQL 存储实现模块
//!
//! - **HistoryStore** (`history.rs`)：事件 / 动作流 + 每个 Thing 一行的最新值文档
//!
//! ## 数据库模式
//!
//! 见 `migrations/0001_history.sql`，也可在启动时调用
//! [`PgHistoryStore::ensure_schema`] 自动创建：
//!
//! - `hub_events` / `hub_actions`：只追加（`id` 递增即写入顺序）
//! - `hub_latest`：`thing_id -> jsonb`，按 `created` 条件更新
//!
//! 所有 SQL 使用参数绑定；批量写入在单个事务内完成。

pub mod history;

pub use history::*;
