//! 内存存储实现模块
//!
//! 用于开发模式（未配置数据库）和测试。
//!
//! - HistoryStore: InMemoryHistoryStore

pub mod history;

pub use history::*;
