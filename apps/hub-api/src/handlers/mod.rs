//! Handlers 模块

pub mod app_config;
pub mod auth;
pub mod directory;
pub mod history;
pub mod metrics;

pub use app_config::*;
pub use auth::*;
pub use directory::*;
pub use history::*;
pub use metrics::*;
