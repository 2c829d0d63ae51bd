//! 历史库连接池
//!
//! 写入路径是短事务（单值或一批事件），池不必很大；
//! 取连接超时按 `ErrorKind::Timeout` 上报，由调用方映射为 504。

use crate::error::StorageError;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// 连接池上限
pub const MAX_CONNECTIONS: u32 = 8;
/// 等待空闲连接的上限
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// 建立历史库连接池；连接以 `hub-history` 作为 application_name。
pub async fn connect_pool(database_url: &str) -> Result<PgPool, StorageError> {
    let options = PgConnectOptions::from_str(database_url)?.application_name("hub-history");
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(options)
        .await?;
    Ok(pool)
}
