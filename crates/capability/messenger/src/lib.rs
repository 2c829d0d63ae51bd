//! 统一的发布 / 订阅客户端，两种后端：
//!
//! - [`NativeMessenger`]：连接通道服务 `/bus`，单条 WebSocket 复用全部通道
//! - [`MqttMessenger`]：MQTT（QoS 1），断线指数退避重连（上限 60s）
//!
//! 两种后端在断开后保留订阅表，重新连接时自动重新订阅。

mod error;
mod mqtt;
mod native;
mod subscriptions;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub use error::MessengerError;
pub use mqtt::{MAX_RECONNECT_BACKOFF, MqttMessenger};
pub use native::{NativeMessenger, NativeOptions};

/// 收到消息时的回调：`(channelID, payload)`。在接收循环中同步调用，不得长时间阻塞。
pub type MessageHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// 发布 / 订阅客户端。
#[async_trait]
pub trait Messenger: Send + Sync {
    /// 建立连接；已连接时先断开旧连接再重连，并重放订阅。
    async fn connect(
        &self,
        host_port: &str,
        client_id: &str,
        timeout: Duration,
    ) -> Result<(), MessengerError>;

    /// 关闭连接；订阅表保留。
    async fn disconnect(&self);

    /// 发布消息；未连接时返回 `NoConnection`。
    async fn publish(&self, channel_id: &str, payload: &[u8]) -> Result<(), MessengerError>;

    /// 订阅通道，替换该通道已有的 handler。未连接时只记录，连接后生效。
    async fn subscribe(
        &self,
        channel_id: &str,
        handler: MessageHandler,
    ) -> Result<(), MessengerError>;

    async fn unsubscribe(&self, channel_id: &str) -> Result<(), MessengerError>;

    /// 当前订阅的通道（排序）。
    fn subscriptions(&self) -> Vec<String>;

    fn is_connected(&self) -> bool;
}

/// 拆分 `host:port`；缺省端口时使用 `default_port`。
pub(crate) fn split_host_port(
    host_port: &str,
    default_port: u16,
) -> Result<(String, u16), MessengerError> {
    let invalid = || MessengerError::InvalidAddress(host_port.to_string());
    match host_port.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
        }
        Some(_) => Err(invalid()),
        None if host_port.is_empty() => Err(invalid()),
        None => Ok((host_port.to_string(), default_port)),
    }
}

#[cfg(test)]
mod tests {
    use super::split_host_port;

    #[test]
    fn host_port_parsing() {
        assert_eq!(
            split_host_port("localhost:9678", 1).expect("parse"),
            ("localhost".to_string(), 9678)
        );
        assert_eq!(
            split_host_port("broker.local", 1883).expect("parse"),
            ("broker.local".to_string(), 1883)
        );
        assert!(split_host_port(":80", 1).is_err());
        assert!(split_host_port("host:port", 1).is_err());
        assert!(split_host_port("", 1).is_err());
    }
}
