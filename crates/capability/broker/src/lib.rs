//! WebSocket 消息通道服务。
//!
//! - 发布 / 订阅：`/channel/{channelID}/pub`、`/channel/{channelID}/sub`
//! - 复用连接：`/bus`（`subscribe` / `unsubscribe` / `publish` / `receive` JSON 帧）
//! - 认证：TLS 下取客户端证书 CN，明文下校验 Basic 头与静态 token 表

mod auth;
mod broker;
mod channel;
mod error;
mod socket;

pub use auth::{ClientId, basic_credentials, basic_header};
pub use broker::{BrokerConfig, ChannelBroker, DEFAULT_QUEUE_DEPTH};
pub use error::BrokerError;
