//! 消息通道服务：生命周期、通道表与路由。

use crate::BrokerError;
use crate::auth::{BrokerAuth, authenticate};
use crate::channel::Channel;
use crate::socket::{bus_socket, channel_socket};
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use dashmap::DashMap;
use hub_server::{Transport, request_context, serve};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// 每个通道的默认队列深度。
pub const DEFAULT_QUEUE_DEPTH: usize = 10;

/// 通道服务配置。
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub queue_depth: usize,
    /// 明文模式下的 `clientID -> token` 静态表。
    pub clients: HashMap<String, String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            clients: HashMap::new(),
        }
    }
}

pub(crate) struct BrokerShared {
    config: BrokerConfig,
    channels: DashMap<String, Arc<Channel>>,
    next_connection_id: AtomicU64,
    /// 当前运行周期的连接取消令牌；stop 时触发以关闭全部连接。
    connections: RwLock<CancellationToken>,
}

impl BrokerShared {
    /// 取得通道；首次引用时创建。
    pub(crate) fn channel(&self, channel_id: &str) -> Arc<Channel> {
        if let Some(channel) = self.channels.get(channel_id) {
            return channel.value().clone();
        }
        self.channels
            .entry(channel_id.to_string())
            .or_insert_with(|| Channel::spawn(channel_id, self.config.queue_depth))
            .value()
            .clone()
    }

    pub(crate) fn existing(&self, channel_id: &str) -> Option<Arc<Channel>> {
        self.channels
            .get(channel_id)
            .map(|channel| channel.value().clone())
    }

    pub(crate) fn next_connection_id(&self) -> u64 {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn connection_token(&self) -> CancellationToken {
        match self.connections.read() {
            Ok(token) => token.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

struct Running {
    listener: CancellationToken,
    connections: CancellationToken,
    task: JoinHandle<Result<(), hub_server::ServerError>>,
}

/// WebSocket 通道服务。
///
/// 发布者连 `/channel/{id}/pub`，订阅者连 `/channel/{id}/sub`；
/// 复用连接使用 `/bus` 的 JSON 帧。通道在首次引用时创建，运行期间不销毁。
pub struct ChannelBroker {
    shared: Arc<BrokerShared>,
    running: Mutex<Option<Running>>,
}

impl ChannelBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            shared: Arc::new(BrokerShared {
                config,
                channels: DashMap::new(),
                next_connection_id: AtomicU64::new(1),
                connections: RwLock::new(CancellationToken::new()),
            }),
            running: Mutex::new(None),
        }
    }

    /// 通道路由；`tls` 决定以证书 CN 还是 Basic 头认证客户端。
    pub fn router(&self, tls: bool) -> Router {
        let auth = Arc::new(BrokerAuth {
            tls,
            clients: self.shared.config.clients.clone(),
        });
        Router::new()
            .route("/channel/:channel_id/:stage", get(channel_socket))
            .route("/bus", get(bus_socket))
            .route_layer(from_fn_with_state(auth, authenticate))
            .layer(axum::middleware::from_fn(request_context))
            .with_state(self.shared.clone())
    }

    /// 在给定监听上启动；已在运行时返回 `AlreadyRunning`。
    pub fn start(
        &self,
        listener: TcpListener,
        transport: Transport,
    ) -> Result<SocketAddr, BrokerError> {
        let mut running = match self.running.lock() {
            Ok(running) => running,
            Err(poisoned) => poisoned.into_inner(),
        };
        if running.is_some() {
            return Err(BrokerError::AlreadyRunning);
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(BrokerError::NoRuntime);
        }
        let addr = listener.local_addr()?;
        let tls = matches!(transport, Transport::Tls(_));
        let connections = CancellationToken::new();
        match self.shared.connections.write() {
            Ok(mut token) => *token = connections.clone(),
            Err(poisoned) => *poisoned.into_inner() = connections.clone(),
        }
        let listener_token = CancellationToken::new();
        let router = self.router(tls);
        let task = tokio::spawn(serve(listener, transport, router, listener_token.clone()));
        info!(target: "hub.broker", addr = %addr, tls, "broker_started");
        *running = Some(Running {
            listener: listener_token,
            connections,
            task,
        });
        Ok(addr)
    }

    /// 关闭全部连接与通道队列，再关闭监听。未运行时为空操作。
    pub async fn stop(&self) {
        let running = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(running) = running else {
            return;
        };
        running.connections.cancel();
        for channel in self.shared.channels.iter() {
            channel.value().close_queue();
        }
        self.shared.channels.clear();
        running.listener.cancel();
        match running.task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(target: "hub.broker", error = %err, "broker_serve_failed"),
            Err(err) => warn!(target: "hub.broker", error = %err, "broker_task_failed"),
        }
        info!(target: "hub.broker", "broker_stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    /// 通道已入队的消息数；通道不存在时为 0。
    pub fn message_count(&self, channel_id: &str) -> u64 {
        self.shared
            .existing(channel_id)
            .map(|channel| channel.message_count())
            .unwrap_or(0)
    }

    pub fn subscriber_count(&self, channel_id: &str) -> usize {
        self.shared
            .existing(channel_id)
            .map(|channel| channel.subscriber_count())
            .unwrap_or(0)
    }

    pub fn publisher_count(&self, channel_id: &str) -> usize {
        self.shared
            .existing(channel_id)
            .map(|channel| channel.publisher_count())
            .unwrap_or(0)
    }

    /// 已创建的通道 ID（排序）。
    pub fn channel_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .shared
            .channels
            .iter()
            .map(|channel| channel.value().id().to_string())
            .collect();
        ids.sort();
        ids
    }
}
