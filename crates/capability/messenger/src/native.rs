//! 原生后端：通过 `/bus` 复用连接与通道服务通信。

use crate::subscriptions::SubscriptionTable;
use crate::{MessageHandler, Messenger, MessengerError, split_host_port};
use api_contract::BusFrame;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use rustls::ClientConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{WebSocketStream, client_async};
use tracing::{debug, info, warn};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

trait BusIo: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> BusIo for T {}

type BusSocket = WebSocketStream<Box<dyn BusIo>>;

/// 原生后端连接参数。
#[derive(Clone, Default)]
pub struct NativeOptions {
    /// TLS 客户端配置（含客户端证书）；为空时使用明文连接。
    pub tls: Option<Arc<ClientConfig>>,
    /// 明文模式下的 Basic 认证 token。
    pub token: Option<String>,
}

struct Link {
    sink: tokio::sync::Mutex<SplitSink<BusSocket, Message>>,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Link {
    async fn send(&self, frame: &BusFrame) -> Result<(), MessengerError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(MessengerError::NoConnection);
        }
        let text = serde_json::to_string(frame)
            .map_err(|err| MessengerError::InvalidPayload(err.to_string()))?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text)).await.map_err(|err| {
            self.alive.store(false, Ordering::SeqCst);
            MessengerError::Transport(err.to_string())
        })
    }

    /// 在新连接上重放全部订阅。
    async fn replay(&self, channels: &[String]) -> Result<(), MessengerError> {
        for channel in channels {
            self.send(&BusFrame::Subscribe {
                channel: channel.clone(),
            })
            .await?;
        }
        Ok(())
    }
}

/// 原生通道服务客户端。
pub struct NativeMessenger {
    options: NativeOptions,
    subscriptions: Arc<SubscriptionTable>,
    link: Mutex<Option<Arc<Link>>>,
}

impl NativeMessenger {
    pub fn new(options: NativeOptions) -> Self {
        Self {
            options,
            subscriptions: Arc::new(SubscriptionTable::default()),
            link: Mutex::new(None),
        }
    }

    fn current_link(&self) -> Option<Arc<Link>> {
        match self.link.lock() {
            Ok(link) => link.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn replace_link(&self, next: Option<Arc<Link>>) -> Option<Arc<Link>> {
        match self.link.lock() {
            Ok(mut link) => std::mem::replace(&mut *link, next),
            Err(poisoned) => std::mem::replace(&mut *poisoned.into_inner(), next),
        }
    }

    async fn send_frame(&self, frame: &BusFrame) -> Result<(), MessengerError> {
        let link = self.current_link().ok_or(MessengerError::NoConnection)?;
        link.send(frame).await
    }

    async fn open(&self, host_port: &str, client_id: &str) -> Result<Link, MessengerError> {
        let tls = self.options.tls.clone();
        let default_port = if tls.is_some() { 443 } else { 80 };
        let (host, port) = split_host_port(host_port, default_port)?;
        let tcp = TcpStream::connect((host.as_str(), port))
            .await
            .map_err(|err| MessengerError::Transport(err.to_string()))?;
        let io: Box<dyn BusIo> = match tls {
            Some(config) => {
                let stream = TlsConnector::from(config)
                    .connect(hub_server::tls::server_name(&host)?, tcp)
                    .await
                    .map_err(|err| MessengerError::Transport(err.to_string()))?;
                Box::new(stream)
            }
            None => Box::new(tcp),
        };

        let scheme = if self.options.tls.is_some() { "wss" } else { "ws" };
        let mut request = format!("{scheme}://{host}:{port}/bus")
            .into_client_request()
            .map_err(|err| MessengerError::InvalidAddress(err.to_string()))?;
        let headers = request.headers_mut();
        headers.insert(
            "client",
            HeaderValue::from_str(client_id)
                .map_err(|err| MessengerError::InvalidAddress(err.to_string()))?,
        );
        if let Some(token) = &self.options.token {
            let credentials = STANDARD.encode(format!("{client_id}:{token}"));
            headers.insert(
                "authorization",
                HeaderValue::from_str(&format!("Basic {credentials}"))
                    .map_err(|err| MessengerError::InvalidAddress(err.to_string()))?,
            );
        }

        let (socket, _) = client_async(request, io)
            .await
            .map_err(|err| MessengerError::Transport(err.to_string()))?;
        let (sink, stream) = socket.split();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_loop(stream, self.subscriptions.clone(), alive.clone()));
        Ok(Link {
            sink: tokio::sync::Mutex::new(sink),
            alive,
            reader,
        })
    }

    async fn close_link(link: Arc<Link>) {
        link.alive.store(false, Ordering::SeqCst);
        let mut sink = link.sink.lock().await;
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await;
        link.reader.abort();
    }
}

impl Default for NativeMessenger {
    fn default() -> Self {
        Self::new(NativeOptions::default())
    }
}

#[async_trait]
impl Messenger for NativeMessenger {
    async fn connect(
        &self,
        host_port: &str,
        client_id: &str,
        timeout: Duration,
    ) -> Result<(), MessengerError> {
        if let Some(previous) = self.replace_link(None) {
            Self::close_link(previous).await;
        }
        let link = tokio::time::timeout(timeout, self.open(host_port, client_id))
            .await
            .map_err(|_| MessengerError::Timeout(host_port.to_string()))??;
        let link = Arc::new(link);
        // 订阅重放成功后才安装新连接
        let channels = self.subscriptions.channels();
        let replayed = match tokio::time::timeout(timeout, link.replay(&channels)).await {
            Ok(result) => result,
            Err(_) => Err(MessengerError::Timeout(host_port.to_string())),
        };
        if let Err(err) = replayed {
            warn!(target: "hub.messenger", host_port, error = %err, "bus_replay_failed");
            Self::close_link(link).await;
            return Err(err);
        }
        self.replace_link(Some(link));
        info!(
            target: "hub.messenger",
            host_port,
            client_id,
            subscriptions = channels.len(),
            "bus_connected"
        );
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(link) = self.replace_link(None) {
            Self::close_link(link).await;
            info!(target: "hub.messenger", "bus_disconnected");
        }
    }

    async fn publish(&self, channel_id: &str, payload: &[u8]) -> Result<(), MessengerError> {
        let payload = std::str::from_utf8(payload)
            .map_err(|err| MessengerError::InvalidPayload(err.to_string()))?;
        self.send_frame(&BusFrame::Publish {
            channel: channel_id.to_string(),
            payload: payload.to_string(),
        })
        .await
    }

    async fn subscribe(
        &self,
        channel_id: &str,
        handler: MessageHandler,
    ) -> Result<(), MessengerError> {
        self.subscriptions.set(channel_id, handler);
        if !self.is_connected() {
            debug!(target: "hub.messenger", channel_id, "subscription_buffered");
            return Ok(());
        }
        self.send_frame(&BusFrame::Subscribe {
            channel: channel_id.to_string(),
        })
        .await
    }

    async fn unsubscribe(&self, channel_id: &str) -> Result<(), MessengerError> {
        self.subscriptions.remove(channel_id);
        if !self.is_connected() {
            return Ok(());
        }
        self.send_frame(&BusFrame::Unsubscribe {
            channel: channel_id.to_string(),
        })
        .await
    }

    fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.channels()
    }

    fn is_connected(&self) -> bool {
        self.current_link()
            .map(|link| link.alive.load(Ordering::SeqCst))
            .unwrap_or(false)
    }
}

/// 接收循环：把 `receive` 帧分发给对应 handler；连接结束时标记断开。
async fn read_loop(
    mut stream: SplitStream<BusSocket>,
    subscriptions: Arc<SubscriptionTable>,
    alive: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!(target: "hub.messenger", error = %err, "bus_read_failed");
                break;
            }
        };
        match serde_json::from_str::<BusFrame>(&text) {
            Ok(BusFrame::Receive { channel, payload }) => {
                if !subscriptions.dispatch(&channel, payload.as_bytes()) {
                    warn!(target: "hub.messenger", channel_id = %channel, "message_for_unknown_channel");
                }
            }
            Ok(_) => warn!(target: "hub.messenger", "unexpected_bus_frame"),
            Err(err) => warn!(target: "hub.messenger", error = %err, "bus_frame_invalid"),
        }
    }
    alive.store(false, Ordering::SeqCst);
    info!(target: "hub.messenger", "bus_connection_closed");
}
