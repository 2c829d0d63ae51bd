//! 通道：发布者 / 订阅者集合、有界消息队列与单个投递任务。
//!
//! 每个通道只有一个投递任务从队列取消息，因此同一通道内消息按入队顺序
//! 送达每个订阅者。队列满时发布者读取循环阻塞，形成背压。

use api_contract::BusFrame;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::SinkExt;
use futures::future::join_all;
use futures::stream::SplitSink;
use hub_telemetry::{record_message_delivered, record_subscriber_dropped};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// 单次写订阅者的超时；超时视为写失败。
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// 一条已升级的 WebSocket 连接（写半部）。
pub(crate) struct Connection {
    pub(crate) id: u64,
    pub(crate) client_id: String,
    sink: tokio::sync::Mutex<SplitSink<WebSocket, Message>>,
}

impl Connection {
    pub(crate) fn new(id: u64, client_id: String, sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            id,
            client_id,
            sink: tokio::sync::Mutex::new(sink),
        }
    }

    pub(crate) async fn send_text(&self, text: String) -> Result<(), String> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(WRITE_TIMEOUT, sink.send(Message::Text(text))).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(_) => Err("write timed out".to_string()),
        }
    }

    /// 发送关闭帧并关闭写半部；对端已断开时忽略错误。
    pub(crate) async fn close(&self, code: u16, reason: &'static str) {
        let mut sink = self.sink.lock().await;
        let frame = CloseFrame {
            code,
            reason: reason.into(),
        };
        let _ = sink.send(Message::Close(Some(frame))).await;
        let _ = sink.close().await;
    }
}

/// 订阅者的帧格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Framing {
    /// `/channel/{id}/sub`：原样转发消息体。
    Raw,
    /// `/bus`：包装为 `receive` 帧。
    Bus,
}

impl Framing {
    fn encode(self, channel_id: &str, payload: &str) -> Option<String> {
        match self {
            Framing::Raw => Some(payload.to_string()),
            Framing::Bus => {
                let frame = BusFrame::Receive {
                    channel: channel_id.to_string(),
                    payload: payload.to_string(),
                };
                match serde_json::to_string(&frame) {
                    Ok(text) => Some(text),
                    Err(err) => {
                        warn!(target: "hub.broker", channel_id, error = %err, "bus_frame_encode_failed");
                        None
                    }
                }
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct Subscriber {
    connection: Arc<Connection>,
    framing: Framing,
}

#[derive(Default)]
struct Members {
    publishers: HashMap<u64, Arc<Connection>>,
    subscribers: HashMap<u64, Subscriber>,
}

pub(crate) struct Channel {
    id: String,
    members: Mutex<Members>,
    queue: Mutex<Option<mpsc::Sender<String>>>,
    message_count: AtomicU64,
}

impl Channel {
    /// 创建通道并启动其投递任务；需在 tokio 运行时内调用。
    pub(crate) fn spawn(id: &str, queue_depth: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let channel = Arc::new(Self {
            id: id.to_string(),
            members: Mutex::new(Members::default()),
            queue: Mutex::new(Some(sender)),
            message_count: AtomicU64::new(0),
        });
        tokio::spawn(deliver(channel.clone(), receiver));
        info!(target: "hub.broker", channel_id = id, queue_depth, "channel_created");
        channel
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }

    pub(crate) fn add_publisher(&self, connection: Arc<Connection>) {
        if let Ok(mut members) = self.members.lock() {
            members.publishers.insert(connection.id, connection);
        }
    }

    pub(crate) fn remove_publisher(&self, connection_id: u64) {
        if let Ok(mut members) = self.members.lock() {
            members.publishers.remove(&connection_id);
        }
    }

    pub(crate) fn add_subscriber(&self, connection: Arc<Connection>, framing: Framing) {
        if let Ok(mut members) = self.members.lock() {
            members
                .subscribers
                .insert(connection.id, Subscriber { connection, framing });
        }
    }

    pub(crate) fn remove_subscriber(&self, connection_id: u64) -> bool {
        match self.members.lock() {
            Ok(mut members) => members.subscribers.remove(&connection_id).is_some(),
            Err(_) => false,
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.members
            .lock()
            .map(|members| members.subscribers.len())
            .unwrap_or_default()
    }

    pub(crate) fn publisher_count(&self) -> usize {
        self.members
            .lock()
            .map(|members| members.publishers.len())
            .unwrap_or_default()
    }

    fn subscribers(&self) -> Vec<Subscriber> {
        self.members
            .lock()
            .map(|members| members.subscribers.values().cloned().collect())
            .unwrap_or_default()
    }

    fn sender(&self) -> Option<mpsc::Sender<String>> {
        self.queue.lock().ok().and_then(|queue| queue.clone())
    }

    /// 消息入队并计数；队列满时等待。通道已关闭时返回 false。
    pub(crate) async fn enqueue(&self, payload: String) -> bool {
        let Some(sender) = self.sender() else {
            return false;
        };
        if sender.send(payload).await.is_err() {
            return false;
        }
        self.message_count.fetch_add(1, Ordering::Relaxed);
        hub_telemetry::record_message_published();
        true
    }

    /// 关闭队列，投递任务处理完剩余消息后退出。
    pub(crate) fn close_queue(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.take();
        }
    }
}

/// 投递任务：按序取消息，并发写给当时的全部订阅者；写失败的订阅者被移除并关闭。
///
/// 一条消息写完所有订阅者后才取下一条，同一订阅者看到的顺序不变；
/// 单个停滞的订阅者最多拖慢本条消息一个写超时。
async fn deliver(channel: Arc<Channel>, mut receiver: mpsc::Receiver<String>) {
    while let Some(payload) = receiver.recv().await {
        let subscribers = channel.subscribers();
        if subscribers.is_empty() {
            debug!(target: "hub.broker", channel_id = %channel.id, "message_discarded");
            continue;
        }
        let sends = subscribers.into_iter().filter_map(|subscriber| {
            let frame = subscriber.framing.encode(&channel.id, &payload)?;
            Some(async move {
                let outcome = subscriber.connection.send_text(frame).await;
                (subscriber, outcome)
            })
        });
        for (subscriber, outcome) in join_all(sends).await {
            match outcome {
                Ok(()) => record_message_delivered(),
                Err(err) => drop_subscriber(&channel, &subscriber, &err).await,
            }
        }
    }
    debug!(target: "hub.broker", channel_id = %channel.id, "channel_worker_stopped");
}

async fn drop_subscriber(channel: &Channel, subscriber: &Subscriber, err: &str) {
    channel.remove_subscriber(subscriber.connection.id);
    record_subscriber_dropped();
    info!(
        target: "hub.broker",
        channel_id = %channel.id,
        client_id = %subscriber.connection.client_id,
        error = %err,
        "subscriber_dropped"
    );
    subscriber
        .connection
        .close(axum::extract::ws::close_code::ERROR, "write failed")
        .await;
}
