//! WebSocket 连接处理：原始发布 / 订阅连接与 `/bus` 复用连接。

use crate::ClientId;
use crate::broker::BrokerShared;
use crate::channel::{Channel, Connection, Framing};
use api_contract::BusFrame;
use axum::Extension;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::StreamExt;
use futures::stream::SplitStream;
use hub_server::not_found;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const STOP_REASON: &str = "broker stopping";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Publish,
    Subscribe,
}

pub(crate) async fn channel_socket(
    State(shared): State<Arc<BrokerShared>>,
    Path((channel_id, stage)): Path<(String, String)>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    upgrade: WebSocketUpgrade,
) -> Response {
    let stage = match stage.as_str() {
        "pub" => Stage::Publish,
        "sub" => Stage::Subscribe,
        _ => return not_found(format!("unknown channel stage {stage}")),
    };
    upgrade.on_upgrade(move |socket| async move {
        let channel = shared.channel(&channel_id);
        let cancel = shared.connection_token();
        let (sink, stream) = socket.split();
        let connection = Arc::new(Connection::new(
            shared.next_connection_id(),
            client_id,
            sink,
        ));
        match stage {
            Stage::Publish => publisher_loop(channel, connection, stream, cancel).await,
            Stage::Subscribe => subscriber_loop(channel, connection, stream, cancel).await,
        }
    })
}

pub(crate) async fn bus_socket(
    State(shared): State<Arc<BrokerShared>>,
    Extension(ClientId(client_id)): Extension<ClientId>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| async move {
        let cancel = shared.connection_token();
        let (sink, stream) = socket.split();
        let connection = Arc::new(Connection::new(
            shared.next_connection_id(),
            client_id,
            sink,
        ));
        bus_loop(shared, connection, stream, cancel).await;
    })
}

/// 读取下一条消息；连接取消时发送正常关闭帧并返回 None。
async fn next_message(
    connection: &Connection,
    stream: &mut SplitStream<WebSocket>,
    cancel: &CancellationToken,
) -> Option<Message> {
    let message = tokio::select! {
        _ = cancel.cancelled() => {
            connection.close(close_code::NORMAL, STOP_REASON).await;
            return None;
        }
        message = stream.next() => message,
    };
    match message {
        Some(Ok(Message::Close(_))) | None => None,
        Some(Ok(message)) => Some(message),
        Some(Err(err)) => {
            info!(
                target: "hub.broker",
                client_id = %connection.client_id,
                error = %err,
                "connection_read_failed"
            );
            None
        }
    }
}

fn payload_of(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text),
        Message::Binary(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        _ => None,
    }
}

/// 入队；队列满时等待，期间连接取消则放弃。
async fn enqueue(channel: &Channel, payload: String, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        queued = channel.enqueue(payload) => queued,
    }
}

async fn publisher_loop(
    channel: Arc<Channel>,
    connection: Arc<Connection>,
    mut stream: SplitStream<WebSocket>,
    cancel: CancellationToken,
) {
    channel.add_publisher(connection.clone());
    info!(
        target: "hub.broker",
        channel_id = channel.id(),
        client_id = %connection.client_id,
        "publisher_connected"
    );
    while let Some(message) = next_message(&connection, &mut stream, &cancel).await {
        let Some(payload) = payload_of(message) else {
            continue;
        };
        if !enqueue(&channel, payload, &cancel).await {
            break;
        }
    }
    channel.remove_publisher(connection.id);
    info!(
        target: "hub.broker",
        channel_id = channel.id(),
        client_id = %connection.client_id,
        "publisher_disconnected"
    );
}

/// 订阅连接只用于检测关闭；消息由通道投递任务写入。
async fn subscriber_loop(
    channel: Arc<Channel>,
    connection: Arc<Connection>,
    mut stream: SplitStream<WebSocket>,
    cancel: CancellationToken,
) {
    channel.add_subscriber(connection.clone(), Framing::Raw);
    info!(
        target: "hub.broker",
        channel_id = channel.id(),
        client_id = %connection.client_id,
        "subscriber_connected"
    );
    while next_message(&connection, &mut stream, &cancel).await.is_some() {}
    channel.remove_subscriber(connection.id);
    info!(
        target: "hub.broker",
        channel_id = channel.id(),
        client_id = %connection.client_id,
        "subscriber_disconnected"
    );
}

async fn bus_loop(
    shared: Arc<BrokerShared>,
    connection: Arc<Connection>,
    mut stream: SplitStream<WebSocket>,
    cancel: CancellationToken,
) {
    info!(target: "hub.broker", client_id = %connection.client_id, "bus_connected");
    let mut subscribed: HashSet<String> = HashSet::new();
    while let Some(message) = next_message(&connection, &mut stream, &cancel).await {
        let Some(text) = payload_of(message) else {
            continue;
        };
        let frame = match serde_json::from_str::<BusFrame>(&text) {
            Ok(frame) => frame,
            Err(err) => {
                info!(
                    target: "hub.broker",
                    client_id = %connection.client_id,
                    error = %err,
                    "bus_frame_invalid"
                );
                continue;
            }
        };
        match frame {
            BusFrame::Subscribe { channel } => {
                shared
                    .channel(&channel)
                    .add_subscriber(connection.clone(), Framing::Bus);
                debug!(target: "hub.broker", channel_id = %channel, client_id = %connection.client_id, "bus_subscribed");
                subscribed.insert(channel);
            }
            BusFrame::Unsubscribe { channel } => {
                if let Some(existing) = shared.existing(&channel) {
                    existing.remove_subscriber(connection.id);
                }
                subscribed.remove(&channel);
            }
            BusFrame::Publish { channel, payload } => {
                let channel = shared.channel(&channel);
                if !enqueue(&channel, payload, &cancel).await {
                    break;
                }
            }
            BusFrame::Receive { channel, .. } => {
                debug!(target: "hub.broker", channel_id = %channel, "bus_receive_frame_ignored");
            }
        }
    }
    for channel_id in subscribed {
        if let Some(channel) = shared.existing(&channel_id) {
            channel.remove_subscriber(connection.id);
        }
    }
    info!(target: "hub.broker", client_id = %connection.client_id, "bus_disconnected");
}
