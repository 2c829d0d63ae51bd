//! MQTT 后端：`channelID` 即 topic，QoS 1。
//!
//! 事件循环在独立任务中运行：每次 ConnAck 后按订阅表重新订阅；
//! 连接错误后指数退避重试，上限 [`MAX_RECONNECT_BACKOFF`]。

use crate::subscriptions::SubscriptionTable;
use crate::{MessageHandler, Messenger, MessengerError, split_host_port};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_MQTT_PORT: u16 = 1883;
const INITIAL_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);
/// 重连退避上限。
pub const MAX_RECONNECT_BACKOFF: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 64;
const DISCONNECT_GRACE: Duration = Duration::from_millis(500);

struct MqttLink {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// MQTT 客户端。
pub struct MqttMessenger {
    credentials: Option<(String, String)>,
    subscriptions: Arc<SubscriptionTable>,
    link: Mutex<Option<MqttLink>>,
}

impl MqttMessenger {
    pub fn new() -> Self {
        Self {
            credentials: None,
            subscriptions: Arc::new(SubscriptionTable::default()),
            link: Mutex::new(None),
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some((username.to_string(), password.to_string()));
        self
    }

    fn take_link(&self) -> Option<MqttLink> {
        match self.link.lock() {
            Ok(mut link) => link.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// 当前已连上的客户端句柄。
    fn connected_client(&self) -> Option<AsyncClient> {
        let link = match self.link.lock() {
            Ok(link) => link,
            Err(poisoned) => poisoned.into_inner(),
        };
        link.as_ref()
            .filter(|link| link.connected.load(Ordering::SeqCst))
            .map(|link| link.client.clone())
    }

    async fn close_link(link: MqttLink) {
        let MqttLink {
            client,
            connected,
            cancel,
            mut task,
        } = link;
        connected.store(false, Ordering::SeqCst);
        let _ = client.try_disconnect();
        if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
            cancel.cancel();
            task.abort();
        }
    }
}

impl Default for MqttMessenger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Messenger for MqttMessenger {
    async fn connect(
        &self,
        host_port: &str,
        client_id: &str,
        timeout: Duration,
    ) -> Result<(), MessengerError> {
        if let Some(previous) = self.take_link() {
            Self::close_link(previous).await;
        }
        let (host, port) = split_host_port(host_port, DEFAULT_MQTT_PORT)?;
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let task = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            self.subscriptions.clone(),
            connected.clone(),
            cancel.clone(),
            ready_tx,
        ));
        let link = MqttLink {
            client,
            connected,
            cancel,
            task,
        };

        let outcome = match tokio::time::timeout(timeout, ready_rx).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(MessengerError::Transport(err)),
            Ok(Err(_)) => Err(MessengerError::Transport("event loop stopped".to_string())),
            Err(_) => Err(MessengerError::Timeout(host_port.to_string())),
        };
        if let Err(err) = outcome {
            link.cancel.cancel();
            link.task.abort();
            warn!(target: "hub.messenger", host_port, error = %err, "mqtt_connect_failed");
            return Err(err);
        }
        match self.link.lock() {
            Ok(mut slot) => *slot = Some(link),
            Err(poisoned) => *poisoned.into_inner() = Some(link),
        }
        info!(target: "hub.messenger", host_port, client_id, "mqtt_connected");
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(link) = self.take_link() {
            Self::close_link(link).await;
            info!(target: "hub.messenger", "mqtt_disconnected");
        }
    }

    async fn publish(&self, channel_id: &str, payload: &[u8]) -> Result<(), MessengerError> {
        let client = self
            .connected_client()
            .ok_or(MessengerError::NoConnection)?;
        client
            .publish(channel_id, QoS::AtLeastOnce, false, payload.to_vec())
            .await
            .map_err(|err| MessengerError::Transport(err.to_string()))
    }

    async fn subscribe(
        &self,
        channel_id: &str,
        handler: MessageHandler,
    ) -> Result<(), MessengerError> {
        self.subscriptions.set(channel_id, handler);
        let Some(client) = self.connected_client() else {
            debug!(target: "hub.messenger", channel_id, "subscription_buffered");
            return Ok(());
        };
        client
            .subscribe(channel_id, QoS::AtLeastOnce)
            .await
            .map_err(|err| MessengerError::Transport(err.to_string()))
    }

    async fn unsubscribe(&self, channel_id: &str) -> Result<(), MessengerError> {
        self.subscriptions.remove(channel_id);
        let Some(client) = self.connected_client() else {
            return Ok(());
        };
        client
            .unsubscribe(channel_id)
            .await
            .map_err(|err| MessengerError::Transport(err.to_string()))
    }

    fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.channels()
    }

    fn is_connected(&self) -> bool {
        self.connected_client().is_some()
    }
}

/// 驱动 MQTT 事件循环；首次 ConnAck 或首次错误通过 `ready` 回报给 connect。
async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    subscriptions: Arc<SubscriptionTable>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let mut ready = Some(ready);
    let mut backoff = INITIAL_RECONNECT_BACKOFF;
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = eventloop.poll() => event,
        };
        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::SeqCst);
                backoff = INITIAL_RECONNECT_BACKOFF;
                for channel_id in subscriptions.channels() {
                    if let Err(err) = client.try_subscribe(channel_id.as_str(), QoS::AtLeastOnce) {
                        warn!(target: "hub.messenger", channel_id = %channel_id, error = %err, "mqtt_resubscribe_failed");
                    }
                }
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Ok(()));
                } else {
                    info!(target: "hub.messenger", "mqtt_reconnected");
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if !subscriptions.dispatch(&publish.topic, &publish.payload) {
                    warn!(target: "hub.messenger", channel_id = %publish.topic, "message_for_unknown_channel");
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::SeqCst);
                break;
            }
            Ok(_) => {}
            Err(err) => {
                connected.store(false, Ordering::SeqCst);
                if let Some(ready) = ready.take() {
                    let _ = ready.send(Err(err.to_string()));
                    break;
                }
                warn!(
                    target: "hub.messenger",
                    error = %err,
                    backoff_secs = backoff.as_secs(),
                    "mqtt_connection_lost"
                );
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff);
            }
        }
    }
    debug!(target: "hub.messenger", "mqtt_event_loop_stopped");
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_RECONNECT_BACKOFF)
}
