//! 采集链路装配模块
//!
//! 通过 Messenger 订阅 Thing 发布的三个通道，把收到的消息写入目录库与历史库：
//!
//! - `things.td`：`{"thingID": ..., "td": {...}}`，写入目录
//! - `things.event`：单个 ThingValue 或数组，写入事件历史
//! - `things.action`：单个 ThingValue，写入动作历史
//!
//! 回调运行在 Messenger 的接收循环里，只做解码和入队；
//! 写库由独立任务完成。队列满时丢弃并告警，不阻塞接收循环。

use crate::handlers::ThingValues;
use domain::ThingValue;
use hub_messenger::{MessageHandler, Messenger, MessengerError};
use hub_storage::{DirectoryStore, HistoryStore};
use hub_telemetry::{record_history_values_stored, record_td_stored};
use serde::Deserialize;
use serde_json::value::RawValue;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const TD_CHANNEL: &str = "things.td";
pub const EVENT_CHANNEL: &str = "things.event";
pub const ACTION_CHANNEL: &str = "things.action";

const INGEST_CHANNELS: [&str; 3] = [TD_CHANNEL, EVENT_CHANNEL, ACTION_CHANNEL];
const INGEST_QUEUE_DEPTH: usize = 256;

#[derive(Deserialize)]
struct TdMessage {
    #[serde(rename = "thingID")]
    thing_id: String,
    td: Box<RawValue>,
}

/// 解码后的待写入条目。
#[derive(Debug, PartialEq)]
pub enum IngestItem {
    Td { thing_id: String, td: String },
    Events(Vec<ThingValue>),
    Action(ThingValue),
}

/// 按通道解码消息。
pub fn decode(channel_id: &str, payload: &[u8]) -> Result<IngestItem, String> {
    match channel_id {
        TD_CHANNEL => {
            let message: TdMessage =
                serde_json::from_slice(payload).map_err(|err| err.to_string())?;
            if message.thing_id.is_empty() {
                return Err("thingID required".to_string());
            }
            Ok(IngestItem::Td {
                thing_id: message.thing_id,
                td: message.td.get().to_string(),
            })
        }
        EVENT_CHANNEL => {
            let values: ThingValues =
                serde_json::from_slice(payload).map_err(|err| err.to_string())?;
            Ok(IngestItem::Events(values.into_vec()))
        }
        ACTION_CHANNEL => serde_json::from_slice(payload)
            .map(IngestItem::Action)
            .map_err(|err| err.to_string()),
        other => Err(format!("unexpected channel '{other}'")),
    }
}

/// 运行中的采集链路。
pub struct IngestHandle {
    messenger: Arc<dyn Messenger>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl IngestHandle {
    /// 取消订阅，写完已入队的条目后退出。
    pub async fn stop(self) {
        for channel_id in INGEST_CHANNELS {
            if let Err(err) = self.messenger.unsubscribe(channel_id).await {
                warn!(target: "hub.ingest", channel = channel_id, error = %err, "ingest_unsubscribe_failed");
            }
        }
        self.cancel.cancel();
        if let Err(err) = self.task.await {
            warn!(target: "hub.ingest", error = %err, "ingest_task_failed");
        }
        info!(target: "hub.ingest", "ingest_stopped");
    }
}

/// 订阅采集通道并启动写库任务
///
/// Messenger 可以尚未连接：订阅会在连接建立后生效。
pub async fn spawn_ingest(
    messenger: Arc<dyn Messenger>,
    directory: Arc<DirectoryStore>,
    history: Arc<dyn HistoryStore>,
) -> Result<IngestHandle, MessengerError> {
    let (tx, rx) = mpsc::channel(INGEST_QUEUE_DEPTH);
    let handler: MessageHandler = Arc::new(move |channel_id: &str, payload: &[u8]| {
        let item = match decode(channel_id, payload) {
            Ok(item) => item,
            Err(err) => {
                warn!(target: "hub.ingest", channel = channel_id, error = %err, "ingest_decode_failed");
                return;
            }
        };
        if let Err(err) = tx.try_send(item) {
            warn!(target: "hub.ingest", channel = channel_id, error = %err, "ingest_enqueue_failed");
        }
    });
    for channel_id in INGEST_CHANNELS {
        messenger.subscribe(channel_id, handler.clone()).await?;
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(persist_loop(rx, cancel.clone(), directory, history));
    info!(target: "hub.ingest", channels = ?INGEST_CHANNELS, "ingest_started");
    Ok(IngestHandle {
        messenger,
        cancel,
        task,
    })
}

async fn persist_loop(
    mut rx: mpsc::Receiver<IngestItem>,
    cancel: CancellationToken,
    directory: Arc<DirectoryStore>,
    history: Arc<dyn HistoryStore>,
) {
    loop {
        tokio::select! {
            item = rx.recv() => match item {
                Some(item) => persist(&directory, history.as_ref(), item).await,
                None => return,
            },
            _ = cancel.cancelled() => break,
        }
    }
    rx.close();
    while let Ok(item) = rx.try_recv() {
        persist(&directory, history.as_ref(), item).await;
    }
}

async fn persist(directory: &DirectoryStore, history: &dyn HistoryStore, item: IngestItem) {
    match item {
        IngestItem::Td { thing_id, td } => match directory.update_td(&thing_id, &td) {
            Ok(()) => {
                record_td_stored();
                debug!(target: "hub.ingest", thing_id = %thing_id, "td_stored");
            }
            Err(err) => {
                warn!(target: "hub.ingest", thing_id = %thing_id, error = %err, "td_store_failed")
            }
        },
        IngestItem::Events(values) => match history.add_events(&values).await {
            Ok(stored) => {
                record_history_values_stored(stored as u64);
                debug!(target: "hub.ingest", stored, "events_stored");
            }
            Err(err) => warn!(target: "hub.ingest", error = %err, "events_store_failed"),
        },
        IngestItem::Action(value) => match history.add_action(&value).await {
            Ok(()) => {
                record_history_values_stored(1);
                debug!(target: "hub.ingest", thing_id = %value.thing_id, name = %value.name, "action_stored");
            }
            Err(err) => {
                warn!(target: "hub.ingest", thing_id = %value.thing_id, error = %err, "action_store_failed")
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{ACTION_CHANNEL, EVENT_CHANNEL, IngestItem, TD_CHANNEL, decode, spawn_ingest};
    use async_trait::async_trait;
    use hub_messenger::{MessageHandler, Messenger, MessengerError};
    use hub_storage::{DirectoryStore, HistoryQuery, HistoryStore, InMemoryHistoryStore};
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// 进程内回环：subscribe 记录 handler，deliver 直接调用。
    #[derive(Default)]
    struct LoopbackMessenger {
        handlers: Mutex<BTreeMap<String, MessageHandler>>,
    }

    impl LoopbackMessenger {
        fn deliver(&self, channel_id: &str, payload: &str) {
            let handler = self
                .handlers
                .lock()
                .expect("handlers")
                .get(channel_id)
                .cloned();
            if let Some(handler) = handler {
                handler(channel_id, payload.as_bytes());
            }
        }
    }

    #[async_trait]
    impl Messenger for LoopbackMessenger {
        async fn connect(&self, _: &str, _: &str, _: Duration) -> Result<(), MessengerError> {
            Ok(())
        }

        async fn disconnect(&self) {}

        async fn publish(&self, channel_id: &str, payload: &[u8]) -> Result<(), MessengerError> {
            self.deliver(channel_id, std::str::from_utf8(payload).expect("utf8"));
            Ok(())
        }

        async fn subscribe(
            &self,
            channel_id: &str,
            handler: MessageHandler,
        ) -> Result<(), MessengerError> {
            self.handlers
                .lock()
                .expect("handlers")
                .insert(channel_id.to_string(), handler);
            Ok(())
        }

        async fn unsubscribe(&self, channel_id: &str) -> Result<(), MessengerError> {
            self.handlers.lock().expect("handlers").remove(channel_id);
            Ok(())
        }

        fn subscriptions(&self) -> Vec<String> {
            self.handlers.lock().expect("handlers").keys().cloned().collect()
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn decodes_each_channel() {
        let td = decode(TD_CHANNEL, br#"{"thingID":"urn:z:p:t1","td":{"title":"T1"}}"#)
            .expect("td");
        assert_eq!(
            td,
            IngestItem::Td {
                thing_id: "urn:z:p:t1".to_string(),
                td: r#"{"title":"T1"}"#.to_string(),
            }
        );

        let single = decode(EVENT_CHANNEL, br#"{"thingID":"t1","name":"temp","value":"1"}"#)
            .expect("single event");
        assert!(matches!(single, IngestItem::Events(values) if values.len() == 1));
        let many = decode(
            EVENT_CHANNEL,
            br#"[{"thingID":"t1","name":"a","value":"1"},{"thingID":"t1","name":"b","value":"2"}]"#,
        )
        .expect("event array");
        assert!(matches!(many, IngestItem::Events(values) if values.len() == 2));

        assert!(decode(TD_CHANNEL, br#"{"thingID":"","td":{}}"#).is_err());
        assert!(decode(ACTION_CHANNEL, b"not json").is_err());
        assert!(decode("things.other", b"{}").is_err());
    }

    #[tokio::test]
    async fn persists_messages_and_unsubscribes_on_stop() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let directory =
            Arc::new(DirectoryStore::open(dir.path().join("directory.json")).expect("directory"));
        let history: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new());
        let messenger = Arc::new(LoopbackMessenger::default());

        let handle = spawn_ingest(messenger.clone(), directory.clone(), history.clone())
            .await
            .expect("ingest");
        assert_eq!(messenger.subscriptions().len(), 3);

        messenger.deliver(TD_CHANNEL, r#"{"thingID":"t1","td":{"title":"T1"}}"#);
        messenger.deliver(
            EVENT_CHANNEL,
            r#"[{"thingID":"t1","name":"temp","value":"20","created":"2026-01-01T00:00:00Z"}]"#,
        );
        messenger.deliver(ACTION_CHANNEL, r#"{"thingID":"t1","name":"reset","value":""}"#);
        messenger.deliver(EVENT_CHANNEL, "garbage");

        handle.stop().await;
        assert!(messenger.subscriptions().is_empty());

        assert_eq!(directory.get_td("t1").expect("td"), r#"{"title":"T1"}"#);
        let events = history
            .get_event_history(&HistoryQuery::new("t1"))
            .await
            .expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, "20");
        let actions = history
            .get_action_history(&HistoryQuery::new("t1"))
            .await
            .expect("actions");
        assert_eq!(actions[0].name, "reset");
    }
}
