use crate::MessageHandler;
use std::collections::HashMap;
use std::sync::Mutex;

/// 订阅表：`channelID -> handler`。断线不清空，重连后据此重新订阅。
#[derive(Default)]
pub(crate) struct SubscriptionTable {
    handlers: Mutex<HashMap<String, MessageHandler>>,
}

impl SubscriptionTable {
    /// 设置 handler，替换同一通道的旧 handler。
    pub(crate) fn set(&self, channel_id: &str, handler: MessageHandler) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.insert(channel_id.to_string(), handler);
        }
    }

    pub(crate) fn remove(&self, channel_id: &str) {
        if let Ok(mut handlers) = self.handlers.lock() {
            handlers.remove(channel_id);
        }
    }

    /// 已订阅通道（排序）。
    pub(crate) fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self
            .handlers
            .lock()
            .map(|handlers| handlers.keys().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        channels
    }

    /// 调用通道 handler；未订阅时返回 false。handler 在锁外调用。
    pub(crate) fn dispatch(&self, channel_id: &str, payload: &[u8]) -> bool {
        let handler = self
            .handlers
            .lock()
            .ok()
            .and_then(|handlers| handlers.get(channel_id).cloned());
        match handler {
            Some(handler) => {
                handler(channel_id, payload);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionTable;
    use crate::MessageHandler;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn latest_handler_wins() {
        let table = SubscriptionTable::default();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let counter = first.clone();
        let handler: MessageHandler = Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        table.set("c1", handler);
        let counter = second.clone();
        let handler: MessageHandler = Arc::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        table.set("c1", handler);

        assert!(table.dispatch("c1", b"x"));
        assert!(!table.dispatch("c2", b"x"));
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        table.remove("c1");
        assert!(table.channels().is_empty());
    }
}
