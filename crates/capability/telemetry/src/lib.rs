//! 追踪初始化、请求 ID 生成与进程级计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 计数器快照。
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub messages_published: u64,
    pub messages_delivered: u64,
    pub subscribers_dropped: u64,
    pub history_values_stored: u64,
    pub tds_stored: u64,
    pub authn_failures: u64,
    pub authz_denials: u64,
}

/// 进程级计数器。
pub struct TelemetryMetrics {
    messages_published: AtomicU64,
    messages_delivered: AtomicU64,
    subscribers_dropped: AtomicU64,
    history_values_stored: AtomicU64,
    tds_stored: AtomicU64,
    authn_failures: AtomicU64,
    authz_denials: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_published: AtomicU64::new(0),
            messages_delivered: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            history_values_stored: AtomicU64::new(0),
            tds_stored: AtomicU64::new(0),
            authn_failures: AtomicU64::new(0),
            authz_denials: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_published: self.messages_published.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            history_values_stored: self.history_values_stored.load(Ordering::Relaxed),
            tds_stored: self.tds_stored.load(Ordering::Relaxed),
            authn_failures: self.authn_failures.load(Ordering::Relaxed),
            authz_denials: self.authz_denials.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局计数器实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录通道入队消息数。
pub fn record_message_published() {
    metrics().messages_published.fetch_add(1, Ordering::Relaxed);
}

/// 记录成功投递给订阅者的次数。
pub fn record_message_delivered() {
    metrics().messages_delivered.fetch_add(1, Ordering::Relaxed);
}

/// 记录因写失败被移除的订阅者数。
pub fn record_subscriber_dropped() {
    metrics().subscribers_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录写入历史库的值数量。
pub fn record_history_values_stored(count: u64) {
    metrics()
        .history_values_stored
        .fetch_add(count, Ordering::Relaxed);
}

/// 记录写入目录库的 TD 数。
pub fn record_td_stored() {
    metrics().tds_stored.fetch_add(1, Ordering::Relaxed);
}

/// 记录认证失败次数。
pub fn record_authn_failure() {
    metrics().authn_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录授权拒绝次数。
pub fn record_authz_denial() {
    metrics().authz_denials.fetch_add(1, Ordering::Relaxed);
}
