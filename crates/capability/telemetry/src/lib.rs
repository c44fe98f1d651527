//! 日志初始化与接收链路计数指标。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 指标快照。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_received: u64,
    pub frames_without_json: u64,
    pub decode_errors: u64,
    pub missing_id: u64,
    pub dropped_duplicate: u64,
    pub published: u64,
    pub publish_timeouts: u64,
    pub publish_failures: u64,
    pub crc_errors: u64,
    pub header_errors: u64,
    pub publish_latency_ms_total: u64,
    pub publish_latency_ms_count: u64,
}

/// 接收链路计数指标。
pub struct TelemetryMetrics {
    frames_received: AtomicU64,
    frames_without_json: AtomicU64,
    decode_errors: AtomicU64,
    missing_id: AtomicU64,
    dropped_duplicate: AtomicU64,
    published: AtomicU64,
    publish_timeouts: AtomicU64,
    publish_failures: AtomicU64,
    crc_errors: AtomicU64,
    header_errors: AtomicU64,
    publish_latency_ms_total: AtomicU64,
    publish_latency_ms_count: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            frames_received: AtomicU64::new(0),
            frames_without_json: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            missing_id: AtomicU64::new(0),
            dropped_duplicate: AtomicU64::new(0),
            published: AtomicU64::new(0),
            publish_timeouts: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
            crc_errors: AtomicU64::new(0),
            header_errors: AtomicU64::new(0),
            publish_latency_ms_total: AtomicU64::new(0),
            publish_latency_ms_count: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            frames_without_json: self.frames_without_json.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            missing_id: self.missing_id.load(Ordering::Relaxed),
            dropped_duplicate: self.dropped_duplicate.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            publish_timeouts: self.publish_timeouts.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            crc_errors: self.crc_errors.load(Ordering::Relaxed),
            header_errors: self.header_errors.load(Ordering::Relaxed),
            publish_latency_ms_total: self.publish_latency_ms_total.load(Ordering::Relaxed),
            publish_latency_ms_count: self.publish_latency_ms_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info，可由 RUST_LOG 覆盖）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 记录收到的射频帧。
pub fn record_frame_received() {
    metrics().frames_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录不含 JSON 定界符的帧。
pub fn record_frame_without_json() {
    metrics().frames_without_json.fetch_add(1, Ordering::Relaxed);
}

pub fn record_decode_error() {
    metrics().decode_errors.fetch_add(1, Ordering::Relaxed);
}

pub fn record_missing_id() {
    metrics().missing_id.fetch_add(1, Ordering::Relaxed);
}

/// 记录重复消息丢弃次数。
pub fn record_dropped_duplicate() {
    metrics().dropped_duplicate.fetch_add(1, Ordering::Relaxed);
}

/// 记录发布成功（已收到 broker 确认）。
pub fn record_published() {
    metrics().published.fetch_add(1, Ordering::Relaxed);
}

/// 记录单次确认等待超时。
pub fn record_publish_timeout() {
    metrics().publish_timeouts.fetch_add(1, Ordering::Relaxed);
}

/// 记录重试耗尽后放弃的发布。
pub fn record_publish_failure() {
    metrics().publish_failures.fetch_add(1, Ordering::Relaxed);
}

pub fn record_crc_error() {
    metrics().crc_errors.fetch_add(1, Ordering::Relaxed);
}

pub fn record_header_error() {
    metrics().header_errors.fetch_add(1, Ordering::Relaxed);
}

/// 记录提交到确认的耗时（毫秒）。
pub fn record_publish_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .publish_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .publish_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}
