//! 接收循环：射频帧 → JSON 提取 → 去重 → 富化 → MQTT 发布（逐条等待确认）。

mod frame;

pub use frame::extract_json_object;

use domain::{Event, EventError, LinkStatus, RawFrame};
use lora_dedup::RecencyFilter;
use lora_publish::{EventPublisher, RetryPolicy, publish_with_retry};
use lora_radio::{RadioError, RadioLink};
use lora_telemetry::{
    record_crc_error, record_decode_error, record_dropped_duplicate, record_frame_received,
    record_frame_without_json, record_header_error, record_missing_id, record_publish_failure,
    record_publish_latency_ms, record_published,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 接收循环错误（仅致命错误会向上传播）。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("radio error: {0}")]
    Radio(#[from] RadioError),
}

/// 接收循环参数。
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub topic: String,
    pub retry: RetryPolicy,
    /// 包头错误后的暂停时长
    pub header_error_pause: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            topic: "targets/hits".to_string(),
            retry: RetryPolicy::default(),
            header_error_pause: Duration::from_secs(2),
        }
    }
}

/// 单次迭代的处理结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationOutcome {
    /// 帧内没有 `{ ... }`
    NoJson,
    DecodeError,
    MissingId,
    Duplicate { id: String },
    Published { id: String, attempts: u64 },
    /// 重试耗尽后放弃
    PublishFailed { id: String },
}

/// 接收循环：独占射频链路与去重历史，顺序执行每一轮接收与发布。
pub struct IngestLoop<L> {
    link: L,
    filter: RecencyFilter,
    publisher: Arc<dyn EventPublisher>,
    config: IngestConfig,
}

impl<L: RadioLink> IngestLoop<L> {
    pub fn new(
        link: L,
        filter: RecencyFilter,
        publisher: Arc<dyn EventPublisher>,
        config: IngestConfig,
    ) -> Self {
        Self {
            link,
            filter,
            publisher,
            config,
        }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn filter(&self) -> &RecencyFilter {
        &self.filter
    }

    /// 持续运行，直到射频链路出现致命错误。
    pub async fn run(&mut self) -> Result<(), IngestError> {
        info!(target: "lora.ingest", topic = %self.config.topic, "ingest_started");
        loop {
            self.run_once().await?;
        }
    }

    /// 执行一轮：接收 → 处理 → 上报链路状态。
    pub async fn run_once(&mut self) -> Result<IterationOutcome, IngestError> {
        let frame = self.link.receive_frame().await?;
        record_frame_received();
        info!(
            target: "lora.ingest",
            len = frame.len(),
            text = %frame.text(),
            "frame_received"
        );
        let outcome = self.process_frame(&frame).await;
        self.report_status().await;
        Ok(outcome)
    }

    async fn process_frame(&mut self, frame: &RawFrame) -> IterationOutcome {
        let text = frame.text();
        let Some(extracted) = extract_json_object(&text) else {
            record_frame_without_json();
            debug!(target: "lora.ingest", "frame_without_json");
            return IterationOutcome::NoJson;
        };

        let value: serde_json::Value = match serde_json::from_str(extracted) {
            Ok(value) => value,
            Err(err) => {
                record_decode_error();
                warn!(target: "lora.ingest", error = %err, extracted = %extracted, "frame_decode_failed");
                return IterationOutcome::DecodeError;
            }
        };

        let event = match Event::from_value(value) {
            Ok(event) => event,
            Err(err @ EventError::NotAnObject) => {
                record_decode_error();
                warn!(target: "lora.ingest", error = %err, "frame_decode_failed");
                return IterationOutcome::DecodeError;
            }
            Err(err @ EventError::MissingId(_)) => {
                record_missing_id();
                warn!(target: "lora.ingest", error = %err, "message_missing_id");
                return IterationOutcome::MissingId;
            }
        };

        if self.filter.seen_before(&event.id) {
            record_dropped_duplicate();
            info!(target: "lora.ingest", id = %event.id, "message_duplicate");
            return IterationOutcome::Duplicate { id: event.id };
        }
        info!(target: "lora.ingest", id = %event.id, "message_accepted");

        let enriched = event.enrich(self.link.link_quality(), now_epoch_secs());
        let id = enriched.id().to_string();
        let payload = match enriched.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                record_publish_failure();
                error!(target: "lora.ingest", id = %id, error = %err, "message_encode_failed");
                return IterationOutcome::PublishFailed { id };
            }
        };

        match publish_with_retry(
            self.publisher.as_ref(),
            &self.config.topic,
            &payload,
            &self.config.retry,
        )
        .await
        {
            Ok(report) => {
                record_published();
                record_publish_latency_ms(report.latency_ms);
                info!(
                    target: "lora.ingest",
                    id = %id,
                    topic = %self.config.topic,
                    rssi = enriched.rssi,
                    snr = enriched.snr,
                    attempts = report.attempts,
                    latency_ms = report.latency_ms,
                    "message_published"
                );
                IterationOutcome::Published {
                    id,
                    attempts: report.attempts,
                }
            }
            Err(err) => {
                record_publish_failure();
                error!(
                    target: "lora.ingest",
                    id = %id,
                    topic = %self.config.topic,
                    error = %err,
                    "message_dropped"
                );
                IterationOutcome::PublishFailed { id }
            }
        }
    }

    async fn report_status(&self) {
        let status = self.link.last_status();
        info!(
            target: "lora.ingest",
            rssi = %format!("{:.2}", self.link.last_rssi()),
            snr = %format!("{:.2}", self.link.last_snr()),
            status = status.as_str(),
            "packet_status"
        );
        match status {
            LinkStatus::Ok => {}
            LinkStatus::CrcError => {
                record_crc_error();
                warn!(target: "lora.ingest", "link_crc_error");
            }
            LinkStatus::HeaderError => {
                record_header_error();
                warn!(
                    target: "lora.ingest",
                    pause_ms = self.config.header_error_pause.as_millis() as u64,
                    "link_header_error"
                );
                tokio::time::sleep(self.config.header_error_pause).await;
            }
        }
    }
}

/// 当前 Unix 时间（秒，含小数）。
fn now_epoch_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
