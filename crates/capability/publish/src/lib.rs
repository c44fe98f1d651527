//! MQTT 发布能力：每次提交返回独立的确认句柄，由接收循环直接等待。

mod memory;
mod mqtt;

pub use memory::{MemoryPublisher, PublishedMessage};
pub use mqtt::{MqttPublisher, MqttPublisherConfig, qos_from_u8};

use async_trait::async_trait;
use lora_telemetry::record_publish_timeout;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::warn;

/// 发布链路错误。
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("client error: {0}")]
    Client(String),
    #[error("ack timeout after {0}ms")]
    Timeout(u64),
    #[error("ack dropped before delivery")]
    Dropped,
    #[error("payload error: {0}")]
    Payload(String),
}

/// 单次提交的确认句柄。
#[derive(Debug)]
pub struct PublishHandle {
    receiver: oneshot::Receiver<Result<(), PublishError>>,
}

/// 确认句柄的发送端，由网络任务持有。
#[derive(Debug)]
pub struct AckSender {
    sender: oneshot::Sender<Result<(), PublishError>>,
}

impl PublishHandle {
    /// 创建一对发送端与句柄。
    pub fn channel() -> (AckSender, PublishHandle) {
        let (sender, receiver) = oneshot::channel();
        (AckSender { sender }, PublishHandle { receiver })
    }

    /// 等待 broker 确认；发送端被丢弃时返回 `Dropped`。
    pub async fn acknowledged(self) -> Result<(), PublishError> {
        match self.receiver.await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Dropped),
        }
    }
}

impl AckSender {
    pub fn acknowledge(self) {
        let _ = self.sender.send(Ok(()));
    }

    pub fn fail(self, err: PublishError) {
        let _ = self.sender.send(Err(err));
    }

    /// 等待方是否已放弃（超时后丢弃句柄）。
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }
}

/// 事件发布器抽象。
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishHandle, PublishError>;
}

/// 确认等待与重试策略。
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 单次等待确认的上限；`None` 表示无限等待。
    pub ack_timeout: Option<Duration>,
    pub max_retries: u64,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            ack_timeout: Some(Duration::from_secs(5)),
            max_retries: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// 发布结果统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// 总提交次数（含首次）
    pub attempts: u64,
    pub latency_ms: u64,
}

/// 提交并等待确认，超时或失败时按策略重新提交。
pub async fn publish_with_retry(
    publisher: &dyn EventPublisher,
    topic: &str,
    payload: &[u8],
    policy: &RetryPolicy,
) -> Result<PublishReport, PublishError> {
    let started_at = Instant::now();
    let mut attempt = 0u64;
    loop {
        attempt += 1;
        let result = match publisher.publish(topic, payload.to_vec()).await {
            Ok(handle) => await_ack(handle, policy.ack_timeout).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                return Ok(PublishReport {
                    attempts: attempt,
                    latency_ms: started_at.elapsed().as_millis() as u64,
                });
            }
            Err(err) => {
                if matches!(err, PublishError::Timeout(_)) {
                    record_publish_timeout();
                }
                warn!(
                    target: "lora.publish",
                    topic = %topic,
                    attempt,
                    max_retries = policy.max_retries,
                    error = %err,
                    "publish_attempt_failed"
                );
                if attempt > policy.max_retries {
                    return Err(err);
                }
                if !policy.backoff.is_zero() {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
}

async fn await_ack(handle: PublishHandle, timeout: Option<Duration>) -> Result<(), PublishError> {
    match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, handle.acknowledged()).await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Timeout(timeout.as_millis() as u64)),
        },
        None => handle.acknowledged().await,
    }
}
