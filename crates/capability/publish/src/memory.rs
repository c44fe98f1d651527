use crate::{AckSender, EventPublisher, PublishError, PublishHandle};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// 已提交的报文。
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> Result<serde_json::Value, PublishError> {
        serde_json::from_slice(&self.payload).map_err(|err| PublishError::Payload(err.to_string()))
    }
}

/// 内存发布器（用于接线与测试）：记录提交的报文，前 `unacked` 次提交不确认。
#[derive(Debug, Default)]
pub struct MemoryPublisher {
    published: Mutex<Vec<PublishedMessage>>,
    held: Mutex<Vec<AckSender>>,
    unacked: Mutex<usize>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// 前 `count` 次提交保持未确认（模拟 broker 无响应）。
    pub fn withholding_first(count: usize) -> Self {
        Self {
            unacked: Mutex::new(count),
            ..Self::default()
        }
    }

    pub async fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<PublishHandle, PublishError> {
        let (ack, handle) = PublishHandle::channel();
        self.published.lock().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        let mut unacked = self.unacked.lock().await;
        if *unacked > 0 {
            *unacked -= 1;
            self.held.lock().await.push(ack);
        } else {
            ack.acknowledge();
        }
        Ok(handle)
    }
}
