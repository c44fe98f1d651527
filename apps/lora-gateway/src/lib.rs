//! 网关装配：把 `AppConfig` 转换为各能力模块的参数。

use lora_config::AppConfig;
use lora_ingest::IngestConfig;
use lora_publish::{MqttPublisherConfig, RetryPolicy};
use lora_radio::LinkParams;
use std::time::Duration;

/// 射频调制参数。
pub fn link_params(config: &AppConfig) -> LinkParams {
    LinkParams {
        frequency_hz: config.radio_frequency_hz,
        spreading_factor: config.radio_spreading_factor,
        bandwidth_hz: config.radio_bandwidth_hz,
        coding_rate: config.radio_coding_rate,
        preamble_length: config.radio_preamble_length,
        network_id: config.radio_network_id,
    }
}

pub fn publisher_config(config: &AppConfig) -> MqttPublisherConfig {
    MqttPublisherConfig {
        host: config.mqtt_host.clone(),
        port: config.mqtt_port,
        username: config.mqtt_username.clone(),
        password: config.mqtt_password.clone(),
        qos: config.mqtt_qos,
    }
}

/// 接收循环参数；确认超时为 0 时无限等待。
pub fn ingest_config(config: &AppConfig) -> IngestConfig {
    let ack_timeout = match config.publish_timeout_ms {
        0 => None,
        ms => Some(Duration::from_millis(ms)),
    };
    IngestConfig {
        topic: config.mqtt_topic.clone(),
        retry: RetryPolicy {
            ack_timeout,
            max_retries: config.publish_max_retries,
            backoff: Duration::from_millis(config.publish_backoff_ms),
        },
        header_error_pause: Duration::from_millis(config.header_error_pause_ms),
    }
}

/// ping 报文：`{"command":"status","id":"<uuid>"}`。
pub fn status_request() -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(&serde_json::json!({
        "command": "status",
        "id": uuid::Uuid::new_v4().to_string(),
    }))
}
