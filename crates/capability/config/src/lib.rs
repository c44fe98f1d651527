//! 网关运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 网关运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub radio_addr: String,
    pub radio_frequency_hz: u64,
    pub radio_spreading_factor: u8,
    pub radio_bandwidth_hz: u32,
    pub radio_coding_rate: u8,
    pub radio_preamble_length: u16,
    pub radio_network_id: u8,
    pub radio_tx_address: u16,
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_topic: String,
    pub mqtt_qos: u8,
    pub dedup_capacity: usize,
    pub publish_timeout_ms: u64,
    pub publish_max_retries: u64,
    pub publish_backoff_ms: u64,
    pub header_error_pause_ms: u64,
}

impl AppConfig {
    /// 从环境变量读取配置（均有默认值）。
    pub fn from_env() -> Result<Self, ConfigError> {
        let radio_addr =
            env::var("LORA_RADIO_ADDR").unwrap_or_else(|_| "tcp://127.0.0.1:7000".to_string());
        let radio_frequency_hz = read_u64_with_default("LORA_FREQUENCY_HZ", 915_000_000)?;
        let radio_spreading_factor = read_u8_with_default("LORA_SPREADING_FACTOR", 7)?;
        if !(5..=12).contains(&radio_spreading_factor) {
            return Err(ConfigError::Invalid(
                "LORA_SPREADING_FACTOR".to_string(),
                radio_spreading_factor.to_string(),
            ));
        }
        let radio_bandwidth_hz = read_u32_with_default("LORA_BANDWIDTH_HZ", 125_000)?;
        let radio_coding_rate = read_u8_with_default("LORA_CODING_RATE", 5)?;
        if !(5..=8).contains(&radio_coding_rate) {
            return Err(ConfigError::Invalid(
                "LORA_CODING_RATE".to_string(),
                radio_coding_rate.to_string(),
            ));
        }
        let radio_preamble_length = read_u16_with_default("LORA_PREAMBLE_LENGTH", 8)?;
        let radio_network_id = read_u8_with_default("LORA_NETWORK_ID", 18)?;
        let radio_tx_address = read_u16_with_default("LORA_TX_ADDRESS", 0)?;
        let mqtt_host = env::var("LORA_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("LORA_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("LORA_MQTT_USERNAME");
        let mqtt_password = read_optional("LORA_MQTT_PASSWORD");
        let mqtt_topic = env::var("LORA_MQTT_TOPIC").unwrap_or_else(|_| "targets/hits".to_string());
        if mqtt_topic.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "LORA_MQTT_TOPIC".to_string(),
                mqtt_topic,
            ));
        }
        // QoS 0 没有 broker 确认，无法满足至少一次投递
        let mqtt_qos = read_u8_with_default("LORA_MQTT_QOS", 1)?;
        if !(1..=2).contains(&mqtt_qos) {
            return Err(ConfigError::Invalid(
                "LORA_MQTT_QOS".to_string(),
                mqtt_qos.to_string(),
            ));
        }
        let dedup_capacity = read_usize_with_default("LORA_DEDUP_CAPACITY", 10)?;
        let publish_timeout_ms = read_u64_with_default("LORA_PUBLISH_TIMEOUT_MS", 5000)?;
        let publish_max_retries = read_u64_with_default("LORA_PUBLISH_MAX_RETRIES", 3)?;
        let publish_backoff_ms = read_u64_with_default("LORA_PUBLISH_BACKOFF_MS", 200)?;
        let header_error_pause_ms = read_u64_with_default("LORA_HEADER_ERROR_PAUSE_MS", 2000)?;

        Ok(Self {
            radio_addr,
            radio_frequency_hz,
            radio_spreading_factor,
            radio_bandwidth_hz,
            radio_coding_rate,
            radio_preamble_length,
            radio_network_id,
            radio_tx_address,
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_topic,
            mqtt_qos,
            dedup_capacity,
            publish_timeout_ms,
            publish_max_retries,
            publish_backoff_ms,
            header_error_pause_ms,
        })
    }
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u32_with_default(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u32>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}
