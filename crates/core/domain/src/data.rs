use crate::{DERIVED_FIELDS, ID_FIELD};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;

/// 射频链路单次接收得到的原始帧。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFrame {
    pub bytes: Vec<u8>,
}

impl RawFrame {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// 按字符解读帧内容（非 UTF-8 字节以替换字符呈现）。
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }
}

/// 最近一次接收的链路状态。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    #[default]
    Ok,
    CrcError,
    HeaderError,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Ok => "ok",
            LinkStatus::CrcError => "crc_error",
            LinkStatus::HeaderError => "header_error",
        }
    }
}

/// 最近一次接收的链路质量。
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkQuality {
    /// 接收信号强度（dBm）
    pub rssi: f64,
    /// 信噪比（dB）
    pub snr: f64,
}

/// 报文转事件失败原因。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventError {
    #[error("payload is not a json object")]
    NotAnObject,
    #[error("missing string field: {0}")]
    MissingId(&'static str),
}

/// 入站事件：标识 + 任意载荷字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Event {
    /// 从已解析的 JSON 值构造事件，要求为对象且 `id` 为字符串。
    pub fn from_value(value: Value) -> Result<Self, EventError> {
        let Value::Object(mut fields) = value else {
            return Err(EventError::NotAnObject);
        };
        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => id,
            _ => return Err(EventError::MissingId(ID_FIELD)),
        };
        Ok(Self { id, fields })
    }

    /// 追加链路质量与接收时间，消费自身，确保派生字段只写入一次。
    pub fn enrich(mut self, quality: LinkQuality, timestamp: f64) -> EnrichedEvent {
        for key in DERIVED_FIELDS {
            self.fields.remove(key);
        }
        EnrichedEvent {
            event: self,
            rssi: quality.rssi,
            snr: quality.snr,
            timestamp,
        }
    }
}

/// 富化后的事件（发布报文）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedEvent {
    #[serde(flatten)]
    pub event: Event,
    pub rssi: f64,
    pub snr: f64,
    /// 接收时间（Unix 秒，含小数）
    pub timestamp: f64,
}

impl EnrichedEvent {
    pub fn id(&self) -> &str {
        &self.event.id
    }

    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
