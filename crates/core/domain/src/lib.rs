pub mod data;

pub use data::{EnrichedEvent, Event, EventError, LinkQuality, LinkStatus, RawFrame};

/// 发布报文中由网关追加的字段（入站报文中的同名字段会被覆盖）。
pub const DERIVED_FIELDS: [&str; 3] = ["rssi", "snr", "timestamp"];

/// 消息标识字段名。
pub const ID_FIELD: &str = "id";
