//! # 射频链路能力模块
//!
//! 接收循环只依赖 [`RadioLink`]：
//! - **UartModemLink**：通过串口（或串口转 TCP）连接的 LoRa 模块，AT 指令协议
//! - **ScriptedLink**：内存回放链路（用于接线与测试）
//!
//! ## 接收流程
//!
//! ```text
//! request_receive()  ──阻塞直到收到一帧或链路报错
//!       │
//!       ▼
//! available() / read_byte()  ──逐字节取出载荷
//!       │
//!       ▼
//! last_rssi() / last_snr() / last_status()
//! ```
//!
//! ## 地址格式
//!
//! - `tcp://host:port`：串口转 TCP 网桥
//! - 其他：本地设备路径（如 `/dev/ttyUSB0`，波特率需预先由系统设置）

mod error;
mod scripted;
mod uart_modem;

pub use error::RadioError;
pub use scripted::{ScriptedLink, ScriptedReception};
pub use uart_modem::{
    BoxedReader, BoxedWriter, ModemLine, UartModemLink, connect, parse_modem_line,
};

use async_trait::async_trait;
use domain::{LinkQuality, LinkStatus, RawFrame};

/// 射频调制与组网参数。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkParams {
    pub frequency_hz: u64,
    pub spreading_factor: u8,
    pub bandwidth_hz: u32,
    /// 编码率分母（4/5 → 5）
    pub coding_rate: u8,
    pub preamble_length: u16,
    pub network_id: u8,
}

impl Default for LinkParams {
    fn default() -> Self {
        Self {
            frequency_hz: 915_000_000,
            spreading_factor: 7,
            bandwidth_hz: 125_000,
            coding_rate: 5,
            preamble_length: 8,
            network_id: 18,
        }
    }
}

/// 射频链路抽象。
#[async_trait]
pub trait RadioLink: Send {
    /// 按参数初始化射频；失败视为致命错误。
    async fn initialize(&mut self, params: &LinkParams) -> Result<(), RadioError>;

    /// 阻塞直到收到一帧或链路上报错误状态。
    async fn request_receive(&mut self) -> Result<(), RadioError>;

    /// 当前帧剩余未读字节数。
    fn available(&self) -> usize;

    fn read_byte(&mut self) -> Option<u8>;

    fn last_rssi(&self) -> f64;

    fn last_snr(&self) -> f64;

    fn last_status(&self) -> LinkStatus;

    /// 发送一帧并等待射频确认发送完成。
    async fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError>;

    /// 接收一帧并取出全部载荷字节。
    async fn receive_frame(&mut self) -> Result<RawFrame, RadioError> {
        self.request_receive().await?;
        let mut bytes = Vec::with_capacity(self.available());
        while self.available() > 0 {
            match self.read_byte() {
                Some(byte) => bytes.push(byte),
                None => break,
            }
        }
        Ok(RawFrame::new(bytes))
    }

    fn link_quality(&self) -> LinkQuality {
        LinkQuality {
            rssi: self.last_rssi(),
            snr: self.last_snr(),
        }
    }
}
