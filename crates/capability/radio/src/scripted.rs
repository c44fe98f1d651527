//! 内存回放链路（用于接线与测试）。

use crate::error::RadioError;
use crate::{LinkParams, RadioLink};
use async_trait::async_trait;
use domain::LinkStatus;
use std::collections::VecDeque;

/// 一次预设的接收结果。
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedReception {
    pub bytes: Vec<u8>,
    pub rssi: f64,
    pub snr: f64,
    pub status: LinkStatus,
}

/// 按顺序回放预设接收结果的链路；回放完毕后 `request_receive` 返回 `Closed`。
#[derive(Debug, Default)]
pub struct ScriptedLink {
    receptions: VecDeque<ScriptedReception>,
    current: VecDeque<u8>,
    rssi: f64,
    snr: f64,
    status: LinkStatus,
    init_error: Option<String>,
    initialized_with: Option<LinkParams>,
    transmitted: Vec<Vec<u8>>,
}

impl ScriptedLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一帧正常接收。
    pub fn with_frame(mut self, bytes: impl Into<Vec<u8>>, rssi: f64, snr: f64) -> Self {
        self.receptions.push_back(ScriptedReception {
            bytes: bytes.into(),
            rssi,
            snr,
            status: LinkStatus::Ok,
        });
        self
    }

    /// 追加一次无载荷的链路状态（CRC/包头错误）。
    pub fn with_status(mut self, status: LinkStatus) -> Self {
        self.receptions.push_back(ScriptedReception {
            bytes: Vec::new(),
            rssi: self.rssi,
            snr: self.snr,
            status,
        });
        self
    }

    /// 初始化时返回错误。
    pub fn with_init_error(mut self, reason: impl Into<String>) -> Self {
        self.init_error = Some(reason.into());
        self
    }

    pub fn remaining(&self) -> usize {
        self.receptions.len()
    }

    pub fn initialized_with(&self) -> Option<&LinkParams> {
        self.initialized_with.as_ref()
    }

    pub fn transmitted(&self) -> &[Vec<u8>] {
        &self.transmitted
    }
}

#[async_trait]
impl RadioLink for ScriptedLink {
    async fn initialize(&mut self, params: &LinkParams) -> Result<(), RadioError> {
        if let Some(reason) = &self.init_error {
            return Err(RadioError::Init(reason.clone()));
        }
        self.initialized_with = Some(params.clone());
        Ok(())
    }

    async fn request_receive(&mut self) -> Result<(), RadioError> {
        let reception = self.receptions.pop_front().ok_or(RadioError::Closed)?;
        self.current = reception.bytes.into();
        self.rssi = reception.rssi;
        self.snr = reception.snr;
        self.status = reception.status;
        Ok(())
    }

    fn available(&self) -> usize {
        self.current.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.current.pop_front()
    }

    fn last_rssi(&self) -> f64 {
        self.rssi
    }

    fn last_snr(&self) -> f64 {
        self.snr
    }

    fn last_status(&self) -> LinkStatus {
        self.status
    }

    async fn transmit(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.transmitted.push(payload.to_vec());
        Ok(())
    }
}
