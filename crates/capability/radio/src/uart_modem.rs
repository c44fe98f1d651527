//! UART LoRa 模块链路实现
//!
//! 模块以行为单位通信（`\r\n` 结尾）：
//!
//! ```text
//! → AT+BAND=915000000          ← +OK
//! → AT+NETWORKID=18            ← +OK
//! → AT+PARAMETER=7,7,1,8       ← +OK      (SF, 带宽代码, 编码率代码, 前导码)
//! → AT+SEND=0,11,{"id":"a1"}   ← +OK
//!                              ← +RCV=<addr>,<len>,<data>,<rssi>,<snr>
//!                              ← +ERR=CRC | +ERR=HEADER
//! ```
//!
//! `<data>` 按 `<len>` 截取，因此载荷中可以包含逗号。

use crate::error::RadioError;
use crate::{LinkParams, RadioLink};
use async_trait::async_trait;
use domain::LinkStatus;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// 解析后的模块输出行。
#[derive(Debug, Clone, PartialEq)]
pub enum ModemLine {
    Ok,
    Received {
        address: u16,
        data: Vec<u8>,
        rssi: f64,
        snr: f64,
    },
    /// `+ERR=<code>`
    Error(String),
    Other(String),
}

/// 解析单行模块输出（不含行尾）。
pub fn parse_modem_line(line: &[u8]) -> Result<ModemLine, RadioError> {
    if line == b"+OK" {
        return Ok(ModemLine::Ok);
    }
    if let Some(code) = line.strip_prefix(b"+ERR=") {
        return Ok(ModemLine::Error(String::from_utf8_lossy(code).trim().to_string()));
    }
    let Some(rest) = line.strip_prefix(b"+RCV=") else {
        return Ok(ModemLine::Other(String::from_utf8_lossy(line).to_string()));
    };

    let (address, rest) = split_field(rest)?;
    let address = parse_number::<u16>(address, "address")?;
    let (len, rest) = split_field(rest)?;
    let len = parse_number::<usize>(len, "length")?;
    if rest.len() < len {
        return Err(RadioError::Protocol(format!(
            "declared length {} exceeds line ({} bytes left)",
            len,
            rest.len()
        )));
    }
    let (data, rest) = rest.split_at(len);
    let rest = rest
        .strip_prefix(b",")
        .ok_or_else(|| RadioError::Protocol("missing field after data".to_string()))?;
    let (rssi, snr) = split_field(rest)?;
    Ok(ModemLine::Received {
        address,
        data: data.to_vec(),
        rssi: parse_number::<f64>(rssi, "rssi")?,
        snr: parse_number::<f64>(snr, "snr")?,
    })
}

/// 单行上限：255 字节载荷加 `+RCV=` 头与链路质量字段。
const MAX_LINE_BYTES: usize = 255 + 64;

fn trim_line_end(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    while end > 0 && matches!(line[end - 1], b'\n' | b'\r') {
        end -= 1;
    }
    &line[..end]
}

/// `+RCV` 行的数据部分短于声明长度（载荷内含换行）。
fn payload_incomplete(line: &[u8]) -> bool {
    let Some(rest) = line.strip_prefix(b"+RCV=") else {
        return false;
    };
    let Ok((_, rest)) = split_field(rest) else {
        return false;
    };
    let Ok((len, rest)) = split_field(rest) else {
        return false;
    };
    match parse_number::<usize>(len, "length") {
        Ok(len) => rest.len() < len,
        Err(_) => false,
    }
}

fn split_field(input: &[u8]) -> Result<(&[u8], &[u8]), RadioError> {
    let index = input
        .iter()
        .position(|byte| *byte == b',')
        .ok_or_else(|| RadioError::Protocol("missing field separator".to_string()))?;
    Ok((&input[..index], &input[index + 1..]))
}

fn parse_number<T: std::str::FromStr>(field: &[u8], name: &str) -> Result<T, RadioError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|text| text.trim().parse::<T>().ok())
        .ok_or_else(|| {
            RadioError::Protocol(format!(
                "invalid {}: {}",
                name,
                String::from_utf8_lossy(field)
            ))
        })
}

fn bandwidth_code(bandwidth_hz: u32) -> Result<u8, RadioError> {
    match bandwidth_hz {
        125_000 => Ok(7),
        250_000 => Ok(8),
        500_000 => Ok(9),
        other => Err(RadioError::Init(format!("unsupported bandwidth: {} Hz", other))),
    }
}

fn coding_rate_code(coding_rate: u8) -> Result<u8, RadioError> {
    match coding_rate {
        5..=8 => Ok(coding_rate - 4),
        other => Err(RadioError::Init(format!("unsupported coding rate: 4/{}", other))),
    }
}

/// 串口读半部（带缓冲）。
pub type BoxedReader = BufReader<Box<dyn AsyncRead + Unpin + Send>>;
/// 串口写半部。
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// 按地址打开模块链路：`tcp://host:port` 或本地设备路径。
pub async fn connect(addr: &str) -> Result<UartModemLink<BoxedReader, BoxedWriter>, RadioError> {
    if let Some(target) = addr.strip_prefix("tcp://") {
        info!(target: "lora.radio", "connecting to modem bridge at {}", target);
        let stream = TcpStream::connect(target).await?;
        let (reader, writer) = stream.into_split();
        let reader: Box<dyn AsyncRead + Unpin + Send> = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        return Ok(UartModemLink::new(BufReader::new(reader), writer));
    }

    info!(target: "lora.radio", "opening modem device {}", addr);
    let file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(addr)
        .await?;
    let (reader, writer) = tokio::io::split(file);
    let reader: Box<dyn AsyncRead + Unpin + Send> = Box::new(reader);
    let writer: BoxedWriter = Box::new(writer);
    Ok(UartModemLink::new(BufReader::new(reader), writer))
}

/// UART LoRa 模块链路。
pub struct UartModemLink<R, W> {
    reader: R,
    writer: W,
    payload: VecDeque<u8>,
    rssi: f64,
    snr: f64,
    status: LinkStatus,
    destination: u16,
    command_timeout: Duration,
}

impl<R, W> UartModemLink<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            payload: VecDeque::new(),
            rssi: 0.0,
            snr: 0.0,
            status: LinkStatus::Ok,
            destination: 0,
            command_timeout: Duration::from_secs(2),
        }
    }

    /// 发送目标地址（0 为广播）。
    pub fn with_destination(mut self, destination: u16) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// 读取一行（不含行尾），超长行整行丢弃后继续读取下一行。
    async fn read_line(&mut self) -> Result<Vec<u8>, RadioError> {
        loop {
            match self.read_bounded_line().await? {
                Some(line) => return Ok(line),
                None => {
                    warn!(target: "lora.radio", limit = MAX_LINE_BYTES, "modem_line_oversized");
                }
            }
        }
    }

    /// `+RCV` 载荷中的换行按声明长度拼接续行；超过上限返回 `None`。
    async fn read_bounded_line(&mut self) -> Result<Option<Vec<u8>>, RadioError> {
        let mut line = Vec::new();
        loop {
            let budget = (MAX_LINE_BYTES - line.len()) as u64;
            let read = (&mut self.reader)
                .take(budget)
                .read_until(b'\n', &mut line)
                .await?;
            if read == 0 {
                if line.is_empty() {
                    return Err(RadioError::Closed);
                }
                break;
            }
            if line.last() != Some(&b'\n') {
                if line.len() >= MAX_LINE_BYTES {
                    self.discard_line().await?;
                    return Ok(None);
                }
                // EOF 前的残行
                break;
            }
            if !payload_incomplete(trim_line_end(&line)) {
                break;
            }
        }
        let len = trim_line_end(&line).len();
        line.truncate(len);
        Ok(Some(line))
    }

    /// 丢弃当前行剩余字节（含换行符）。
    async fn discard_line(&mut self) -> Result<(), RadioError> {
        loop {
            let (newline, buffered) = {
                let buf = self.reader.fill_buf().await?;
                (buf.iter().position(|byte| *byte == b'\n'), buf.len())
            };
            match newline {
                Some(index) => {
                    self.reader.consume(index + 1);
                    return Ok(());
                }
                None if buffered == 0 => return Ok(()),
                None => self.reader.consume(buffered),
            }
        }
    }

    async fn write_command(&mut self, command: &[u8]) -> Result<(), RadioError> {
        self.writer.write_all(command).await?;
        self.writer.write_all(b"\r\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// 发送指令并等待 `+OK`。
    async fn command(&mut self, command: &[u8]) -> Result<(), RadioError> {
        self.write_command(command).await?;
        debug!(target: "lora.radio", command = %String::from_utf8_lossy(command), "modem_command_sent");
        let timeout = self.command_timeout;
        match tokio::time::timeout(timeout, self.await_ok()).await {
            Ok(result) => result,
            Err(_) => Err(RadioError::Timeout(format!(
                "no reply to {} within {}ms",
                String::from_utf8_lossy(command),
                timeout.as_millis()
            ))),
        }
    }

    async fn await_ok(&mut self) -> Result<(), RadioError> {
        loop {
            let line = self.read_line().await?;
            match parse_modem_line(&line) {
                Ok(ModemLine::Ok) => return Ok(()),
                Ok(ModemLine::Error(code)) => {
                    return Err(RadioError::Protocol(format!("modem replied +ERR={}", code)));
                }
                Ok(other) => {
                    debug!(target: "lora.radio", line = ?other, "modem_line_skipped");
                }
                Err(err) => {
                    warn!(target: "lora.radio", error = %err, "modem_line_invalid");
                }
            }
        }
    }
}

#[async_trait]
impl<R, W> RadioLink for UartModemLink<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn initialize(&mut self, params: &LinkParams) -> Result<(), RadioError> {
        let bandwidth = bandwidth_code(params.bandwidth_hz)?;
        let coding_rate = coding_rate_code(params.coding_rate)?;
        let commands = [
            "AT".to_string(),
            format!("AT+BAND={}", params.frequency_hz),
            format!("AT+NETWORKID={}", params.network_id),
            format!(
                "AT+PARAMETER={},{},{},{}",
                params.spreading_factor, bandwidth, coding_rate, params.preamble_length
            ),
        ];
        for command in commands {
            self.command(command.as_bytes())
                .await
                .map_err(|err| RadioError::Init(format!("{}: {}", command, err)))?;
        }
        info!(
            target: "lora.radio",
            frequency_hz = params.frequency_hz,
            spreading_factor = params.spreading_factor,
            bandwidth_hz = params.bandwidth_hz,
            coding_rate = %format!("4/{}", params.coding_rate),
            preamble_length = params.preamble_length,
            network_id = params.network_id,
            "modem_initialized"
        );
        Ok(())
    }

    async fn request_receive(&mut self) -> Result<(), RadioError> {
        self.payload.clear();
        loop {
            let line = self.read_line().await?;
            match parse_modem_line(&line) {
                Ok(ModemLine::Received {
                    address,
                    data,
                    rssi,
                    snr,
                }) => {
                    debug!(target: "lora.radio", address, len = data.len(), "modem_frame_received");
                    self.payload = data.into();
                    self.rssi = rssi;
                    self.snr = snr;
                    self.status = LinkStatus::Ok;
                    return Ok(());
                }
                Ok(ModemLine::Error(code)) if code.eq_ignore_ascii_case("CRC") => {
                    self.status = LinkStatus::CrcError;
                    return Ok(());
                }
                Ok(ModemLine::Error(code)) if code.eq_ignore_ascii_case("HEADER") => {
                    self.status = LinkStatus::HeaderError;
                    return Ok(());
                }
                Ok(other) => {
                    debug!(target: "lora.radio", line = ?other, "modem_line_skipped");
                }
                Err(err) => {
                    warn!(target: "lora.radio", error = %err, "modem_line_invalid");
                }
            }
        }
    }

    fn available(&self) -> usize {
        self.payload.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.payload.pop_front()
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
        let mut command = format!("AT+SEND={},{},", self.destination, payload.len()).into_bytes();
        command.extend_from_slice(payload);
        self.command(&command).await
    }
}
