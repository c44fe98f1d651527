//! 射频链路错误类型定义

/// 射频链路错误
#[derive(Debug, thiserror::Error)]
pub enum RadioError {
    /// 初始化失败（致命）
    #[error("init error: {0}")]
    Init(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 模块应答不符合协议
    #[error("protocol error: {0}")]
    Protocol(String),

    /// 超时错误
    #[error("timeout: {0}")]
    Timeout(String),

    /// 链路已关闭
    #[error("link closed")]
    Closed,
}
