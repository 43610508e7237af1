// relay_websocket_utils/src/error.rs

//! 定义 WebSocket 工具库相关的错误类型。

use thiserror::Error; // 引入 thiserror 来简化错误类型的定义

/// WebSocket 工具库的统一错误类型。
///
/// 对单个连接而言，本枚举中的任何错误都是终止性的：
/// 读取方向出现错误后不尝试恢复半帧，调用方应直接进入该连接的拆除流程。
#[derive(Error, Debug)]
pub enum WsError {
    /// WebSocket 协议相关的错误。
    /// 例如，握手失败、帧格式不正确、连接被重置等。
    #[error("WebSocket协议错误: {0}")]
    WebSocketProtocolError(#[from] tokio_tungstenite::tungstenite::Error),

    /// 底层 I/O 错误。
    #[error("I/O错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 在空闲读取超时时间内没有从对端收到任何帧。
    #[error("读取超时: 连接在空闲期限内无任何数据")]
    ReadTimeout,

    /// 向对端写入一帧耗时超过了写超时时间。
    #[error("写入超时: 对端长时间未确认写入")]
    WriteTimeout,

    /// 连接已由对端关闭（读取流结束）。
    #[error("连接已关闭")]
    ConnectionClosed,

    /// 通用消息错误，用于其他未明确分类的错误。
    #[error("消息错误: {0}")]
    Message(String),
}
