// relay_websocket_utils/src/frame.rs

//! 帧编解码层：把已建立的 WebSocket 双工流解码为离散的应用帧，并提供串行化的写入端。
//!
//! 本模块是整个库的编解码核心：
//! - 读取方向由 [`read_frame`] 完成，每次调用恰好读取一帧，并在读取之前施加
//!   空闲读取超时。入站帧的负载掩码由底层协议实现（`tungstenite`）在读取时
//!   自动去除，交给调用方的负载始终是明文字节。
//! - 写入方向由 [`FrameWriter`] 完成。同一条连接上的并发写入者会在内部的
//!   异步互斥锁上串行化，保证任何一帧的字节不会与其他帧交错；每次写入
//!   同时受写超时约束，避免迟缓的对端无限期占用写入方。
//!
//! 解码失败（协议错误、流结束、超时）对该连接是终止性的，本模块不做
//! 半帧恢复，由调用方负责拆除连接。

use crate::error::WsError; // 引入本库定义的统一错误类型
use crate::server::transport::WsStream;
use futures_util::{
    SinkExt,   // 为 SplitSink 提供 send() / close()
    StreamExt, // 为 SplitStream 提供 next()
    stream::{SplitSink, SplitStream},
};
use log::debug;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message; // 底层 WebSocket 消息枚举

/// 一个已解码的应用帧。
///
/// 帧只在一次「解码 → 分发」周期内存在，不被长期持有。
/// `Text` 与 `Binary` 是业务帧，`Ping` / `Pong` / `Close` 是协议层控制帧。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 文本帧，负载为 UTF-8 字符串。
    Text(String),
    /// 二进制帧，负载为原始字节。
    Binary(Vec<u8>),
    /// 协议层 Ping 帧，调用方应在同一连接上立即回复 Pong。
    Ping(Vec<u8>),
    /// 协议层 Pong 帧，通常直接忽略。
    Pong(Vec<u8>),
    /// 对端发起的关闭帧。
    Close,
}

/// 从接收流中读取恰好一帧，并在读取之前施加空闲读取超时。
///
/// # Arguments
/// * `receiver` - WebSocket 流的接收端（`SplitStream`）。
/// * `read_timeout` - 空闲读取超时；在此期限内没有任何入站帧则判定连接已死。
///
/// # Returns
/// * `Result<Frame, WsError>`：
///     - `Ok(frame)`：成功解码一帧（包括控制帧）。
///     - `Err(WsError::ReadTimeout)`：空闲期限内无任何数据。
///     - `Err(WsError::ConnectionClosed)`：读取流已结束。
///     - `Err(WsError::WebSocketProtocolError)`：底层协议错误（如帧头损坏）。
pub async fn read_frame(
    receiver: &mut SplitStream<WsStream>,
    read_timeout: Duration,
) -> Result<Frame, WsError> {
    match timeout(read_timeout, receiver.next()).await {
        Err(_elapsed) => Err(WsError::ReadTimeout),
        Ok(None) => Err(WsError::ConnectionClosed),
        Ok(Some(Err(e))) => Err(WsError::WebSocketProtocolError(e)),
        Ok(Some(Ok(message))) => match message {
            Message::Text(text) => Ok(Frame::Text(text)),
            Message::Binary(payload) => Ok(Frame::Binary(payload)),
            Message::Ping(payload) => Ok(Frame::Ping(payload)),
            Message::Pong(payload) => Ok(Frame::Pong(payload)),
            Message::Close(close_frame) => {
                debug!("收到对端关闭帧: {:?}", close_frame);
                Ok(Frame::Close)
            }
            // 只有在启用原始帧读取时才会出现，正常配置下不可达
            Message::Frame(_) => Err(WsError::Message("收到未经组装的原始帧".to_string())),
        },
    }
}

/// 一条连接的串行化写入端。
///
/// `FrameWriter` 持有 WebSocket 流的发送半边，并用一把异步互斥锁保护它：
/// 来自不同任务的并发写入（例如广播扇出与会话内的 Pong 应答）会在锁上排队，
/// 任何一帧的编码写入相对其他帧都是原子的。
///
/// 每次写入受 `write_timeout` 约束，防止一个迟缓或卡死的对端长时间占住写入方。
pub struct FrameWriter {
    /// 受互斥锁保护的发送半边。锁的粒度是「一整帧」。
    sink: Mutex<SplitSink<WsStream, Message>>,
    /// 单帧写入的超时时间。
    write_timeout: Duration,
}

impl std::fmt::Debug for FrameWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 发送半边本身没有有意义的调试表示，只输出配置项
        f.debug_struct("FrameWriter")
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl FrameWriter {
    /// 用已分离的发送半边构造一个 `FrameWriter`。
    pub fn new(sink: SplitSink<WsStream, Message>, write_timeout: Duration) -> Self {
        Self {
            sink: Mutex::new(sink),
            write_timeout,
        }
    }

    /// 发送一个文本帧。
    pub async fn send_text(&self, text: &str) -> Result<(), WsError> {
        self.send(Message::Text(text.to_string())).await
    }

    /// 发送一个二进制帧。
    pub async fn send_binary(&self, payload: Vec<u8>) -> Result<(), WsError> {
        self.send(Message::Binary(payload)).await
    }

    /// 回复一个协议层 Pong 帧（负载原样带回对端 Ping 的负载）。
    pub async fn send_pong(&self, payload: Vec<u8>) -> Result<(), WsError> {
        self.send(Message::Pong(payload)).await
    }

    /// 关闭写入方向，向对端发出关闭帧。
    ///
    /// 这是尽力而为的操作：连接可能早已被对端断开，此时的传输错误会被忽略。
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        // 关闭动作同样受写超时约束，错误不再向上传播
        let _ = timeout(self.write_timeout, sink.close()).await;
    }

    /// 在互斥锁与写超时的保护下发送一条底层消息。
    async fn send(&self, message: Message) -> Result<(), WsError> {
        let mut sink = self.sink.lock().await;
        match timeout(self.write_timeout, sink.send(message)).await {
            Err(_elapsed) => Err(WsError::WriteTimeout),
            Ok(Err(e)) => Err(WsError::WebSocketProtocolError(e)),
            Ok(Ok(())) => Ok(()),
        }
    }
}
