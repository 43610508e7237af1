//! `relay_websocket_utils` 是一个提供 WebSocket 通信实用功能的 Rust Crate。
//! 它为 `ChatRelay` 广播中继服务封装了服务端传输层与帧编解码层，
//! 使上层业务代码只需要面对「身份标识 + 已建立的双工流」与离散的应用帧。
//!
//! 主要模块包括：
//! - `frame`: 帧编解码层，定义 `Frame` 枚举、带空闲读取超时的 `read_frame`，
//!   以及串行化写入的 `FrameWriter`。
//! - `error`: 定义库中使用的统一错误类型 `WsError`。
//! - `server`: 提供 WebSocket 服务器端传输层（监听、升级握手、身份提取）。

pub mod error;
pub mod frame;
pub mod server;
