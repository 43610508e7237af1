//! `relay_server` 服务端核心库。
//!
//! 本 Crate 是 `ChatRelay` 广播中继服务器的核心实现：客户端通过 WebSocket 连接
//! 并以查询参数自报身份，任何客户端发送的文本消息会被扇出给其余所有在线客户端，
//! 二进制命令帧则只向发送方本人应答。
//!
//! 主要模块包括：
//! - `config`: 管理应用的配置信息加载与访问。
//! - `error`: 定义应用特定的错误类型。
//! - `ws_server`: 实现 WebSocket 服务端核心，包含连接句柄、连接注册表、
//!   会话循环、消息分发与服务装配。

pub mod config;
pub mod error;
pub mod ws_server;
