// relay_server/src/ws_server/mod.rs

//! WebSocket 服务端核心模块。
//!
//! 本模块按职责拆分为：
//! - `connection`: 单条连接的句柄（写入端、身份、幂等关闭）。
//! - `registry`: 连接注册表，一把互斥锁同时覆盖映射变更、遍历与广播写入。
//! - `session`: 每条连接一个的会话循环（读取、保活应答、入站分发队列、拆除）。
//! - `dispatcher`: 应用帧分发（文本广播 / 二进制命令应答）。
//! - `service`: 服务装配层，把传输层、注册表与会话循环拼接起来。

pub mod connection;
pub mod dispatcher;
pub mod registry;
pub mod service;
pub mod session;
