// relay_websocket_utils/src/server/mod.rs

//! WebSocket 服务端模块。
//!
//! 本模块 (`server`) 及其子模块负责提供 `relay_websocket_utils` 库中
//! 与 WebSocket 服务器端功能相关的组件和逻辑。
//!
//! 主要职责包括：
//! - **服务器启动与监听**: 在指定网络地址和端口上启动监听并接受传入的 TCP 连接。
//! - **升级握手与身份提取**: 处理 WebSocket 升级请求，从升级请求的查询参数中
//!   提取客户端身份标识；匿名连接在注册之前即被拒绝。
//! - **连接移交**: 为每个成功建立的连接调用上层提供的回调，把
//!   `(身份标识, 双工流, 对端地址)` 移交给上层业务逻辑处理。
//!
//! `transport` 子模块包含具体的传输层实现。

pub mod transport; // 公开 transport 子模块，其中包含了主要的服务器端传输层逻辑
