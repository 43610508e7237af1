// relay_server/src/ws_server/service.rs

//! WebSocket 服务装配层：把传输层、连接注册表与会话循环拼接成完整服务。

use crate::config::WebSocketConfig;
use crate::error::AppError;
use crate::ws_server::connection::Connection;
use crate::ws_server::registry::ConnectionRegistry;
use crate::ws_server::session::{self, SessionOptions};
use anyhow::{Context, Result};
use futures_util::StreamExt;
use log::{info, warn};
use relay_websocket_utils::frame::FrameWriter;
use relay_websocket_utils::server::transport::{ServerTransport, WsStream};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// WebSocket 服务结构体，封装了配置和连接注册表。
pub struct WsService {
    config: WebSocketConfig,
    registry: Arc<ConnectionRegistry>,
}

impl WsService {
    /// 创建一个新的 WsService 实例。
    pub fn new(config: WebSocketConfig, registry: Arc<ConnectionRegistry>) -> Self {
        info!("[WsService] 新实例已创建。");
        Self { config, registry }
    }

    /// 启动 WebSocket 服务端。
    ///
    /// 监听地址绑定失败是唯一会让本方法返回错误的启动故障；
    /// 此后服务将一直运行，每条新连接的完整生命周期如下：
    /// 升级握手（含身份校验，由传输层完成）→ 注册表登记（同一身份的旧连接
    /// 在锁区之外被关闭）→ 会话循环直至连接拆除。
    pub async fn start(&self) -> Result<(), anyhow::Error> {
        info!("[WsService] 正在启动 WebSocket 服务...");
        info!(
            "[WsService] 配置: host={}, port={}, 空闲读取超时={}s, 写入超时={}s",
            self.config.host,
            self.config.port,
            self.config.read_timeout_seconds,
            self.config.write_timeout_seconds
        );

        let listen_addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| AppError::ConfigError(format!("监听地址不合法: {}", e)))
            .context("解析 WebSocket 监听地址失败")?;

        let session_options = SessionOptions {
            read_timeout: Duration::from_secs(self.config.read_timeout_seconds),
            dispatch_queue_capacity: self.config.dispatch_queue_capacity,
        };
        let write_timeout = Duration::from_secs(self.config.write_timeout_seconds);

        let on_new_connection_cb = {
            let registry_for_cb = Arc::clone(&self.registry);

            move |user_id: String, ws_stream: WsStream, peer_addr: SocketAddr| {
                let registry = Arc::clone(&registry_for_cb);

                async move {
                    // 把双工流拆成读写两半：写半边交给串行化的 FrameWriter，
                    // 读半边由会话循环独占
                    let (sink, receiver) = ws_stream.split();
                    let writer = FrameWriter::new(sink, write_timeout);
                    let connection = Arc::new(Connection::new(user_id.clone(), peer_addr, writer));

                    info!(
                        "[WsService] 新客户端连接: user={}, conn={}, addr={}",
                        user_id, connection.conn_id, peer_addr
                    );

                    // 登记；同一身份的旧连接在锁区之外被关闭（幂等，安全）
                    if let Some(previous) = registry.upsert(Arc::clone(&connection)).await {
                        previous.close().await;
                    }

                    // 会话循环运行至连接拆除，拆除内部完成注销
                    session::run_session(registry, connection, receiver, session_options).await;
                }
            }
        };

        ServerTransport::start(listen_addr, on_new_connection_cb)
            .await
            .map_err(|e| AppError::WebSocketService(e.to_string()))
            .context("WebSocket 服务器启动或运行失败")?;

        warn!("[WsService] WebSocket 服务器已意外停止。");
        Ok(())
    }
}
