// relay_server/src/ws_server/connection.rs

//! 单条 WebSocket 连接的服务端句柄。

use chrono::{DateTime, Utc};
use relay_websocket_utils::error::WsError;
use relay_websocket_utils::frame::FrameWriter;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// 代表一条已连接到服务器的 WebSocket 客户端连接。
///
/// 每个成功完成升级握手并通过身份校验的连接都会在服务端对应一个 `Connection` 实例。
/// 该实例由其会话循环任务持有（读取方向），同时注册表持有一份用于广播/查找的
/// 共享引用（非拥有关系：除进程整体关闭外，注册表从不主动关闭连接）。
///
/// `conn_id` 是服务端为这条物理连接生成的 UUID v4，与客户端自报的 `user_id` 相互独立。
/// 同一身份被接管（takeover）时会出现两条 `user_id` 相同但 `conn_id` 不同的连接，
/// 注册表的带守卫移除正是依据 `conn_id` 区分新旧连接。
#[derive(Debug)]
pub struct Connection {
    /// 由服务端在连接建立时生成的物理连接标识 (UUID 版本 4)。
    pub conn_id: Uuid,

    /// 客户端在升级请求中自报的身份标识，注册表以它为键。
    pub user_id: String,

    /// 客户端 WebSocket 连接的源网络地址。
    pub addr: SocketAddr,

    /// 此连接在服务端被成功建立的时间戳 (UTC)。
    pub connected_at: DateTime<Utc>,

    /// 串行化的写入端。并发写入者（广播扇出、会话内的保活应答）在其内部互斥锁上排队。
    writer: FrameWriter,

    /// 连接是否已被关闭的原子标志。保证关闭动作恰好执行一次，
    /// 对已关闭连接再次调用 `close` 是安全的空操作。
    closed: AtomicBool,
}

impl Connection {
    /// 为一条新完成握手的连接创建句柄。
    pub fn new(user_id: String, addr: SocketAddr, writer: FrameWriter) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            user_id,
            addr,
            connected_at: Utc::now(),
            writer,
            closed: AtomicBool::new(false),
        }
    }

    /// 向该连接发送一个文本帧。
    pub async fn send_text(&self, text: &str) -> Result<(), WsError> {
        self.writer.send_text(text).await
    }

    /// 向该连接发送一个二进制帧。
    pub async fn send_binary(&self, payload: Vec<u8>) -> Result<(), WsError> {
        self.writer.send_binary(payload).await
    }

    /// 回复一个协议层 Pong 帧。
    pub async fn send_pong(&self, payload: Vec<u8>) -> Result<(), WsError> {
        self.writer.send_pong(payload).await
    }

    /// 关闭该连接的写入方向，幂等。
    ///
    /// 只有第一次调用会真正执行关闭并返回 `true`；后续调用（包括并发调用）
    /// 直接返回 `false`，不产生任何副作用。
    pub async fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false; // 已有调用完成过关闭
        }
        self.writer.close().await;
        true
    }

    /// 该连接是否已被关闭。
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
