// relay_server/src/ws_server/session.rs

//! 每条连接一个的会话循环。
//!
//! 会话循环的状态很简单：读取 → (分发) → 关闭，进入关闭后不再返回读取。
//! 读取方向由本任务独占；应用帧被移交给一个容量有限的分发队列，由伴生的
//! 分发任务按先进先出逐帧处理，读取因此不必等待一次广播完成。队列满时
//! 读取循环被反压，慢广播不会导致并发任务无界增长。
//!
//! 任何解码错误只终止当前会话，既不影响其他会话，也不会让进程退出。

use crate::ws_server::connection::Connection;
use crate::ws_server::dispatcher;
use crate::ws_server::registry::ConnectionRegistry;
use futures_util::stream::SplitStream;
use log::{debug, error, info, warn};
use relay_websocket_utils::error::WsError;
use relay_websocket_utils::frame::{Frame, read_frame};
use relay_websocket_utils::server::transport::WsStream;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// 会话循环的运行参数，取自应用配置。
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// 空闲读取超时：在此期限内没有任何入站帧即判定连接死亡。
    pub read_timeout: Duration,
    /// 入站分发队列容量。
    pub dispatch_queue_capacity: usize,
}

/// 运行一条连接的完整会话生命周期，直到连接关闭。
///
/// 流程：
/// 1. 派生伴生的分发任务，经由有界 mpsc 队列接收应用帧；
/// 2. 循环读取：协议层 Ping 就地回复 Pong，Close 或任何解码错误进入拆除；
/// 3. 拆除：先关闭队列并等待分发任务把已入队的帧按顺序处理完，
///    再关闭传输，最后从注册表注销（带同一性守卫，不会误删接管者的表项）。
pub async fn run_session(
    registry: Arc<ConnectionRegistry>,
    connection: Arc<Connection>,
    mut receiver: SplitStream<WsStream>,
    options: SessionOptions,
) {
    let user_id = connection.user_id.clone();
    info!(
        "[会话 {}] 会话循环启动 (conn={}, addr={})",
        user_id, connection.conn_id, connection.addr
    );

    // 伴生分发任务：按接收顺序逐帧处理，保证同一发送方的消息先进先出
    let (dispatch_tx, mut dispatch_rx) = mpsc::channel::<Frame>(options.dispatch_queue_capacity);
    let dispatch_registry = Arc::clone(&registry);
    let dispatch_user_id = user_id.clone();
    let dispatcher_handle = tokio::spawn(async move {
        while let Some(frame) = dispatch_rx.recv().await {
            dispatcher::handle_frame(&dispatch_registry, &dispatch_user_id, frame).await;
        }
        debug!("[会话 {}] 分发任务结束，队列已排空", dispatch_user_id);
    });

    // 读取循环
    loop {
        match read_frame(&mut receiver, options.read_timeout).await {
            Ok(Frame::Ping(payload)) => {
                // 保活：在同一连接上立即回复 Pong
                debug!("[会话 {}] 收到 Ping, 回复 Pong", user_id);
                if let Err(e) = connection.send_pong(payload).await {
                    warn!("[会话 {}] 回复 Pong 失败: {}, 进入拆除", user_id, e);
                    break;
                }
            }
            Ok(Frame::Pong(_)) => {
                debug!("[会话 {}] 收到 Pong, 忽略", user_id);
            }
            Ok(Frame::Close) => {
                info!("[会话 {}] 对端主动关闭连接", user_id);
                break;
            }
            Ok(frame @ (Frame::Text(_) | Frame::Binary(_))) => {
                // 移交给分发队列；队列另一端消失说明分发任务已异常退出
                if dispatch_tx.send(frame).await.is_err() {
                    error!("[会话 {}] 分发队列已关闭，进入拆除", user_id);
                    break;
                }
            }
            Err(WsError::ReadTimeout) => {
                warn!("[会话 {}] 空闲读取超时，判定连接死亡", user_id);
                break;
            }
            Err(WsError::ConnectionClosed) => {
                info!("[会话 {}] 读取流结束，对端已断开", user_id);
                break;
            }
            Err(e) => {
                // 解码错误对本会话是终止性的，但不影响其他会话
                warn!("[会话 {}] 读取帧失败: {}, 进入拆除", user_id, e);
                break;
            }
        }
    }

    // 拆除：先让已入队的帧按顺序处理完
    drop(dispatch_tx);
    if let Err(e) = dispatcher_handle.await {
        error!("[会话 {}] 等待分发任务结束时出错: {:?}", user_id, e);
    }

    // 关闭传输（幂等），再从注册表注销
    connection.close().await;
    let removed = registry.remove(&connection).await;
    info!(
        "[会话 {}] 会话结束 (conn={}, 表项移除: {})",
        user_id, connection.conn_id, removed
    );
}
