// relay_server/src/ws_server/registry.rs

//! WebSocket 连接注册表。
//!
//! 注册表维护「身份标识 → 在线连接」的映射。映射的变更 (`upsert` / `remove`)、
//! 遍历以及广播时对每个对端的写入都在同一把 `tokio::sync::Mutex` 的临界区内完成：
//! 广播彼此串行，也与注册/注销串行，单条出站连接上不会出现并发写入竞争。
//! 这一不变式由类型结构本身保证（映射只能经由本模块的方法访问）。
//!
//! 进程关闭时 `close_all` 在原子标志的保护下恰好执行一次，关闭所有在线连接
//! 但不清除表项（进程即将退出）。

use crate::ws_server::connection::Connection;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// 管理所有在线 WebSocket 连接的注册表。
#[derive(Debug)]
pub struct ConnectionRegistry {
    /// 身份标识 → 连接句柄 的映射。一把锁覆盖映射变更、遍历与广播写入。
    connections: Mutex<HashMap<String, Arc<Connection>>>,

    /// 进程级关闭是否已执行的一次性标志。
    shutdown: AtomicBool,
}

impl ConnectionRegistry {
    /// 创建一个新的 ConnectionRegistry 实例
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
        }
    }

    /// 注册一条新连接；同一身份已有连接时原子地替换并返回被顶替的旧连接。
    ///
    /// 任何时刻一个身份至多对应一条连接。被顶替的连接恰好被返回一次，
    /// 由调用方在锁区之外负责关闭它（防止旧套接字泄漏）。
    ///
    /// # Arguments
    /// * `connection` - 新连接的句柄，注册键取自其 `user_id`。
    ///
    /// # Returns
    /// 如果该身份此前已有连接，返回 `Some(被顶替的连接)`，否则返回 `None`。
    pub async fn upsert(&self, connection: Arc<Connection>) -> Option<Arc<Connection>> {
        let user_id = connection.user_id.clone();
        let mut connections = self.connections.lock().await;
        let previous = connections.insert(user_id.clone(), Arc::clone(&connection));

        match &previous {
            Some(old) => info!(
                "用户 {} 的连接被接管: 旧连接 {} 将被关闭, 新连接 {} 生效 (addr={})",
                user_id, old.conn_id, connection.conn_id, connection.addr
            ),
            None => info!(
                "新客户端注册成功: user={}, conn={}, addr={}",
                user_id, connection.conn_id, connection.addr
            ),
        }
        debug!("当前在线连接总数: {}", connections.len());

        previous
    }

    /// 注销一条连接，仅当表中登记的正是这条连接时才移除。
    ///
    /// 按 `conn_id` 做同一性比较：身份被接管后，旧连接迟到的拆除流程
    /// 不会误删新连接的表项。
    ///
    /// # Returns
    /// 表项确实被移除时返回 `true`。
    pub async fn remove(&self, connection: &Arc<Connection>) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.get(&connection.user_id) {
            Some(current) if current.conn_id == connection.conn_id => {
                connections.remove(&connection.user_id);
                info!(
                    "客户端注销: user={}, conn={}, 在线时长自 {}",
                    connection.user_id, connection.conn_id, connection.connected_at
                );
                debug!("移除后当前在线连接总数: {}", connections.len());
                true
            }
            Some(_) => {
                debug!(
                    "忽略过期的注销请求: user={} 的表项已属于更新的连接 (过期 conn={})",
                    connection.user_id, connection.conn_id
                );
                false
            }
            None => {
                warn!("尝试注销不存在的客户端: user={}", connection.user_id);
                false
            }
        }
    }

    /// 根据身份标识查找在线连接。
    pub async fn get(&self, user_id: &str) -> Option<Arc<Connection>> {
        self.connections.lock().await.get(user_id).map(Arc::clone)
    }

    /// 当前在线连接数。
    pub async fn client_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// 把一条文本消息写给除发送方之外的所有在线连接。
    ///
    /// 整个扇出过程持有注册表锁：广播之间互相串行，也不会与注册/注销交错。
    /// 对单个对端的写入失败只记录日志，不中断对其余对端的扇出。
    ///
    /// # Returns
    /// 成功写入的对端数量。
    pub async fn broadcast_text(&self, sender_id: &str, text: &str) -> usize {
        let connections = self.connections.lock().await;
        let mut delivered = 0;

        for (user_id, connection) in connections.iter() {
            if user_id == sender_id {
                continue; // 发送方不接收自己的消息
            }
            match connection.send_text(text).await {
                Ok(()) => {
                    debug!("{} 发送给 {}: {}", sender_id, user_id, text);
                    delivered += 1;
                }
                Err(e) => {
                    // 单个对端的失败被隔离，扇出继续
                    error!("向 {} 写入广播消息失败: {}", user_id, e);
                }
            }
        }

        delivered
    }

    /// 向指定身份的连接单独写入一个二进制帧（命令应答路径）。
    ///
    /// # Returns
    /// 目标在线且写入成功时返回 `true`。
    pub async fn send_binary_to(&self, user_id: &str, payload: Vec<u8>) -> bool {
        let connections = self.connections.lock().await;
        match connections.get(user_id) {
            Some(connection) => match connection.send_binary(payload).await {
                Ok(()) => true,
                Err(e) => {
                    error!("向 {} 写入二进制应答失败: {}", user_id, e);
                    false
                }
            },
            None => {
                // 发送方可能在分发完成前已经断开
                warn!("二进制应答的目标 {} 已不在线", user_id);
                false
            }
        }
    }

    /// 关闭所有在线连接，恰好执行一次。
    ///
    /// 并发的多次调用中只有第一次会真正执行；表项不被清除（进程即将终止），
    /// 在会话已经自行拆除之后调用同样安全。被关闭的连接会在下一次读取时
    /// 失败，并经由会话循环的正常拆除路径自行退出。
    pub async fn close_all(&self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            debug!("close_all 已执行过，本次调用被忽略");
            return;
        }

        let connections = self.connections.lock().await;
        info!("正在统一关闭所有在线连接，共 {} 条", connections.len());
        for (user_id, connection) in connections.iter() {
            if connection.close().await {
                info!("已关闭用户 {} 的连接 (conn={})", user_id, connection.conn_id);
            }
        }
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// 连接注册表单元测试：基于本地回环地址上的真实 WebSocket 连接对。
#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use relay_websocket_utils::frame::FrameWriter;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::protocol::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, accept_async, connect_async};

    type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

    /// 建立一对真实的 WebSocket 连接：返回服务端视角的 `Connection` 与客户端流。
    async fn test_connection(user: &str) -> (Arc<Connection>, ClientWs) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("无法绑定随机端口");
        let addr = listener.local_addr().expect("无法获取监听地址");

        let accept_task = tokio::spawn(async move {
            let (stream, peer_addr) = listener.accept().await.expect("接受连接失败");
            let ws = accept_async(stream).await.expect("服务端握手失败");
            (ws, peer_addr)
        });

        let (client_ws, _) = connect_async(format!("ws://{}/", addr)).await.expect("客户端连接失败");
        let (server_ws, peer_addr) = accept_task.await.expect("服务端任务失败");

        let (sink, _receiver) = server_ws.split();
        let writer = FrameWriter::new(sink, Duration::from_secs(2));
        (Arc::new(Connection::new(user.to_string(), peer_addr, writer)), client_ws)
    }

    /// 断言客户端在给定时间内收到了指定文本。
    async fn expect_text(client: &mut ClientWs, expected: &str) {
        match tokio::time::timeout(Duration::from_secs(2), client.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => assert_eq!(text, expected, "收到的文本与预期不符"),
            other => panic!("未收到预期的文本帧 '{}', 而是: {:?}", expected, other),
        }
    }

    /// 断言客户端在给定时间内没有收到任何帧。
    async fn expect_silence(client: &mut ClientWs) {
        let result = tokio::time::timeout(Duration::from_millis(400), client.next()).await;
        assert!(result.is_err(), "不应收到任何帧，但收到了: {:?}", result);
    }

    #[tokio::test]
    async fn test_upsert_reports_displaced_connection_exactly_once() {
        let registry = ConnectionRegistry::new();
        let (c1, _client1) = test_connection("alice").await;
        let (c2, _client2) = test_connection("alice").await;

        assert!(registry.upsert(Arc::clone(&c1)).await.is_none(), "首次注册不应有被顶替的连接");
        let displaced = registry.upsert(Arc::clone(&c2)).await;
        assert_eq!(
            displaced.expect("二次注册应返回被顶替的连接").conn_id,
            c1.conn_id,
            "被顶替的应是第一条连接"
        );

        // 同一身份任何时刻至多一条连接，且生效的是新连接
        assert_eq!(registry.client_count().await, 1);
        assert_eq!(
            registry.get("alice").await.expect("alice 应在线").conn_id,
            c2.conn_id,
            "接管后表项应指向新连接"
        );
    }

    #[tokio::test]
    async fn test_remove_guard_ignores_stale_teardown() {
        let registry = ConnectionRegistry::new();
        let (c1, _client1) = test_connection("alice").await;
        let (c2, _client2) = test_connection("alice").await;

        registry.upsert(Arc::clone(&c1)).await;
        registry.upsert(Arc::clone(&c2)).await;

        // 旧连接迟到的拆除流程不得误删新连接的表项
        assert!(!registry.remove(&c1).await, "过期连接的注销不应移除表项");
        assert_eq!(registry.client_count().await, 1, "新连接的表项应保留");

        assert!(registry.remove(&c2).await, "当前连接的注销应成功");
        assert_eq!(registry.client_count().await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_excludes_sender() {
        let registry = ConnectionRegistry::new();
        let (conn_a, mut client_a) = test_connection("a").await;
        let (conn_b, mut client_b) = test_connection("b").await;

        registry.upsert(conn_a).await;
        registry.upsert(conn_b).await;

        let delivered = registry.broadcast_text("a", "hi ----from a").await;
        assert_eq!(delivered, 1, "只有一个对端应收到广播");

        expect_text(&mut client_b, "hi ----from a").await;
        expect_silence(&mut client_a).await;
    }

    #[tokio::test]
    async fn test_send_binary_to_targets_single_client() {
        let registry = ConnectionRegistry::new();
        let (conn_a, mut client_a) = test_connection("a").await;
        let (conn_b, mut client_b) = test_connection("b").await;

        registry.upsert(conn_a).await;
        registry.upsert(conn_b).await;

        assert!(registry.send_binary_to("a", vec![0, 102, 0, 0, 0, 0]).await, "向在线客户端写入应成功");
        assert!(!registry.send_binary_to("ghost", vec![0]).await, "目标不在线时应返回 false");

        match tokio::time::timeout(Duration::from_secs(2), client_a.next()).await {
            Ok(Some(Ok(Message::Binary(payload)))) => {
                assert_eq!(payload, vec![0, 102, 0, 0, 0, 0], "收到的二进制应答不符")
            }
            other => panic!("客户端 a 未收到预期的二进制帧: {:?}", other),
        }
        expect_silence(&mut client_b).await;
    }

    #[tokio::test]
    async fn test_close_all_runs_exactly_once_under_concurrency() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (c1, _client1) = test_connection("a").await;
        let (c2, _client2) = test_connection("b").await;

        registry.upsert(Arc::clone(&c1)).await;
        registry.upsert(Arc::clone(&c2)).await;

        // 两个任务并发触发统一关闭
        let r1 = Arc::clone(&registry);
        let r2 = Arc::clone(&registry);
        tokio::join!(r1.close_all(), r2.close_all());

        // 所有连接都已在统一关闭中被关掉：此处的 close 不再执行任何动作
        assert!(!c1.close().await, "连接 a 应已在 close_all 中被关闭");
        assert!(!c2.close().await, "连接 b 应已在 close_all 中被关闭");

        // 表项保留（进程即将退出，不做清理）
        assert_eq!(registry.client_count().await, 2, "close_all 不应清除表项");

        // 会话自行拆除之后再次调用依然安全
        registry.remove(&c1).await;
        registry.close_all().await;
    }
}
