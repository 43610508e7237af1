// relay_websocket_utils/src/server/transport.rs

//! 包含服务端 WebSocket 监听、升级握手与身份提取逻辑。

use crate::error::WsError; // 引入自定义错误类型
use log::{error, info, warn};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::handshake::server::{ErrorResponse, Request, Response},
    tungstenite::http::StatusCode,
};

/// `WsStream` 是一个类型别名，代表经过 WebSocket 握手后的 TCP 流。
pub type WsStream = WebSocketStream<TcpStream>;

/// 升级请求中携带客户端身份标识的查询参数名。
pub const IDENTITY_QUERY_KEY: &str = "user";

/// `ServerTransport` 结构体负责处理 WebSocket 服务端的监听和连接接受。
pub struct ServerTransport;

impl ServerTransport {
    /// 启动 WebSocket 服务器并开始监听指定的地址。
    ///
    /// 对于每一个成功完成升级握手、且携带了合法身份标识的连接，都会调用
    /// `on_connect` 回调函数进行处理。身份标识取自升级请求 URI 的 `user`
    /// 查询参数；缺失或为空白的身份会让握手以 HTTP 400 被拒绝，连接在
    /// 进入任何注册流程之前就被关闭。
    ///
    /// 这个服务器会持续运行，直到进程被终止；唯一会让本函数返回错误的
    /// 情况是 TCP 监听器绑定失败。
    ///
    /// # Arguments
    /// * `addr`: 服务器监听的 `SocketAddr` (例如 "127.0.0.1:8080")。
    /// * `on_connect`: 一个回调函数，当新的 WebSocket 连接建立时被调用。
    ///   该函数接收三个参数：
    ///     - `identity`: 客户端自报的身份标识（非空）。
    ///     - `ws_stream`: 建立的 `WsStream`。
    ///     - `peer_addr`: 连接方的 `SocketAddr`。
    ///   此回调函数必须是 `async` 的，并且是 `Send + Sync + Clone + 'static`，
    ///   因为它会在一个新的 Tokio 任务中为每个连接执行。
    ///
    /// # Returns
    /// * `Result<(), WsError>`: 如果监听器绑定失败，则返回错误；否则，此函数将无限期运行。
    pub async fn start<F, Fut>(addr: SocketAddr, on_connect: F) -> Result<(), WsError>
    where
        F: Fn(String, WsStream, SocketAddr) -> Fut + Send + Sync + Clone + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        // 绑定失败是唯一的进程级致命错误，直接向上返回
        let listener = TcpListener::bind(&addr).await.map_err(WsError::IoError)?;
        info!("WebSocket 服务器正在监听地址: {}", addr);

        // 无限循环以接受新的连接
        loop {
            match listener.accept().await {
                Ok((tcp_stream, peer_addr)) => {
                    info!("从 {} 接受了新的 TCP 连接", peer_addr);

                    // 为每个连接克隆回调函数
                    let on_connect_callback = on_connect.clone();

                    // 为每个连接创建一个新的 Tokio 任务来处理握手和后续逻辑
                    tokio::spawn(async move {
                        // 在握手回调中提取并校验身份标识；校验不通过时用
                        // HTTP 400 拒绝升级，物理连接随之关闭。
                        let mut identity: Option<String> = None;
                        let header_callback = |request: &Request, response: Response| {
                            match identity_from_query(request.uri().query()) {
                                Some(user) => {
                                    identity = Some(user);
                                    Ok(response)
                                }
                                None => {
                                    warn!(
                                        "拒绝来自 {} 的匿名升级请求 (缺少 {} 查询参数)",
                                        peer_addr, IDENTITY_QUERY_KEY
                                    );
                                    let mut reject = ErrorResponse::new(Some(
                                        "missing client identity".to_string(),
                                    ));
                                    *reject.status_mut() = StatusCode::BAD_REQUEST;
                                    Err(reject)
                                }
                            }
                        };

                        // 先完成握手再读取身份，确保回调对 identity 的借用已经结束
                        let handshake_result = accept_hdr_async(tcp_stream, header_callback).await;
                        match handshake_result {
                            Ok(ws_stream) => {
                                // 握手成功时身份一定已经被回调填充
                                let Some(user) = identity else {
                                    error!("与 {} 的握手成功但身份标识缺失，放弃该连接", peer_addr);
                                    return;
                                };
                                info!("与 {} 的 WebSocket 握手成功, 身份标识: {}", peer_addr, user);
                                // 调用用户提供的连接处理回调
                                on_connect_callback(user, ws_stream, peer_addr).await;
                            }
                            Err(e) => {
                                // 握手失败（包括被身份校验拒绝的情况），记录后终止此连接的任务
                                warn!("与 {} 的 WebSocket 握手未完成: {}", peer_addr, e);
                            }
                        }
                    });
                }
                Err(e) => {
                    // 接受 TCP 连接失败，记录错误并继续监听其他连接
                    error!("接受 TCP 连接失败: {}。服务器将继续运行。", e);
                }
            }
        }
    }
}

/// 从升级请求的查询字符串中提取客户端身份标识。
///
/// 返回 `None` 的情况：没有查询字符串、没有 `user` 参数、或参数值去除
/// 首尾空白后为空。
fn identity_from_query(query: Option<&str>) -> Option<String> {
    let query = query?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == IDENTITY_QUERY_KEY)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
