use log::{LevelFilter, error, info};
use relay_server::config;
use relay_server::ws_server::registry::ConnectionRegistry;
use relay_server::ws_server::service::WsService;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    // 初始化日志记录器
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .init();
    info!("[主程序] 日志系统已成功初始化 (env_logger)，默认级别: Info。");

    // 初始化应用配置
    config::init_config();
    let app_config = config::get_config();
    info!(
        "[主程序] 应用配置已加载。服务器标识: {}, 监听地址: {}:{}",
        app_config.server_id, app_config.websocket.host, app_config.websocket.port
    );

    // 创建连接注册表
    let registry = Arc::new(ConnectionRegistry::new());
    info!("[主程序] 连接注册表 (ConnectionRegistry) 已创建。");

    // 为 WebSocket 服务创建一个新的 WsService 实例
    let service = WsService::new(app_config.websocket.clone(), Arc::clone(&registry));

    // 启动 WebSocket 服务，并同时等待退出信号；
    // 收到退出信号时对所有在线连接执行恰好一次的统一关闭。
    tokio::select! {
        result = service.start() => {
            if let Err(e) = result {
                error!("[主程序] 致命错误：启动 WebSocket 服务时发生严重问题: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("[主程序] 收到退出信号，正在关闭所有在线连接...");
            registry.close_all().await;
            info!("[主程序] 所有在线连接已关闭，进程即将退出。");
        }
    }
}
