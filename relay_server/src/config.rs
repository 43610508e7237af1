use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;

/// WebSocket 服务的默认主机地址
pub const DEFAULT_WS_HOST: &str = "0.0.0.0";
/// WebSocket 服务的默认端口号
pub const DEFAULT_WS_PORT: u16 = 8080;
/// 默认的服务器标识
pub const DEFAULT_SERVER_ID: &str = "relay-01";

/// WebSocket 服务端详细配置结构体
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct WebSocketConfig {
    /// WebSocket 服务绑定的主机地址
    pub host: String,
    /// WebSocket 服务监听的端口号
    pub port: u16,
    /// 空闲读取超时时间（单位：秒）。一个连接在此期限内没有任何入站帧即被判定死亡。
    pub read_timeout_seconds: u64,
    /// 单帧写入超时时间（单位：秒）。限制迟缓对端拖住一次广播的时间。
    pub write_timeout_seconds: u64,
    /// 每条连接的入站分发队列容量。队列满时读取循环会被反压，而不是无限派生任务。
    pub dispatch_queue_capacity: usize,
}

// 为 WebSocketConfig 实现 Default trait
impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WS_HOST.to_string(), // 默认监听所有网络接口
            port: DEFAULT_WS_PORT,             // 默认监听 8080 端口
            read_timeout_seconds: 120,         // 默认空闲读取超时 2 分钟
            write_timeout_seconds: 10,         // 默认单帧写入超时 10 秒
            dispatch_queue_capacity: 32,       // 默认每连接 32 帧的分发队列
        }
    }
}

/// 应用的主配置结构体
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppConfig {
    /// 本服务器实例的标识，仅用于启动日志与运维定位
    pub server_id: String,
    /// WebSocket 服务的相关配置
    pub websocket: WebSocketConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_id: DEFAULT_SERVER_ID.to_string(),
            websocket: WebSocketConfig::default(),
        }
    }
}

// 全局静态应用配置实例
static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// 加载或创建应用配置文件
fn load_or_create_config() -> AppConfig {
    // 获取配置文件路径，优先使用当前目录
    let config_file_path = get_config_file_path();

    // 尝试读取配置文件
    match fs::read_to_string(&config_file_path) {
        Ok(content) => {
            // 文件读取成功
            match serde_json::from_str::<AppConfig>(&content) {
                Ok(config) => {
                    // 反序列化成功
                    info!("[配置模块] 已成功从配置文件 {:?} 加载应用配置。", config_file_path);
                    config
                }
                Err(e) => {
                    // 反序列化失败
                    warn!(
                        "[配置模块] 警告：从 {:?} 反序列化配置失败: {}. 文件可能已损坏。将使用默认配置并尝试覆盖。",
                        config_file_path, e
                    );
                    let default_config = AppConfig::default();
                    save_config(&default_config, &config_file_path);
                    default_config
                }
            }
        }
        Err(e) => {
            // 文件读取失败
            info!(
                "[配置模块] 未在 {:?} 找到配置文件或读取时发生错误 (错误: {}). 将使用默认配置并尝试创建新文件。",
                config_file_path, e
            );
            let default_config = AppConfig::default();
            save_config(&default_config, &config_file_path);
            default_config
        }
    }
}

/// 获取配置文件路径
fn get_config_file_path() -> PathBuf {
    // 首先尝试当前目录
    let current_dir = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let config_file_path = current_dir.join("relay_settings.json");

    // 检查当前目录是否可写
    if Path::new(&config_file_path).exists()
        || fs::metadata(&current_dir).map(|m| m.permissions().readonly()).unwrap_or(true) == false
    {
        return config_file_path;
    }

    // 如果当前目录不可写，则尝试使用用户主目录
    if let Ok(home) = env::var("HOME") {
        let home_config = PathBuf::from(home).join(".config").join("relay_server");
        if !home_config.exists() {
            let _ = fs::create_dir_all(&home_config);
        }
        return home_config.join("relay_settings.json");
    } else if let Ok(userprofile) = env::var("USERPROFILE") {
        // Windows环境
        let home_config = PathBuf::from(userprofile)
            .join("AppData")
            .join("Local")
            .join("relay_server");
        if !home_config.exists() {
            let _ = fs::create_dir_all(&home_config);
        }
        return home_config.join("relay_settings.json");
    }

    // 最后返回当前目录的配置文件路径，即使可能写入失败
    config_file_path
}

/// 保存配置到文件
fn save_config(config: &AppConfig, path: &PathBuf) {
    // 确保目录存在
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!("[配置模块] 错误：创建配置目录 {:?} 失败: {}", parent, e);
                return;
            }
        }
    }

    // 尝试将 AppConfig 实例美化并序列化为 JSON 字符串
    match serde_json::to_string_pretty(config) {
        Ok(content) => {
            // 尝试将序列化后的 JSON 字符串内容写入到指定的文件路径
            if let Err(e) = fs::write(path, content) {
                warn!("[配置模块] 错误：将配置写入文件 {:?} 时失败: {}", path, e);
            } else {
                info!("[配置模块] 已成功将当前配置（可能是默认配置）保存到 {:?}.", path);
            }
        }
        Err(e) => {
            warn!("[配置模块] 错误：序列化配置信息以便保存时失败: {}", e);
        }
    }
}

/// 初始化全局应用配置
pub fn init_config() {
    let loaded_config = load_or_create_config();
    if APP_CONFIG.set(loaded_config).is_err() {
        warn!("[配置模块] 全局应用配置 APP_CONFIG 已被初始化，本次 init_config 调用未覆盖已有配置。请检查初始化流程。");
    }
    info!("[配置模块] 应用配置已成功初始化完毕。");
}

/// 获取已加载的全局应用配置
pub fn get_config() -> &'static AppConfig {
    APP_CONFIG.get().expect("[配置模块] 全局应用配置尚未初始化，请先调用 init_config()")
}
