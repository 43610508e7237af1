// relay_server/src/ws_server/dispatcher.rs

//! 负责处理会话循环移交下来的应用帧，并根据帧类型进行分发处理。
//!
//! 两条子协议按帧类型选择：
//! - **文本帧 → 广播**：把消息打上发送方身份标签后写给其余所有在线客户端。
//! - **二进制帧 → 命令**：按固定布局解析命令帧，目前只识别 Ping 命令，
//!   向发送方本人应答固定的 Pong 命令帧；未知命令码不做任何回复。
//!
//! 不合法的二进制命令（头部不足、声明长度越界）只记录日志并丢弃该帧，
//! 发送方的会话继续处理后续帧。

use crate::ws_server::registry::ConnectionRegistry;
use log::{debug, info, warn};
use relay_models::commands::{BinaryCommand, COMMAND_PING};
use relay_websocket_utils::frame::Frame;

/// 广播消息中发送方身份标签的分隔串。
const BROADCAST_TAG: &str = " ----from ";

/// 为一条待广播的文本消息附加发送方身份标签。
///
/// 输出形如 `"<消息内容> ----from <发送方身份>"`。
pub fn format_broadcast(text: &str, sender_id: &str) -> String {
    format!("{}{}{}", text, BROADCAST_TAG, sender_id)
}

/// 异步处理一个来自客户端的应用帧。
///
/// 此函数由每条连接的分发任务按接收顺序逐帧调用，因此同一发送方的
/// 消息对所有对端保持先进先出；不同发送方之间的交错顺序不作保证。
///
/// # 参数
/// * `registry`: 连接注册表，广播与应答都经由它在锁内完成写入。
/// * `sender_id`: 发送此帧的客户端身份标识。
/// * `frame`: 会话循环移交的应用帧（文本或二进制）。
pub async fn handle_frame(registry: &ConnectionRegistry, sender_id: &str, frame: Frame) {
    match frame {
        Frame::Text(text) => {
            info!("收到来自 {} 的文本消息: {}", sender_id, text);
            let outgoing = format_broadcast(&text, sender_id);
            let delivered = registry.broadcast_text(sender_id, &outgoing).await;
            debug!("来自 {} 的消息已扇出给 {} 个对端", sender_id, delivered);
        }
        Frame::Binary(payload) => {
            debug!("收到来自 {} 的二进制帧, 共 {} 字节", sender_id, payload.len());
            match BinaryCommand::parse(&payload) {
                Ok(command) if command.code == COMMAND_PING => {
                    // Ping 命令只应答发送方本人
                    let replied = registry
                        .send_binary_to(sender_id, BinaryCommand::pong().encode())
                        .await;
                    debug!("已向 {} 应答 Pong 命令 (写入{})", sender_id, if replied { "成功" } else { "失败" });
                }
                Ok(command) => {
                    // 未定义的命令码：不做任何回复
                    debug!("来自 {} 的未知命令码 {}, 忽略", sender_id, command.code);
                }
                Err(e) => {
                    // 不合法的命令帧只影响这一帧，会话继续
                    warn!("来自 {} 的二进制命令帧不合法: {}", sender_id, e);
                }
            }
        }
        other => {
            // 控制帧在会话循环内就地处理，正常情况下不会到达这里
            debug!("分发层忽略非应用帧: {:?}", other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 测试广播标签格式与协议约定完全一致。
    fn test_format_broadcast_tags_sender() {
        assert_eq!(format_broadcast("hi", "a"), "hi ----from a");
        assert_eq!(format_broadcast("", "alice"), " ----from alice", "空消息同样打标签");
    }

    #[tokio::test]
    /// 测试不合法的二进制命令帧被安全丢弃，不会 panic，也不会产生任何应答。
    async fn test_malformed_binary_frame_is_dropped_safely() {
        let registry = ConnectionRegistry::new();
        // 头部不足 6 字节
        handle_frame(&registry, "a", Frame::Binary(vec![0, 101, 0])).await;
        // 声明长度超过缓冲区
        handle_frame(&registry, "a", Frame::Binary(vec![0, 101, 0, 0, 0, 9, 1])).await;
        // 未知命令码
        handle_frame(&registry, "a", Frame::Binary(vec![0, 200, 0, 0, 0, 0])).await;
    }
}
