// relay_models/src/commands.rs

//! 二进制命令协议的定义与编解码。
//!
//! 客户端可以通过 WebSocket 的二进制帧向服务端发送命令。命令帧采用固定布局（大端序）：
//! - 字节 [0, 2)：命令码 (`u16`)；
//! - 字节 [2, 6)：负载长度 (`u32`)；
//! - 字节 [6, 6+len)：负载内容。
//!
//! 目前定义的命令只有 `COMMAND_PING`，服务端收到后会向发送方单独回复一个
//! `COMMAND_PONG` 命令帧（仅含 6 字节头部，负载长度为 0）。其余命令码保留，
//! 服务端收到后不做任何回复。
//!
//! 解析入口 `BinaryCommand::parse` 在切片之前校验缓冲区长度：头部不足 6 字节、
//! 或声明的负载长度超过缓冲区剩余字节数时均返回 `CommandError`，绝不越界读取。

use thiserror::Error; // 引入 thiserror 来简化错误类型的定义

/// 客户端请求命令码：Ping。
pub const COMMAND_PING: u16 = 101;
/// 服务端应答命令码：Pong。
pub const COMMAND_PONG: u16 = 102;

/// 命令帧固定头部的长度（命令码 2 字节 + 负载长度 4 字节）。
pub const COMMAND_HEADER_LEN: usize = 6;

/// 二进制命令帧解析过程中可能出现的错误。
///
/// 这些错误只表示单个命令帧不合法，不代表连接本身出现问题；
/// 调用方应记录日志并丢弃该帧，会话可以继续处理后续帧。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// 缓冲区长度不足以容纳固定头部（6 字节）。
    #[error("命令帧过短: 实际 {actual} 字节, 至少需要 6 字节头部")]
    HeaderTooShort {
        /// 实际收到的字节数。
        actual: usize,
    },

    /// 头部声明的负载长度超过了缓冲区中实际剩余的字节数。
    #[error("命令负载不完整: 头部声明 {declared} 字节, 实际仅剩 {available} 字节")]
    PayloadTruncated {
        /// 头部中声明的负载长度。
        declared: usize,
        /// 头部之后实际剩余的字节数。
        available: usize,
    },
}

/// 一个已解析的二进制命令帧。
///
/// `code` 为命令码，`payload` 为按头部声明长度截取出的负载内容。
/// 缓冲区中超出声明长度的尾部字节在解析时被忽略。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryCommand {
    /// 命令码，例如 [`COMMAND_PING`]。
    pub code: u16,
    /// 命令负载，长度由头部声明。
    pub payload: Vec<u8>,
}

impl BinaryCommand {
    /// 使用给定的命令码与负载构造一个命令帧。
    pub fn new(code: u16, payload: Vec<u8>) -> Self {
        Self { code, payload }
    }

    /// 构造服务端的标准 Pong 应答命令（无负载）。
    ///
    /// 编码后恰好是 6 字节：`{0, 102, 0, 0, 0, 0}`。
    pub fn pong() -> Self {
        Self::new(COMMAND_PONG, Vec::new())
    }

    /// 从字节缓冲区解析一个命令帧。
    ///
    /// 解析顺序：先校验缓冲区长度是否足以容纳 6 字节固定头部，再读取命令码与
    /// 声明的负载长度，最后校验声明长度不超过缓冲区剩余字节数后才进行切片。
    ///
    /// # Arguments
    /// * `buf` - 从 WebSocket 二进制帧中取出的完整负载字节。
    ///
    /// # Returns
    /// * `Result<BinaryCommand, CommandError>` - 解析成功返回命令帧；
    ///   头部不足或负载不完整时返回对应的 `CommandError`。
    pub fn parse(buf: &[u8]) -> Result<Self, CommandError> {
        if buf.len() < COMMAND_HEADER_LEN {
            return Err(CommandError::HeaderTooShort { actual: buf.len() });
        }

        let code = u16::from_be_bytes([buf[0], buf[1]]); // 字节 [0, 2)
        let declared = u32::from_be_bytes([buf[2], buf[3], buf[4], buf[5]]) as usize; // 字节 [2, 6)

        // 声明长度必须先于切片完成校验，防止越界读取。
        let available = buf.len() - COMMAND_HEADER_LEN;
        if declared > available {
            return Err(CommandError::PayloadTruncated { declared, available });
        }

        Ok(Self {
            code,
            payload: buf[COMMAND_HEADER_LEN..COMMAND_HEADER_LEN + declared].to_vec(),
        })
    }

    /// 将命令帧编码为线上字节布局（大端序头部 + 负载）。
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(COMMAND_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.code.to_be_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

// 二进制命令协议单元测试
#[cfg(test)]
mod tests {
    use super::*; // 导入当前模块 (commands) 的所有公共项

    #[test]
    /// 测试标准 Ping 命令帧（6 字节，无负载）能够被正确解析。
    fn test_parse_ping_command_without_payload() {
        let buf = [0u8, 101, 0, 0, 0, 0];
        let command = BinaryCommand::parse(&buf).expect("解析合法的 Ping 命令帧失败");
        assert_eq!(command.code, COMMAND_PING, "命令码与预期的 Ping 不符");
        assert!(command.payload.is_empty(), "Ping 命令不应携带负载");
    }

    #[test]
    /// 测试携带负载的命令帧：负载按头部声明的长度截取，尾部多余字节被忽略。
    fn test_parse_command_with_payload_ignores_trailing_bytes() {
        // 命令码 7，声明负载 3 字节，缓冲区尾部额外带 2 个无关字节
        let buf = [0u8, 7, 0, 0, 0, 3, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE];
        let command = BinaryCommand::parse(&buf).expect("解析携带负载的命令帧失败");
        assert_eq!(command.code, 7, "命令码解析错误");
        assert_eq!(command.payload, vec![0xAA, 0xBB, 0xCC], "负载应严格按声明长度截取");
    }

    #[test]
    /// 测试短于固定头部的缓冲区返回 `HeaderTooShort` 而不是 panic。
    fn test_parse_buffer_shorter_than_header_fails_safely() {
        let buf = [0u8, 101, 0];
        let result = BinaryCommand::parse(&buf);
        assert_eq!(
            result,
            Err(CommandError::HeaderTooShort { actual: 3 }),
            "过短的缓冲区应返回 HeaderTooShort 错误"
        );
    }

    #[test]
    /// 测试头部声明的负载长度超过实际剩余字节时返回 `PayloadTruncated`。
    fn test_parse_declared_length_beyond_buffer_fails_safely() {
        // 声明负载 16 字节，但头部之后只有 2 字节
        let buf = [0u8, 101, 0, 0, 0, 16, 0x01, 0x02];
        let result = BinaryCommand::parse(&buf);
        assert_eq!(
            result,
            Err(CommandError::PayloadTruncated { declared: 16, available: 2 }),
            "声明长度越界时应返回 PayloadTruncated 错误"
        );
    }

    #[test]
    /// 测试 Pong 应答命令的编码结果与协议规定的固定 6 字节完全一致。
    fn test_pong_encodes_to_fixed_six_byte_frame() {
        let encoded = BinaryCommand::pong().encode();
        assert_eq!(encoded, vec![0u8, 102, 0, 0, 0, 0], "Pong 应答的编码结果不符合协议");
    }

    #[test]
    /// 测试编码后再解析能够还原出等价的命令帧。
    fn test_encode_then_parse_roundtrip() {
        let original = BinaryCommand::new(COMMAND_PING, vec![1, 2, 3, 4]);
        let parsed = BinaryCommand::parse(&original.encode()).expect("解析自身编码结果失败");
        assert_eq!(parsed, original, "编码后再解析得到的命令帧与原始命令帧不一致");
    }

    #[test]
    /// 测试未知命令码也能被解析（是否处理由上层决定，解析层不做限制）。
    fn test_parse_unknown_command_code_succeeds() {
        let buf = [0u8, 200, 0, 0, 0, 0];
        let command = BinaryCommand::parse(&buf).expect("解析未知命令码的命令帧失败");
        assert_eq!(command.code, 200, "未知命令码应原样透出给上层");
    }
}
