//! `relay_models` 公共协议模型库 crate。
//!
//! 本 crate 集中定义了 `ChatRelay` 项目中服务端 (`relay_server`) 与任何接入客户端
//! 之间共享的线上协议数据结构，目前主要是二进制命令协议。
//!
//! 主要包含以下类型的模型：
//! - **二进制命令 (`commands`)**: 固定布局的二进制命令帧（命令码 + 负载长度 + 负载），
//!   包括命令码常量 (`COMMAND_PING` / `COMMAND_PONG`)、带边界校验的解析与编码实现，
//!   以及对应的错误类型 `CommandError`。
//!
//! 设计原则：
//! - **共享性**: 此处定义的协议模型同时约束服务端实现与客户端实现（包括集成测试中的测试客户端）。
//! - **安全解析**: 所有从网络读入的字节缓冲区在切片之前必须完成长度校验，
//!   解析失败通过 `Result` 返回而不是 panic。
//! - **可调试性与克隆**: 模型派生 `Debug` 和 `Clone`，便于日志输出与测试断言。

// 声明并公开本 crate 的各个模块
pub mod commands; // 二进制命令协议：命令码、命令帧的解析与编码
