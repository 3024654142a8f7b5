//! Wayfarer - 旅行智能体的 ReAct 执行引擎
//!
//! 模块划分：
//! - **agent**: 行程规划 / 游记生成编排、结构化结果与兜底库
//! - **config**: 应用配置加载（TOML + 环境变量）与密钥
//! - **core**: 错误类型、恢复策略、组件构建
//! - **llm**: 补全后端抽象与实现（Gemini / OpenAI 兼容 / Mock）
//! - **memory**: 单次运行的对话记录
//! - **react**: 输出解析、system prompt、ReAct 主循环
//! - **tools**: 工具注册表、执行器与各上游工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod react;
pub mod tools;

mod text;
