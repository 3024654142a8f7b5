//! Agent 错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：格式错误 -> RetryWithPrompt，工具错误 -> Observe，其余 -> Abort。

use thiserror::Error;

use crate::agent::FallbackError;
use crate::llm::LlmError;
use crate::react::FormatIssue;
use crate::tools::{RegistryError, ToolError};

/// Agent 运行与启动过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Fallback store error: {0}")]
    Fallback(#[from] FallbackError),

    #[error("Output format error: {0}")]
    Format(#[from] FormatIssue),

    #[error("Config error: {0}")]
    Config(String),

    /// 最终回复无法解码为预期的结构
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Cancelled")]
    Cancelled,

    /// 后台运行任务异常结束（panic 或被中止）
    #[error("Agent task failed: {0}")]
    Task(String),
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 将纠正提示注入下一轮，让模型重新按格式输出
    RetryWithPrompt(String),
    /// 把错误作为观察结果写回对话，由模型自行修正
    Observe(String),
    /// 终止当前运行
    Abort,
}
