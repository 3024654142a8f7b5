//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：complete(messages, stop) 返回原始生成文本。
//! 后端内部不做重试，重试策略属于调用方。

use async_trait::async_trait;
use thiserror::Error;

use crate::memory::Message;
use crate::text::truncate_chars;

/// 后端调用失败（认证、配额/限流、传输、上游错误）；对当前运行是致命的
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limited or quota exceeded: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl LlmError {
    /// 按 HTTP 状态码归类：401/403 认证，429 限流，其余为上游错误
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = format!("HTTP {}: {}", status, truncate_chars(body, 300));
        match status {
            401 | 403 => LlmError::Authentication(detail),
            429 => LlmError::RateLimited(detail),
            _ => LlmError::Upstream(detail),
        }
    }
}

/// LLM 客户端 trait：对完整对话做一次非流式补全，并遵守 stop 序列
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 后端标识（日志用）
    fn name(&self) -> &str;

    /// 非流式完成；返回的文本已按 stop 序列截断
    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<String, LlmError>;

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
