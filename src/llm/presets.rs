//! OpenAI 兼容端点预设（DeepSeek / Groq）
//!
//! 两家都提供与 OpenAI 兼容的 Chat Completions 接口，只需替换 base_url 与默认模型。

use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const GROQ_DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// 创建 DeepSeek 客户端；model 为 None 时使用 deepseek-chat
pub fn create_deepseek_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(
        Some(DEEPSEEK_BASE_URL),
        model.unwrap_or(DEEPSEEK_CHAT),
        api_key,
    )
    .with_label("deepseek")
}

/// 创建 Groq 客户端；model 为 None 时使用 llama-3.3-70b-versatile
pub fn create_groq_client(model: Option<&str>, api_key: &str) -> OpenAiClient {
    OpenAiClient::new(Some(GROQ_BASE_URL), model.unwrap_or(GROQ_DEFAULT_MODEL), api_key)
        .with_label("groq")
}
