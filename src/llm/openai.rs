//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；OpenAI、DeepSeek、Groq 等共用。
//! Tool 角色的观察消息以 user 消息发送（纯文本协议，不使用原生 function calling）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::llm::stop::apply_stop_sequences;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// OpenAI 接口最多接受 4 个 stop 序列，其余由后处理兜底
const MAX_API_STOP_SEQUENCES: usize = 4;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容客户端：持有 Client、model 名与请求超时
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    label: String,
    request_timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    /// api_key 由调用方在启动时读取后传入，客户端不再读取环境变量
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            label: "openai".to_string(),
            request_timeout: Duration::from_secs(60),
            usage: TokenUsage::new(),
        }
    }

    /// 设置日志中显示的后端名（deepseek / groq 等）
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_openai_messages(
        &self,
        messages: &[Message],
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        messages
            .iter()
            .map(|m| {
                let msg = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::System),
                    Role::User | Role::Tool => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::User),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map(ChatCompletionRequestMessage::Assistant),
                };
                msg.map_err(|e| LlmError::InvalidRequest(e.to_string()))
            })
            .collect()
    }

    fn build_request(
        &self,
        messages: &[Message],
        stop: &[String],
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(self.to_openai_messages(messages)?);
        if !stop.is_empty() {
            args.stop(
                stop.iter()
                    .take(MAX_API_STOP_SEQUENCES)
                    .cloned()
                    .collect::<Vec<String>>(),
            );
        }
        args.build()
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))
    }
}

/// async_openai 的错误不带状态码，按错误文本归类
fn classify_openai_error(err: &OpenAIError) -> LlmError {
    let text = err.to_string();
    let lower = text.to_lowercase();
    if lower.contains("401")
        || lower.contains("invalid api key")
        || lower.contains("incorrect api key")
        || lower.contains("authentication")
        || lower.contains("unauthorized")
    {
        LlmError::Authentication(text)
    } else if lower.contains("429") || lower.contains("rate limit") || lower.contains("quota") {
        LlmError::RateLimited(text)
    } else if matches!(err, OpenAIError::Reqwest(_)) {
        LlmError::Transport(text)
    } else {
        LlmError::Upstream(text)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn name(&self) -> &str {
        &self.label
    }

    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<String, LlmError> {
        let request = self.build_request(messages, stop)?;

        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                LlmError::Transport(format!(
                    "{} request timed out after {}s",
                    self.label,
                    self.request_timeout.as_secs()
                ))
            })?
            .map_err(|e| classify_openai_error(&e))?;

        // 提取 token 使用统计
        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(apply_stop_sequences(&content, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_caps_stop_sequences() {
        let client = OpenAiClient::new(None, "gpt-4o-mini", "sk-test");
        let stop: Vec<String> = (0..6).map(|i| format!("stop{i}")).collect();
        let request = client
            .build_request(&[Message::system("s"), Message::user("u")], &stop)
            .unwrap();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stop"], serde_json::json!(["stop0", "stop1", "stop2", "stop3"]));
        assert_eq!(value["model"], "gpt-4o-mini");

        let request = client.build_request(&[Message::user("u")], &[]).unwrap();
        assert!(request.stop.is_none());
    }

    #[test]
    fn test_tool_messages_sent_as_user() {
        let client = OpenAiClient::new(None, "m", "sk-test");
        let msgs = client
            .to_openai_messages(&[Message::tool("Observation from x: 1")])
            .unwrap();
        assert!(matches!(msgs[0], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_label() {
        let client = OpenAiClient::new(Some("https://api.groq.com/openai/v1"), "m", "k")
            .with_label("groq");
        assert_eq!(client.name(), "groq");
        assert_eq!(client.model(), "m");
    }
}
