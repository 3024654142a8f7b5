//! Mock / 脚本化 LLM 客户端（用于测试与无 API Key 的本地运行）
//!
//! - MockLlmClient：直接以 `<response>` 回显最后一条用户消息，便于本地跑通流程；
//! - ScriptedLlmClient：按顺序回放预设输出或错误，并记录每次请求，供测试断言。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::stop::apply_stop_sequences;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

/// Mock 客户端：回显用户最后一条消息作为最终回复
#[derive(Debug, Default)]
pub struct MockLlmClient;

#[async_trait]
impl LlmClient for MockLlmClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, messages: &[Message], _stop: &[String]) -> Result<String, LlmError> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or("(no input)");

        Ok(format!(
            "<thought>No language model is configured; echoing the request.</thought>\n<response>Echo from Mock: {}</response>",
            last_user
        ))
    }
}

/// 一次被记录的补全请求
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub stop: Vec<String>,
}

/// 脚本化客户端：队列耗尽后若设置了 repeat 则一直返回它，否则返回 InvalidResponse
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    repeat: Option<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条模型输出
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()))
    }

    /// 追加一次后端失败
    pub fn fail(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    /// 队列耗尽后一直返回同一段文本
    pub fn repeat(mut self, text: impl Into<String>) -> Self {
        self.repeat = Some(text.into());
        self
    }

    fn push(self, step: Result<String, LlmError>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(step);
        }
        self
    }

    /// 已发生的补全调用次数
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<String, LlmError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                messages: messages.to_vec(),
                stop: stop.to_vec(),
            });
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match next {
            Some(Ok(text)) => Ok(apply_stop_sequences(&text, stop)),
            Some(Err(e)) => Err(e),
            None => match &self.repeat {
                Some(text) => Ok(apply_stop_sequences(text, stop)),
                None => Err(LlmError::InvalidResponse("script exhausted".to_string())),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_last_user_message() {
        let out = MockLlmClient
            .complete(&[Message::system("s"), Message::user("hello")], &[])
            .await
            .unwrap();
        assert!(out.contains("<response>Echo from Mock: hello</response>"));
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order_and_records() {
        let llm = ScriptedLlmClient::new()
            .reply("one")
            .fail(LlmError::RateLimited("slow".into()))
            .repeat("again");
        let msgs = [Message::user("q")];
        assert_eq!(llm.complete(&msgs, &[]).await.unwrap(), "one");
        assert!(matches!(
            llm.complete(&msgs, &[]).await,
            Err(LlmError::RateLimited(_))
        ));
        assert_eq!(llm.complete(&msgs, &[]).await.unwrap(), "again");
        assert_eq!(llm.complete(&msgs, &[]).await.unwrap(), "again");
        assert_eq!(llm.call_count(), 4);
        assert_eq!(llm.calls()[0].messages[0].content, "q");
    }

    #[tokio::test]
    async fn test_scripted_exhausted_is_error() {
        let llm = ScriptedLlmClient::new();
        assert!(llm.complete(&[], &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_scripted_applies_stop_sequences() {
        let llm = ScriptedLlmClient::new()
            .reply("<tool_call>{}</tool_call>\nObservation: invented");
        let out = llm
            .complete(&[], &["</tool_call>".to_string()])
            .await
            .unwrap();
        assert_eq!(out, "<tool_call>{}</tool_call>");
    }
}
