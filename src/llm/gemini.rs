//! Gemini generateContent 客户端
//!
//! 直接调用 REST 接口：system 消息合并进 systemInstruction，其余消息映射为 user / model 两种角色，
//! stop 序列写入 generationConfig.stopSequences（最多 5 个），返回后再统一截断一次。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::llm::stop::apply_stop_sequences;
use crate::llm::{LlmClient, LlmError};
use crate::memory::{Message, Role};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

const MAX_API_STOP_SEQUENCES: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Gemini 客户端：持有 HTTP Client、API Key、模型名
pub struct GeminiClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(model: &str, api_key: &str, request_timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: GEMINI_BASE_URL.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            temperature: 0.7,
        }
    }

    /// 覆盖 API 根地址（代理或测试）
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, messages: &[Message], stop: &[String]) -> GenerateRequest {
        let system_text = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let system_instruction = (!system_text.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part { text: system_text }],
        });

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Content {
                role: Some(
                    match m.role {
                        Role::Assistant => "model",
                        _ => "user",
                    }
                    .to_string(),
                ),
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GenerateRequest {
            system_instruction,
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
                stop_sequences: stop.iter().take(MAX_API_STOP_SEQUENCES).cloned().collect(),
            },
        }
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::InvalidResponse(format!("prompt blocked: {}", reason)));
    }
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::InvalidResponse("no candidates returned".to_string()))?;
    Ok(candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect::<String>())
        .unwrap_or_default())
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, messages: &[Message], stop: &[String]) -> Result<String, LlmError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = self.build_request(messages, stop);

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let text = extract_text(parsed)?;
        Ok(apply_stop_sequences(&text, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_maps_roles() {
        let client = GeminiClient::new(GEMINI_DEFAULT_MODEL, "k", 30);
        let req = client.build_request(
            &[
                Message::system("rules"),
                Message::user("hi"),
                Message::assistant("<tool_call>..</tool_call>"),
                Message::tool("Observation from x: 1"),
            ],
            &["</tool_call>".to_string()],
        );
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], "rules");
        let roles: Vec<&str> = value["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(value["generationConfig"]["stopSequences"][0], "</tool_call>");
    }

    #[test]
    fn test_stop_sequences_capped() {
        let client = GeminiClient::new("m", "k", 30);
        let stop: Vec<String> = (0..8).map(|i| i.to_string()).collect();
        let req = client.build_request(&[Message::user("x")], &stop);
        assert_eq!(req.generation_config.stop_sequences.len(), 5);
        assert!(req.system_instruction.is_none());
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "a"}, {"text": "b"}]}}]
        }))
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), "ab");
    }

    #[test]
    fn test_extract_text_blocked() {
        let resp: GenerateResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(extract_text(resp), Err(LlmError::InvalidResponse(_))));
    }
}
