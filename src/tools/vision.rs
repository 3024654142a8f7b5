//! get_multimodal_capability：用多模态模型描述图片内容
//!
//! 走 OpenAI 兼容的 chat/completions 接口（默认 Groq 上的 Llama 4 Scout），
//! 消息内容为 text + image_url 两段。调用前先校验 URL 协议并 HEAD 探测可访问性；
//! 仅在超时类错误时按指数退避重试，其余错误直接返回。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::VisionSection;
use crate::tools::http::{describe_reqwest_error, http_client, post_json, require_key, to_pretty};
use crate::tools::{ParamType, SpecError, Tool, ToolArgs, ToolSpec};

const HEAD_TIMEOUT_SECS: u64 = 10;
const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

pub struct VisionTool {
    http: Client,
    probe: Client,
    base_url: String,
    model: String,
    max_attempts: u32,
    api_key: Option<String>,
}

impl VisionTool {
    pub fn new(section: &VisionSection, api_key: Option<String>) -> Self {
        Self {
            http: http_client(section.timeout_secs),
            probe: http_client(HEAD_TIMEOUT_SECS),
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: section.model.clone(),
            max_attempts: section.max_attempts.max(1),
            api_key,
        }
    }

    async fn probe_image(&self, url: &str) -> Result<(), String> {
        let resp = self
            .probe
            .head(url)
            .send()
            .await
            .map_err(|e| format!("cannot access image URL: {}", describe_reqwest_error(e)))?;
        let status = resp.status();
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(format!(
                "image URL not accessible: HTTP {}",
                status.as_u16()
            ))
        }
    }

    fn request_body(&self, query: &str, image_url: &str) -> Value {
        json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": format!(
                            "Analyze this image and answer: {}. Please provide a detailed response about what you see in the image.",
                            query
                        ),
                    },
                    {"type": "image_url", "image_url": {"url": image_url}},
                ],
            }],
            "temperature": 0.7,
            "max_completion_tokens": 512,
            "top_p": 0.9,
            "stream": false,
        })
    }
}

fn is_timeout(reason: &str) -> bool {
    let lower = reason.to_ascii_lowercase();
    lower.contains("timed out") || lower.contains("timeout") || lower.contains("deadline exceeded")
}

fn message_content(data: &Value) -> Result<String, String> {
    data.pointer("/choices/0/message/content")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| "vision model returned no message content".to_string())
}

fn check_image_url(url: &str) -> Result<(), String> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(format!("invalid image URL '{}': must start with http:// or https://", url))
    }
}

#[async_trait]
impl Tool for VisionTool {
    fn spec(&self) -> Result<ToolSpec, SpecError> {
        ToolSpec::builder("get_multimodal_capability")
            .description(
                "Analyze an image together with a question and describe scenes, landmarks, \
                 activities or mood visible in it.",
            )
            .required(
                "query",
                ParamType::String,
                "What to find out about the image, e.g. \"describe the scenery\"",
            )
            .required("image_url", ParamType::String, "Public http(s) URL of the image")
            .build()
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, String> {
        let query = args.require_str("query")?;
        let image_url = args.require_str("image_url")?;
        check_image_url(image_url)?;
        let key = require_key(&self.api_key, "GROQ_API_KEY")?;
        self.probe_image(image_url).await?;

        let url = format!("{}/chat/completions", self.base_url);
        let auth = format!("Bearer {}", key);
        let body = self.request_body(query, image_url);
        let mut backoff = INITIAL_BACKOFF;

        for attempt in 1..=self.max_attempts {
            match post_json(&self.http, &url, &[("Authorization", auth.as_str())], &body).await {
                Ok(data) => {
                    let message = message_content(&data)?;
                    return Ok(to_pretty(&json!({
                        "message": message,
                        "status": "success",
                        "attempt": attempt,
                    })));
                }
                Err(reason) if is_timeout(&reason) && attempt < self.max_attempts => {
                    tracing::warn!(attempt, error = %reason, "vision request timed out, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(reason) if is_timeout(&reason) => {
                    return Err(format!(
                        "vision request timed out after {} attempts; try a smaller image or simpler query",
                        attempt
                    ));
                }
                Err(reason) => return Err(reason),
            }
        }
        Err("vision request was not attempted".to_string())
    }
}
