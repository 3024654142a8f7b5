//! 外部服务工具共用的 HTTP 辅助：带超时的 JSON POST，非 2xx 转为错误文本

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::text::truncate_chars;

/// 构建带超时与 UA 的 HTTP Client；构建失败时退回默认 Client
pub(crate) fn http_client(timeout_secs: u64) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .user_agent(concat!("wayfarer/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_default()
}

/// POST JSON 并解析 JSON 响应；传输失败、非 2xx、响应非 JSON 均返回 Err(原因)
pub(crate) async fn post_json(
    client: &Client,
    url: &str,
    headers: &[(&str, &str)],
    body: &Value,
) -> Result<Value, String> {
    let mut req = client.post(url).json(body);
    for (k, v) in headers {
        req = req.header(*k, *v);
    }
    let resp = req.send().await.map_err(describe_reqwest_error)?;
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(format!(
            "upstream returned HTTP {}: {}",
            status.as_u16(),
            truncate_chars(&text, 200)
        ));
    }
    resp.json::<Value>()
        .await
        .map_err(|e| format!("upstream returned invalid JSON: {}", e))
}

pub(crate) fn describe_reqwest_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else {
        format!("request failed: {}", e)
    }
}

pub(crate) fn require_key<'a>(key: &'a Option<String>, env_name: &str) -> Result<&'a str, String> {
    key.as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| format!("{} is not configured", env_name))
}

/// 序列化工具输出；serde_json::Value 序列化不会失败
pub(crate) fn to_pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
