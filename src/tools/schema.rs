//! 工具调用 JSON Schema 生成（schemars）
//!
//! 将「合法 tool call」的 JSON 结构注入 system prompt，减少模型输出格式错误。

use schemars::{schema_for, JsonSchema};
use serde_json::{Map, Value};

/// `<tool_call>` 内的 JSON 格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallFormat {
    /// 已注册的工具名，如 get_hotels、get_image_search
    pub tool_name: String,
    /// 工具参数对象，键为参数名
    pub parameters: Map<String, Value>,
}

/// 返回工具调用的 JSON Schema 字符串，可拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(ToolCallFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_names_both_fields() {
        let schema = tool_call_schema_json();
        assert!(schema.contains("tool_name"));
        assert!(schema.contains("parameters"));
    }
}
