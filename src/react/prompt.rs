//! System prompt 协议部分：角色说明 + 工具清单 + 工具调用 JSON Schema + 三标签协议
//!
//! 角色说明由编排器提供，其余部分由注册表生成，同一注册表多次生成结果一致。

use crate::tools::{tool_call_schema_json, ToolRegistry};

const PROTOCOL: &str = r#"RESPONSE PROTOCOL
Every reply MUST follow this format:
1. Optionally start with your reasoning inside <thought>...</thought>.
2. Then give EXACTLY ONE of:
   - a tool call:
     <tool_call>{"tool_name": "<tool name>", "parameters": {<parameters>}}</tool_call>
   - your final answer:
     <response>...</response>

RULES
- Never put a <tool_call> and a <response> in the same reply.
- Call at most one tool per reply, then stop. The result will be sent back to you
  as a message starting with "Observation from <tool name>:".
- Never write observations yourself and never invent tool results.
- Only call tools listed under AVAILABLE TOOLS, with parameters as documented.
- If a tool returns an error, fix the call or choose another tool."#;

/// 组装完整 system prompt
pub fn build_system_prompt(role_instructions: &str, registry: &ToolRegistry) -> String {
    let tools = if registry.is_empty() {
        "(no tools available; answer directly with <response>)\n".to_string()
    } else {
        registry.describe()
    };
    format!(
        "{}\n\nAVAILABLE TOOLS\n{}\nTOOL CALL JSON SCHEMA\n{}\n\n{}",
        role_instructions.trim(),
        tools,
        tool_call_schema_json(),
        PROTOCOL
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamType, SpecError, Tool, ToolArgs, ToolSpec};
    use async_trait::async_trait;

    struct Weather;

    #[async_trait]
    impl Tool for Weather {
        fn spec(&self) -> Result<ToolSpec, SpecError> {
            ToolSpec::builder("get_weather")
                .description("Weather lookup")
                .required("query", ParamType::String, "Question")
                .build()
        }

        async fn execute(&self, _args: ToolArgs) -> Result<String, String> {
            Ok("{}".into())
        }
    }

    #[test]
    fn test_prompt_contains_role_tools_and_protocol() {
        let mut reg = ToolRegistry::new();
        reg.register(Weather).unwrap();
        let prompt = build_system_prompt("You plan trips.", &reg);
        assert!(prompt.starts_with("You plan trips."));
        assert!(prompt.contains("- get_weather: Weather lookup"));
        assert!(prompt.contains("<tool_call>"));
        assert!(prompt.contains("<response>"));
        assert!(prompt.contains("tool_name"));
        assert_eq!(prompt, build_system_prompt("You plan trips.", &reg));
    }

    #[test]
    fn test_prompt_without_tools() {
        let prompt = build_system_prompt("Role", &ToolRegistry::new());
        assert!(prompt.contains("no tools available"));
    }
}
