//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供 ReAct 循环决定是重新提示、写回观察还是终止。

use crate::core::{AgentError, RecoveryAction};
use crate::react::FormatIssue;
use crate::tools::ToolError;

const FORMAT_REMINDER: &str = "Reply again using exactly one of these two forms:\n\
<thought>your reasoning</thought>\n\
<tool_call>{\"tool_name\": \"<tool name>\", \"parameters\": {...}}</tool_call>\n\
or\n\
<thought>your reasoning</thought>\n\
<response>your final answer</response>\n\
Never include both a <tool_call> and a <response>.";

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::Format(issue) => RecoveryAction::RetryWithPrompt(format_prompt(issue)),
            AgentError::Tool(e) => RecoveryAction::Observe(tool_observation(e)),
            _ => RecoveryAction::Abort,
        }
    }
}

fn format_prompt(issue: &FormatIssue) -> String {
    let hint = match issue {
        FormatIssue::InvalidToolCall(_) => {
            "\nThe <tool_call> body must be a single JSON object with exactly the keys \
             \"tool_name\" (string) and \"parameters\" (object)."
        }
        FormatIssue::MissingTerminal => {
            "\nIf you need more information, call a tool; otherwise give your final answer."
        }
        _ => "",
    };
    format!(
        "Your previous reply could not be used: {}.{}\n{}",
        issue, hint, FORMAT_REMINDER
    )
}

fn tool_observation(e: &ToolError) -> String {
    let hint = match e {
        ToolError::UnknownTool { .. } => " Call one of the available tools instead.",
        ToolError::InvalidArguments { .. } => " Check the documented parameters and call again.",
        ToolError::Timeout { .. } => " You may retry once or continue without this data.",
        ToolError::Execution { .. } => "",
    };
    format!("Observation from {} (error): {}.{}", e.tool_name(), e, hint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_recovery_format_issue() {
        let engine = RecoveryEngine::new();
        let action = engine.handle(&AgentError::Format(FormatIssue::Ambiguous));
        match action {
            RecoveryAction::RetryWithPrompt(msg) => {
                assert!(msg.contains("both <tool_call> and <response>"));
                assert!(msg.contains("<response>your final answer</response>"));
            }
            other => panic!("Expected RetryWithPrompt, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_invalid_tool_call_hint() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Format(FormatIssue::InvalidToolCall("not valid JSON".into()));
        let RecoveryAction::RetryWithPrompt(msg) = engine.handle(&err) else {
            panic!("Expected RetryWithPrompt");
        };
        assert!(msg.contains("\"tool_name\" (string)"));
    }

    #[test]
    fn test_recovery_unknown_tool_observation() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Tool(ToolError::UnknownTool {
            name: "get_flights".into(),
            available: vec!["get_hotels".into()],
        });
        match engine.handle(&err) {
            RecoveryAction::Observe(text) => {
                assert!(text.starts_with("Observation from get_flights (error):"));
                assert!(text.contains("get_hotels"));
            }
            other => panic!("Expected Observe, got {other:?}"),
        }
    }

    #[test]
    fn test_recovery_tool_timeout() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Tool(ToolError::Timeout {
            tool: "get_hotels".into(),
            secs: 120,
        });
        assert!(matches!(engine.handle(&err), RecoveryAction::Observe(_)));
    }

    #[test]
    fn test_recovery_llm_error_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Llm(LlmError::RateLimited("quota".into()));
        assert_eq!(engine.handle(&err), RecoveryAction::Abort);
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert_eq!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort);
    }
}
