//! 工具执行器
//!
//! 持有共享的 ToolRegistry 与单次调用超时，execute(tool_name, args) 在超时内调用 registry.invoke，
//! 超时转为 ToolError::Timeout；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::text::truncate_chars;
use crate::tools::{ToolError, ToolRegistry};

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具执行器：对每次调用施加超时并记录审计日志
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    /// 执行指定工具；超时返回 Timeout，其余错误原样返回；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: &Value) -> Result<String, ToolError> {
        let start = Instant::now();
        let result = timeout(self.timeout, self.registry.invoke(tool_name, args)).await;

        let outcome = match &result {
            Ok(Ok(_)) => "ok",
            Ok(Err(ToolError::UnknownTool { .. })) => "unknown_tool",
            Ok(Err(ToolError::InvalidArguments { .. })) => "invalid_arguments",
            Ok(Err(_)) => "error",
            Err(_) => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": truncate_chars(&args.to_string(), ARGS_PREVIEW_CHARS),
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(r) => r,
            Err(_) => Err(ToolError::Timeout {
                tool: tool_name.to_string(),
                secs: self.timeout.as_secs(),
            }),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{SpecError, Tool, ToolArgs, ToolSpec};
    use async_trait::async_trait;
    use serde_json::json;

    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        fn spec(&self) -> Result<ToolSpec, SpecError> {
            ToolSpec::builder("slow").description("Sleeps").build()
        }

        async fn execute(&self, _args: ToolArgs) -> Result<String, String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_timeout_becomes_tool_error() {
        let mut reg = ToolRegistry::new();
        reg.register(SlowTool).unwrap();
        let executor = ToolExecutor::new(Arc::new(reg), 1);
        let err = executor.execute("slow", &json!({})).await.unwrap_err();
        assert_eq!(
            err,
            ToolError::Timeout {
                tool: "slow".into(),
                secs: 1
            }
        );
    }

    #[tokio::test]
    async fn test_unknown_tool_passthrough() {
        let executor = ToolExecutor::new(Arc::new(ToolRegistry::new()), 5);
        assert!(matches!(
            executor.execute("nope", &json!({})).await,
            Err(ToolError::UnknownTool { .. })
        ));
    }
}
