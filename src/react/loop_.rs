//! ReAct 主循环
//!
//! 每轮：补全 -> 解析 -> 执行工具并写回 Observation / 纠正格式 / 结束，直到出现最终回复或轮数耗尽。
//! 后端失败立即终止（不在循环内重试）；工具与格式错误都在循环内以对话消息的形式反馈给模型。
//! 取消在每轮开始前与等待补全时检查，进行中的工具调用总是执行完毕。

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{default_stop_sequences, LlmClient, LlmError};
use crate::memory::{Conversation, Message};
use crate::react::parser::{extract_thought, scan, FormatIssue, ParsedTurn};
use crate::react::ReactEvent;
use crate::text::truncate_chars;
use crate::tools::ToolExecutor;

/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;
/// 思考内容展示最大字符数
const THOUGHT_PREVIEW_CHARS: usize = 800;

/// 一次运行的终止结果
#[derive(Debug, Clone, PartialEq)]
pub enum LoopResult {
    /// 模型给出了最终回复
    Success(String),
    /// 轮数耗尽，携带最后一次模型原始输出
    RoundLimitExceeded { last_output: String },
    /// 补全后端失败
    ProviderFailure(LlmError),
    /// 调用方取消
    Cancelled,
}

impl LoopResult {
    pub fn is_success(&self) -> bool {
        matches!(self, LoopResult::Success(_))
    }
}

/// 运行结果：终止状态 + 完整对话 + 实际发生的补全次数
#[derive(Debug, Clone)]
pub struct LoopRun {
    pub result: LoopResult,
    pub conversation: Conversation,
    pub rounds: usize,
}

/// ReAct 循环：持有补全后端、工具执行器与轮数预算；可被多个运行并发共享
pub struct ReactLoop {
    llm: Arc<dyn LlmClient>,
    executor: ToolExecutor,
    recovery: RecoveryEngine,
    max_rounds: usize,
    stop_sequences: Vec<String>,
    event_tx: Option<UnboundedSender<ReactEvent>>,
    cancel_token: CancellationToken,
}

impl ReactLoop {
    pub fn new(llm: Arc<dyn LlmClient>, executor: ToolExecutor, max_rounds: usize) -> Self {
        Self {
            llm,
            executor,
            recovery: RecoveryEngine::new(),
            max_rounds,
            stop_sequences: default_stop_sequences(),
            event_tx: None,
            cancel_token: CancellationToken::new(),
        }
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = stop;
        self
    }

    pub fn with_event_tx(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = token;
        self
    }

    pub fn max_rounds(&self) -> usize {
        self.max_rounds
    }

    fn emit(&self, ev: ReactEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn finish(&self, result: LoopResult, conversation: Conversation, rounds: usize) -> LoopRun {
        match &result {
            LoopResult::Success(_) => {
                tracing::info!(rounds, llm = self.llm.name(), "react loop succeeded");
            }
            LoopResult::RoundLimitExceeded { .. } => {
                tracing::warn!(rounds, "react loop exhausted its round budget");
                self.emit(ReactEvent::Failed {
                    reason: format!("round limit ({}) exceeded", self.max_rounds),
                });
            }
            LoopResult::ProviderFailure(e) => {
                tracing::warn!(rounds, error = %e, "react loop stopped on provider failure");
                self.emit(ReactEvent::Failed {
                    reason: e.to_string(),
                });
            }
            LoopResult::Cancelled => {
                tracing::info!(rounds, "react loop cancelled");
                self.emit(ReactEvent::Failed {
                    reason: "cancelled".to_string(),
                });
            }
        }
        LoopRun {
            result,
            conversation,
            rounds,
        }
    }

    /// 执行一次完整运行；对话以 system prompt + 用户请求为种子
    pub async fn run(&self, system_prompt: &str, user_request: &str) -> LoopRun {
        let mut conversation = Conversation::seeded(system_prompt, user_request);
        let mut last_output = String::new();
        let mut rounds = 0;

        tracing::info!(
            llm = self.llm.name(),
            max_rounds = self.max_rounds,
            tools = ?self.executor.tool_names(),
            "react loop started"
        );

        for round in 0..self.max_rounds {
            if self.cancel_token.is_cancelled() {
                return self.finish(LoopResult::Cancelled, conversation, rounds);
            }
            self.emit(ReactEvent::RoundStarted {
                round,
                max_rounds: self.max_rounds,
            });

            let completion = tokio::select! {
                biased;
                _ = self.cancel_token.cancelled() => None,
                r = self.llm.complete(conversation.messages(), &self.stop_sequences) => Some(r),
            };
            let raw = match completion {
                None => return self.finish(LoopResult::Cancelled, conversation, rounds),
                Some(Err(e)) => {
                    rounds += 1;
                    return self.finish(LoopResult::ProviderFailure(e), conversation, rounds);
                }
                Some(Ok(text)) => text,
            };
            rounds += 1;
            last_output = raw.clone();
            tracing::debug!(round, chars = raw.len(), "completion received");

            if let Some(thought) = extract_thought(&raw) {
                self.emit(ReactEvent::Thought {
                    text: truncate_chars(&thought, THOUGHT_PREVIEW_CHARS),
                });
            }

            let issue = match scan(&raw) {
                Ok(ParsedTurn::FinalResponse(text)) => {
                    conversation.push(Message::assistant(raw));
                    self.emit(ReactEvent::Final { text: text.clone() });
                    return self.finish(LoopResult::Success(text), conversation, rounds);
                }
                Ok(ParsedTurn::ToolCall { name, arguments }) => {
                    conversation.push(Message::assistant(raw));
                    self.emit(ReactEvent::ToolCall {
                        tool: name.clone(),
                        arguments: arguments.clone(),
                    });
                    let observation = self.observe(&name, &arguments).await;
                    conversation.push(Message::tool(observation));
                    continue;
                }
                Ok(ParsedTurn::Thought(_)) => FormatIssue::MissingTerminal,
                Ok(ParsedTurn::Malformed(_)) => FormatIssue::NoSegments,
                Err(issue) => issue,
            };

            tracing::debug!(round, reason = %issue, "model output rejected by format guard");
            conversation.push(Message::assistant(raw));
            self.emit(ReactEvent::FormatRetry {
                reason: issue.to_string(),
            });
            match self.recovery.handle(&AgentError::Format(issue)) {
                RecoveryAction::RetryWithPrompt(prompt) => conversation.push(Message::user(prompt)),
                RecoveryAction::Observe(text) => conversation.push(Message::tool(text)),
                RecoveryAction::Abort => break,
            }
        }

        self.finish(
            LoopResult::RoundLimitExceeded { last_output },
            conversation,
            rounds,
        )
    }

    /// 执行工具并渲染为观察文本；失败由恢复引擎转换为错误观察
    async fn observe(&self, tool: &str, arguments: &serde_json::Value) -> String {
        match self.executor.execute(tool, arguments).await {
            Ok(output) => {
                self.emit(ReactEvent::Observation {
                    tool: tool.to_string(),
                    ok: true,
                    preview: truncate_chars(&output, OBSERVATION_PREVIEW_CHARS),
                });
                format!("Observation from {}: {}", tool, output)
            }
            Err(e) => {
                tracing::warn!(tool, error = %e, "tool call failed");
                let text = match self.recovery.handle(&AgentError::Tool(e)) {
                    RecoveryAction::Observe(text) | RecoveryAction::RetryWithPrompt(text) => text,
                    RecoveryAction::Abort => format!("Observation from {} (error): aborted", tool),
                };
                self.emit(ReactEvent::Observation {
                    tool: tool.to_string(),
                    ok: false,
                    preview: truncate_chars(&text, OBSERVATION_PREVIEW_CHARS),
                });
                text
            }
        }
    }
}
