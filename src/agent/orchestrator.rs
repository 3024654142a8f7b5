//! 任务编排器
//!
//! 把通用 ReAct 循环包装成领域任务：固定的工具子集 + 领域 system prompt + 结构化结果解码。
//! 循环成功且解码通过 -> 写入会话 ID 与时间戳后返回；轮数耗尽、后端失败或解码失败 -> 兜底结果（显式标记）。
//! 返回的文档就是模型给出的 JSON，只有 sessionId 与 timestamp 被覆盖；类型化结构仅用于校验和读取。

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::agent::fallback::{
    new_session_id, now_timestamp, stamp_document, FallbackStore, FromFallback,
};
use crate::agent::model::typed_view;
use crate::core::AgentError;
use crate::llm::{default_stop_sequences, LlmClient};
use crate::react::{build_system_prompt, strip_code_fence, LoopResult, ReactEvent, ReactLoop};
use crate::tools::{ToolExecutor, ToolRegistry};

/// 默认单次工具调用超时（秒）
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

/// 结果来源：模型产出，或兜底文档（附原因）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ResultSource {
    Agent,
    Fallback { reason: String },
}

/// 编排器输出
#[derive(Debug, Clone)]
pub struct TaskOutcome<T> {
    /// 对外返回的 JSON 文档（未知键原样保留）
    pub document: Value,
    /// 同一文档的类型化视图
    pub result: T,
    pub source: ResultSource,
    /// 实际发生的补全次数
    pub rounds: usize,
}

impl<T> TaskOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResultSource::Fallback { .. })
    }
}

/// 单次运行的外部控制：取消令牌与可选的事件通道
#[derive(Clone, Default)]
pub struct RunControl {
    pub cancel: CancellationToken,
    pub events: Option<UnboundedSender<ReactEvent>>,
}

impl RunControl {
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_events(mut self, tx: UnboundedSender<ReactEvent>) -> Self {
        self.events = Some(tx);
        self
    }
}

/// 领域任务配置：名称、完整 system prompt、绑定工具子集的执行器、轮数预算
#[derive(Clone)]
pub struct TaskProfile {
    pub name: &'static str,
    pub system_prompt: String,
    pub executor: ToolExecutor,
    pub max_rounds: usize,
}

/// 编排器：持有共享的补全后端、完整工具注册表与兜底库
pub struct TaskOrchestrator {
    llm: Arc<dyn LlmClient>,
    registry: Arc<ToolRegistry>,
    fallback: Arc<FallbackStore>,
    tool_timeout_secs: u64,
    stop_sequences: Vec<String>,
}

impl TaskOrchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        registry: Arc<ToolRegistry>,
        fallback: Arc<FallbackStore>,
    ) -> Self {
        Self {
            llm,
            registry,
            fallback,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            stop_sequences: default_stop_sequences(),
        }
    }

    pub fn with_tool_timeout(mut self, secs: u64) -> Self {
        self.tool_timeout_secs = secs;
        self
    }

    pub fn with_stop_sequences(mut self, stop: Vec<String>) -> Self {
        self.stop_sequences = stop;
        self
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn fallback(&self) -> &FallbackStore {
        &self.fallback
    }

    /// 构建领域配置：从完整注册表中取出工具子集（缺少任一工具即报错），生成 system prompt
    pub fn profile(
        &self,
        name: &'static str,
        role_instructions: &str,
        tools: &[&str],
        max_rounds: usize,
    ) -> Result<TaskProfile, AgentError> {
        let subset = self.registry.subset(tools)?;
        let system_prompt = build_system_prompt(role_instructions, &subset);
        Ok(TaskProfile {
            name,
            system_prompt,
            executor: ToolExecutor::new(Arc::new(subset), self.tool_timeout_secs),
            max_rounds,
        })
    }

    /// 运行一次任务；只有取消会返回 Err，其余失败都以兜底结果返回
    pub async fn run<T: FromFallback>(
        &self,
        profile: &TaskProfile,
        request: &str,
        session_id: &str,
        control: RunControl,
    ) -> Result<TaskOutcome<T>, AgentError> {
        let mut react = ReactLoop::new(
            Arc::clone(&self.llm),
            profile.executor.clone(),
            profile.max_rounds,
        )
        .with_stop_sequences(self.stop_sequences.clone())
        .with_cancel_token(control.cancel);
        if let Some(tx) = control.events {
            react = react.with_event_tx(tx);
        }

        let run = react.run(&profile.system_prompt, request).await;
        let rounds = run.rounds;

        let reason = match run.result {
            LoopResult::Success(text) => match decode_structured::<T>(&text) {
                Ok((mut result, mut document)) => {
                    let timestamp = now_timestamp();
                    stamp_document(&mut document, session_id, &timestamp);
                    result.stamp(session_id, &timestamp);
                    tracing::info!(task = profile.name, rounds, session_id, "task completed");
                    return Ok(TaskOutcome {
                        document,
                        result,
                        source: ResultSource::Agent,
                        rounds,
                    });
                }
                Err(e) => format!("final answer could not be decoded: {}", e),
            },
            LoopResult::RoundLimitExceeded { .. } => {
                format!("round limit ({}) exceeded", profile.max_rounds)
            }
            LoopResult::ProviderFailure(e) => format!("completion provider failed: {}", e),
            LoopResult::Cancelled => return Err(AgentError::Cancelled),
        };

        tracing::warn!(task = profile.name, rounds, %reason, "using fallback result");
        let (fallback_id, timestamp) = (new_session_id(), now_timestamp());
        let mut result = T::from_fallback(&self.fallback);
        result.stamp(&fallback_id, &timestamp);
        Ok(TaskOutcome {
            document: self.fallback.stamped_document(T::KIND, &fallback_id, &timestamp),
            result,
            source: ResultSource::Fallback { reason },
            rounds,
        })
    }
}

/// 在独立任务中执行一次运行。返回的 future 被丢弃（如客户端断开）时取消令牌，
/// 已开始的工具调用仍会执行完毕，循环在下一轮开始前退出。
pub async fn spawn_run<T, F, Fut>(control: RunControl, run: F) -> Result<T, AgentError>
where
    F: FnOnce(RunControl) -> Fut,
    Fut: Future<Output = Result<T, AgentError>> + Send + 'static,
    T: Send + 'static,
{
    let _guard = control.cancel.clone().drop_guard();
    tokio::spawn(run(control))
        .await
        .map_err(|e| AgentError::Task(e.to_string()))?
}

/// 从最终回复中取出 JSON 对象：先整体解析（去掉代码块包裹），失败再取最外层 `{...}`
fn extract_json_object(text: &str) -> Result<Value, String> {
    let body = strip_code_fence(text);
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(body) {
        return Ok(v);
    }
    let start = text.find('{').ok_or("no JSON object found")?;
    let end = text.rfind('}').ok_or("no JSON object found")?;
    if end < start {
        return Err("no JSON object found".to_string());
    }
    serde_json::from_str(&text[start..=end]).map_err(|e| format!("invalid JSON: {}", e))
}

/// 取出 JSON 文档并校验其类型化视图；返回 (视图, 原文档)
pub fn decode_structured<T: FromFallback>(text: &str) -> Result<(T, Value), AgentError> {
    let document = extract_json_object(text).map_err(AgentError::Decode)?;
    let view = typed_view::<T>(&document).map_err(AgentError::Decode)?;
    Ok((view, document))
}
