//! ReAct 过程事件：用于 CLI / Web 展示每轮的思考、工具调用、观察与最终结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 新一轮开始（round 从 0 计数）
    RoundStarted { round: usize, max_rounds: usize },
    /// 模型的推理内容（预览）
    Thought { text: String },
    /// 调用工具
    ToolCall {
        tool: String,
        arguments: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    Observation {
        tool: String,
        ok: bool,
        preview: String,
    },
    /// 输出格式不合规，已追加纠正提示
    FormatRetry { reason: String },
    /// 最终回复
    Final { text: String },
    /// 运行以失败告终（轮数耗尽 / 后端失败 / 取消）
    Failed { reason: String },
}
