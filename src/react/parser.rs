//! 模型输出解析：从原始文本中提取 `<thought>` / `<tool_call>` / `<response>` 三种分段
//!
//! 前向扫描：依次找最早出现的开标签，再找对应闭标签；分段之外的文字忽略。
//! 每轮只接受一个终止分段（tool_call 或 response），两者并存或重复出现都视为格式错误。
//! `<tool_call>` 未闭合且位于文本末尾时照常接受（后端在 stop 序列处截断会去掉闭标签）。

use serde_json::Value;
use thiserror::Error;

/// 一轮模型输出的解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedTurn {
    /// 只有推理，没有终止分段
    Thought(String),
    /// 工具调用：参数保证是 JSON 对象
    ToolCall { name: String, arguments: Value },
    /// 最终回复（已去除首尾空白）
    FinalResponse(String),
    /// 无法解析，携带原始文本
    Malformed(String),
}

/// 格式问题：用于生成针对性的纠正提示
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatIssue {
    #[error("no <thought>, <tool_call> or <response> segment found")]
    NoSegments,

    #[error("only reasoning was given; a <tool_call> or <response> is required")]
    MissingTerminal,

    #[error("both <tool_call> and <response> were given in one turn")]
    Ambiguous,

    #[error("more than one <tool_call> was given in one turn")]
    MultipleToolCalls,

    #[error("more than one <response> was given in one turn")]
    MultipleResponses,

    #[error("<response> was opened but never closed")]
    UnclosedResponse,

    #[error("<response> is empty")]
    EmptyResponse,

    #[error("invalid <tool_call> body: {0}")]
    InvalidToolCall(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SegmentKind {
    Thought,
    ToolCall,
    Response,
}

impl SegmentKind {
    const ALL: [SegmentKind; 3] = [SegmentKind::Thought, SegmentKind::ToolCall, SegmentKind::Response];

    fn open(self) -> &'static str {
        match self {
            SegmentKind::Thought => "<thought>",
            SegmentKind::ToolCall => "<tool_call>",
            SegmentKind::Response => "<response>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            SegmentKind::Thought => "</thought>",
            SegmentKind::ToolCall => "</tool_call>",
            SegmentKind::Response => "</response>",
        }
    }
}

#[derive(Debug)]
struct Segment<'a> {
    kind: SegmentKind,
    body: &'a str,
    closed: bool,
}

fn scan_segments(raw: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut pos = 0;
    while pos < raw.len() {
        let rest = &raw[pos..];
        let next = SegmentKind::ALL
            .iter()
            .filter_map(|&kind| rest.find(kind.open()).map(|idx| (idx, kind)))
            .min_by_key(|(idx, _)| *idx);
        let Some((idx, kind)) = next else {
            break;
        };
        let body_start = pos + idx + kind.open().len();
        match raw[body_start..].find(kind.close()) {
            Some(len) => {
                segments.push(Segment {
                    kind,
                    body: &raw[body_start..body_start + len],
                    closed: true,
                });
                pos = body_start + len + kind.close().len();
            }
            None => {
                segments.push(Segment {
                    kind,
                    body: &raw[body_start..],
                    closed: false,
                });
                pos = raw.len();
            }
        }
    }
    segments
}

/// 去掉 ```json ... ``` 或 ``` ... ``` 包裹
pub fn strip_code_fence(s: &str) -> &str {
    let t = s.trim();
    let Some(inner) = t.strip_prefix("```") else {
        return t;
    };
    let inner = inner
        .strip_prefix("json")
        .or_else(|| inner.strip_prefix("JSON"))
        .unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn decode_tool_call(body: &str) -> Result<(String, Value), FormatIssue> {
    let invalid = |msg: &str| FormatIssue::InvalidToolCall(msg.to_string());
    let value: Value = serde_json::from_str(strip_code_fence(body))
        .map_err(|e| FormatIssue::InvalidToolCall(format!("not valid JSON ({})", e)))?;
    let obj = value
        .as_object()
        .ok_or_else(|| invalid("expected a JSON object"))?;
    if let Some(extra) = obj
        .keys()
        .find(|k| k.as_str() != "tool_name" && k.as_str() != "parameters")
    {
        return Err(FormatIssue::InvalidToolCall(format!(
            "unexpected key '{}'; only \"tool_name\" and \"parameters\" are allowed",
            extra
        )));
    }
    let name = obj
        .get("tool_name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| invalid("\"tool_name\" must be a non-empty string"))?;
    let params = obj
        .get("parameters")
        .filter(|v| v.is_object())
        .ok_or_else(|| invalid("\"parameters\" must be a JSON object"))?;
    Ok((name.to_string(), params.clone()))
}

/// 解析并给出格式问题；Ok 中不会出现 Malformed
pub fn scan(raw: &str) -> Result<ParsedTurn, FormatIssue> {
    let segments = scan_segments(raw);
    let count = |kind| segments.iter().filter(|s| s.kind == kind).count();
    let tool_calls = count(SegmentKind::ToolCall);
    let responses = count(SegmentKind::Response);

    if tool_calls > 0 && responses > 0 {
        return Err(FormatIssue::Ambiguous);
    }
    if tool_calls > 1 {
        return Err(FormatIssue::MultipleToolCalls);
    }
    if responses > 1 {
        return Err(FormatIssue::MultipleResponses);
    }

    if let Some(seg) = segments.iter().find(|s| s.kind == SegmentKind::ToolCall) {
        let (name, arguments) = decode_tool_call(seg.body)?;
        return Ok(ParsedTurn::ToolCall { name, arguments });
    }

    if let Some(seg) = segments.iter().find(|s| s.kind == SegmentKind::Response) {
        if !seg.closed {
            return Err(FormatIssue::UnclosedResponse);
        }
        let text = seg.body.trim();
        if text.is_empty() {
            return Err(FormatIssue::EmptyResponse);
        }
        return Ok(ParsedTurn::FinalResponse(text.to_string()));
    }

    match extract_thought(raw) {
        Some(thought) => Ok(ParsedTurn::Thought(thought)),
        None => Err(FormatIssue::NoSegments),
    }
}

/// 解析一轮输出；无法识别时返回 Malformed(原文)
pub fn parse_turn(raw: &str) -> ParsedTurn {
    scan(raw).unwrap_or_else(|_| ParsedTurn::Malformed(raw.to_string()))
}

/// 提取所有 `<thought>` 分段（以空行连接）；没有或全为空白时返回 None
pub fn extract_thought(raw: &str) -> Option<String> {
    let thoughts: Vec<&str> = scan_segments(raw)
        .into_iter()
        .filter(|s| s.kind == SegmentKind::Thought)
        .map(|s| s.body.trim())
        .filter(|s| !s.is_empty())
        .collect();
    (!thoughts.is_empty()).then(|| thoughts.join("\n\n"))
}
