//! Stop 序列后处理
//!
//! 后端不一定原生支持全部 stop 序列（OpenAI 最多 4 个、Gemini 最多 5 个），
//! 所以每个后端拿到文本后统一再截断一次，防止模型在 tool_call 之后自己编造 Observation。

/// tool_call 结束标签：命中时保留标签本身
pub const TOOL_CALL_CLOSE: &str = "</tool_call>";
pub const TOOL_CALL_OPEN: &str = "<tool_call>";

/// 默认 stop 序列：tool_call 结束标签 + 常见的「模拟数据」开头
pub fn default_stop_sequences() -> Vec<String> {
    vec![
        TOOL_CALL_CLOSE.to_string(),
        "(Assume".to_string(),
        "In a real implementation".to_string(),
        "fake data".to_string(),
    ]
}

/// 按最早出现的 stop 序列截断（ASCII 大小写不敏感）。
///
/// - 命中 `</tool_call>`：保留到标签结尾；
/// - 命中其它序列：截到序列之前并去掉尾部空白；
/// - 未命中但存在未闭合的 `<tool_call>`（后端已吞掉 stop 序列）：补上结束标签。
pub fn apply_stop_sequences(text: &str, stop: &[String]) -> String {
    let lower = text.to_ascii_lowercase();
    let earliest = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| lower.find(&s.to_ascii_lowercase()).map(|idx| (idx, s)))
        .min_by_key(|(idx, _)| *idx);

    match earliest {
        Some((idx, s)) if s.eq_ignore_ascii_case(TOOL_CALL_CLOSE) => {
            text[..idx + s.len()].to_string()
        }
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => {
            let wants_close = stop.iter().any(|s| s.eq_ignore_ascii_case(TOOL_CALL_CLOSE));
            if wants_close && has_unclosed_tool_call(&lower) {
                format!("{}{}", text.trim_end(), TOOL_CALL_CLOSE)
            } else {
                text.to_string()
            }
        }
    }
}

fn has_unclosed_tool_call(lower: &str) -> bool {
    match lower.rfind(TOOL_CALL_OPEN) {
        Some(open) => !lower[open..].contains(TOOL_CALL_CLOSE),
        None => false,
    }
}
