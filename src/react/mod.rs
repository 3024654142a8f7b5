//! 认知层：输出解析、system prompt 协议、ReAct 主循环与过程事件

pub mod events;
pub mod loop_;
pub mod parser;
pub mod prompt;

pub use events::ReactEvent;
pub use loop_::{LoopResult, LoopRun, ReactLoop};
pub use parser::{extract_thought, parse_turn, scan, strip_code_fence, FormatIssue, ParsedTurn};
pub use prompt::build_system_prompt;
