//! LLM 层：补全后端抽象与实现（OpenAI 兼容 / Gemini / Mock）

pub mod gemini;
pub mod mock;
pub mod openai;
pub mod presets;
pub mod stop;
pub mod traits;

pub use gemini::{GeminiClient, GEMINI_DEFAULT_MODEL};
pub use mock::{MockLlmClient, RecordedCall, ScriptedLlmClient};
pub use openai::{OpenAiClient, TokenUsage};
pub use presets::{create_deepseek_client, create_groq_client};
pub use stop::{apply_stop_sequences, default_stop_sequences, TOOL_CALL_CLOSE};
pub use traits::{LlmClient, LlmError};
