//! 记忆层：单次运行内的只追加对话历史

pub mod conversation;

pub use conversation::{Conversation, Message, Role};
