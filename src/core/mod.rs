//! 核心层：错误与恢复、组件构建

pub mod builder;
pub mod error;
pub mod recovery;

pub use builder::{
    build_tool_registry, create_agent_builder, create_llm_from_config, AgentBuilder,
    AgentComponents,
};
pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
