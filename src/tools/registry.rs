//! 工具注册表
//!
//! 每个工具提供一份声明式 ToolSpec（名称、描述、有序参数表），注册时构建并校验一次；
//! ToolRegistry 按注册顺序保存工具并维护 name -> 下标 的查找表，
//! invoke 时先按 spec 校验 / 规整参数，再调用工具执行。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// 数组元素允许的基本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    String,
    Number,
    Integer,
    Boolean,
}

impl Primitive {
    fn label(self) -> &'static str {
        match self {
            Primitive::String => "string",
            Primitive::Number => "number",
            Primitive::Integer => "integer",
            Primitive::Boolean => "boolean",
        }
    }

    /// 类型匹配时返回（可能被规整过的）值；整数接受小数部分为 0 的浮点数
    fn coerce(self, value: &Value) -> Option<Value> {
        match self {
            Primitive::String => value.is_string().then(|| value.clone()),
            Primitive::Number => value.is_number().then(|| value.clone()),
            Primitive::Boolean => value.is_boolean().then(|| value.clone()),
            Primitive::Integer => {
                if value.is_i64() || value.is_u64() {
                    Some(value.clone())
                } else {
                    let f = value.as_f64()?;
                    (f.is_finite() && f.fract() == 0.0).then(|| Value::from(f as i64))
                }
            }
        }
    }
}

/// 参数类型：基本类型或基本类型数组
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
    Integer,
    Boolean,
    Array(Primitive),
}

impl ParamType {
    pub fn coerce(self, value: &Value) -> Option<Value> {
        match self {
            ParamType::String => Primitive::String.coerce(value),
            ParamType::Number => Primitive::Number.coerce(value),
            ParamType::Integer => Primitive::Integer.coerce(value),
            ParamType::Boolean => Primitive::Boolean.coerce(value),
            ParamType::Array(inner) => value
                .as_array()?
                .iter()
                .map(|v| inner.coerce(v))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::String => f.write_str("string"),
            ParamType::Number => f.write_str("number"),
            ParamType::Integer => f.write_str("integer"),
            ParamType::Boolean => f.write_str("boolean"),
            ParamType::Array(inner) => write!(f, "array<{}>", inner.label()),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub required: bool,
    pub description: String,
    /// 可选参数缺省时填入的值
    pub default: Option<Value>,
}

/// 工具声明：注册后不可变
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub params: Vec<ParamSpec>,
}

/// ToolSpec 构建失败
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SpecError {
    #[error("Tool name must be non-empty and use only [A-Za-z0-9_-]: '{0}'")]
    InvalidName(String),

    #[error("Duplicate parameter '{param}' in tool '{tool}'")]
    DuplicateParam { tool: String, param: String },

    #[error("Default for '{param}' in tool '{tool}' does not match type {ty}")]
    DefaultTypeMismatch {
        tool: String,
        param: String,
        ty: ParamType,
    },
}

/// 工具调用失败：都会被转换成 Observation 喂回模型，不会中止循环
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available tools: {}", available.join(", "))]
    UnknownTool { name: String, available: Vec<String> },

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    Execution { tool: String, reason: String },

    #[error("Tool '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    /// 出错的工具名（未注册时为模型请求的名字）
    pub fn tool_name(&self) -> &str {
        match self {
            ToolError::UnknownTool { name, .. } => name,
            ToolError::InvalidArguments { tool, .. }
            | ToolError::Execution { tool, .. }
            | ToolError::Timeout { tool, .. } => tool,
        }
    }
}

/// 注册表错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{0}' is not registered")]
    UnknownTool(String),

    #[error(transparent)]
    InvalidSpec(#[from] SpecError),
}

/// ToolSpec 构建器
pub struct ToolSpecBuilder {
    name: String,
    description: String,
    params: Vec<ParamSpec>,
}

impl ToolSpec {
    pub fn builder(name: impl Into<String>) -> ToolSpecBuilder {
        ToolSpecBuilder {
            name: name.into(),
            description: String::new(),
            params: Vec::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// 校验并规整参数：必须是对象；必填项存在且非 null；类型匹配；
    /// 可选项缺省时填默认值；未声明的多余参数忽略。
    pub fn validate(&self, args: &Value) -> Result<ToolArgs, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool: self.name.clone(),
            reason,
        };
        let obj = args
            .as_object()
            .ok_or_else(|| invalid(format!("expected a JSON object, got {}", json_kind(args))))?;

        let mut out = Map::new();
        for param in &self.params {
            match obj.get(&param.name).filter(|v| !v.is_null()) {
                Some(value) => {
                    let coerced = param.ty.coerce(value).ok_or_else(|| {
                        invalid(format!(
                            "parameter '{}' must be {}, got {}",
                            param.name,
                            param.ty,
                            json_kind(value)
                        ))
                    })?;
                    out.insert(param.name.clone(), coerced);
                }
                None if param.required => {
                    return Err(invalid(format!(
                        "missing required parameter '{}'",
                        param.name
                    )));
                }
                None => {
                    if let Some(default) = &param.default {
                        out.insert(param.name.clone(), default.clone());
                    }
                }
            }
        }

        for key in obj.keys().filter(|k| self.param(k).is_none()) {
            tracing::debug!(tool = %self.name, param = %key, "ignoring undeclared parameter");
        }

        Ok(ToolArgs(out))
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl ToolSpecBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn required(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(name, ty, true, description, None)
    }

    pub fn optional(self, name: &str, ty: ParamType, description: &str) -> Self {
        self.push(name, ty, false, description, None)
    }

    pub fn optional_with_default(
        self,
        name: &str,
        ty: ParamType,
        default: Value,
        description: &str,
    ) -> Self {
        self.push(name, ty, false, description, Some(default))
    }

    fn push(
        mut self,
        name: &str,
        ty: ParamType,
        required: bool,
        description: &str,
        default: Option<Value>,
    ) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            ty,
            required,
            description: description.to_string(),
            default,
        });
        self
    }

    pub fn build(self) -> Result<ToolSpec, SpecError> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(SpecError::InvalidName(self.name));
        }
        for (i, p) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|q| q.name == p.name) {
                return Err(SpecError::DuplicateParam {
                    tool: self.name.clone(),
                    param: p.name.clone(),
                });
            }
            if let Some(default) = &p.default {
                if p.ty.coerce(default).is_none() {
                    return Err(SpecError::DefaultTypeMismatch {
                        tool: self.name.clone(),
                        param: p.name.clone(),
                        ty: p.ty,
                    });
                }
            }
        }
        Ok(ToolSpec {
            name: self.name,
            description: self.description,
            params: self.params,
        })
    }
}

/// 已校验的参数（对象），提供按类型读取的便捷方法
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs(Map<String, Value>);

impl ToolArgs {
    pub fn str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    /// 读取必填字符串参数，空白字符串视为缺失
    pub fn require_str(&self, name: &str) -> Result<&str, String> {
        self.str(name)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| format!("Missing {}", name))
    }

    pub fn u64(&self, name: &str) -> Option<u64> {
        self.0.get(name).and_then(|v| v.as_u64())
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.0.get(name).and_then(|v| v.as_f64())
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(|v| v.as_bool())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

/// 工具 trait：声明式 spec + 异步执行（参数已按 spec 校验）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具声明；注册时调用一次
    fn spec(&self) -> Result<ToolSpec, SpecError>;

    /// 执行工具，成功返回 JSON 文本；失败原因以字符串返回，由注册表包装为 ToolError::Execution
    async fn execute(&self, args: ToolArgs) -> Result<String, String>;
}

struct Entry {
    spec: ToolSpec,
    tool: Arc<dyn Tool>,
}

impl Clone for Entry {
    fn clone(&self) -> Self {
        Self {
            spec: self.spec.clone(),
            tool: Arc::clone(&self.tool),
        }
    }
}

/// 工具注册表：按注册顺序保存，name -> 下标 查找；共享给循环后只读
#[derive(Clone, Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool))
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let spec = tool.spec()?;
        if self.index.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }
        self.index.insert(spec.name.clone(), self.entries.len());
        self.entries.push(Entry { spec, tool });
        Ok(())
    }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.index.get(name).map(|&i| &self.entries[i].spec)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序返回工具名
    pub fn tool_names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.spec.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 取出指定工具组成新注册表（按 names 的顺序），供编排器绑定固定工具子集
    pub fn subset(&self, names: &[&str]) -> Result<ToolRegistry, RegistryError> {
        let mut out = ToolRegistry::new();
        for name in names {
            let &i = self
                .index
                .get(*name)
                .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))?;
            if out.index.contains_key(*name) {
                return Err(RegistryError::DuplicateTool(name.to_string()));
            }
            out.index.insert(name.to_string(), out.entries.len());
            out.entries.push(self.entries[i].clone());
        }
        Ok(out)
    }

    /// 生成写入 system prompt 的工具说明；顺序与注册顺序一致，多次调用结果相同
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            let spec = &entry.spec;
            out.push_str(&format!("- {}: {}\n", spec.name, spec.description));
            if spec.params.is_empty() {
                out.push_str("  Parameters: none\n");
                continue;
            }
            out.push_str("  Parameters:\n");
            for p in &spec.params {
                let presence = if p.required { "required" } else { "optional" };
                let default = p
                    .default
                    .as_ref()
                    .map(|d| format!(", default={}", d))
                    .unwrap_or_default();
                out.push_str(&format!(
                    "    - {} ({}, {}{}): {}\n",
                    p.name, p.ty, presence, default, p.description
                ));
            }
        }
        out
    }

    /// 按名调用：未注册 -> UnknownTool；参数不合法 -> InvalidArguments；执行失败 -> Execution
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
                available: self.tool_names(),
            })?;
        let validated = entry.spec.validate(args)?;
        entry
            .tool
            .execute(validated)
            .await
            .map_err(|reason| ToolError::Execution {
                tool: name.to_string(),
                reason,
            })
    }
}
