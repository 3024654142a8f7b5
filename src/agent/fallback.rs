//! 兜底结果库
//!
//! 启动时从目录加载每种结果的规范文档（trip_plan.json / blog.json），校验能解码为对应结构；
//! 之后 resolve 只复制文档并覆盖 sessionId 与 timestamp，不会失败。
//! 每个兜底结果有两种形态：原始文档（对外返回）与类型化视图（读取字段用），二者共用同一组会话 ID 与时间戳。

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::agent::model::{typed_view, BlogPost, ResultKind, StructuredResult, TripPlan};

#[derive(Error, Debug)]
pub enum FallbackError {
    #[error("cannot read fallback document {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fallback document for {kind} is not valid JSON: {reason}")]
    InvalidJson { kind: ResultKind, reason: String },

    #[error("fallback document for {kind} does not match the expected shape: {reason}")]
    Schema { kind: ResultKind, reason: String },
}

/// 新会话 ID：`session_` + 去横线的 UUID v4
pub fn new_session_id() -> String {
    format!("session_{}", uuid::Uuid::new_v4().simple())
}

/// 当前时间（RFC 3339，UTC）
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// 已校验的兜底文档；加载后只读，可在多个请求间共享
#[derive(Debug, Clone)]
pub struct FallbackStore {
    trip: TripPlan,
    trip_doc: Value,
    blog: BlogPost,
    blog_doc: Value,
}

fn check<T: StructuredResult>(doc: &Value) -> Result<T, FallbackError> {
    typed_view(doc).map_err(|reason| FallbackError::Schema {
        kind: T::KIND,
        reason,
    })
}

fn read_doc(dir: &Path, kind: ResultKind) -> Result<Value, FallbackError> {
    let path = dir.join(kind.file_name());
    let text = std::fs::read_to_string(&path).map_err(|source| FallbackError::Read {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| FallbackError::InvalidJson {
        kind,
        reason: e.to_string(),
    })
}

/// 覆盖文档顶层的 sessionId 与 timestamp；其余键原样保留
pub(crate) fn stamp_document(doc: &mut Value, session_id: &str, timestamp: &str) {
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("sessionId".to_string(), Value::String(session_id.to_string()));
        obj.insert("timestamp".to_string(), Value::String(timestamp.to_string()));
    }
}

impl FallbackStore {
    /// 从目录加载 trip_plan.json 与 blog.json；任一缺失或不合法都返回错误
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, FallbackError> {
        let dir = dir.as_ref();
        let store = Self::from_documents(
            read_doc(dir, ResultKind::Trip)?,
            read_doc(dir, ResultKind::Blog)?,
        )?;
        tracing::info!(dir = %dir.display(), "fallback documents loaded");
        Ok(store)
    }

    /// 由内存中的文档构建（同样做结构校验）
    pub fn from_documents(trip_doc: Value, blog_doc: Value) -> Result<Self, FallbackError> {
        Ok(Self {
            trip: check::<TripPlan>(&trip_doc)?,
            trip_doc,
            blog: check::<BlogPost>(&blog_doc)?,
            blog_doc,
        })
    }

    pub fn resolve_trip(&self) -> TripPlan {
        let mut plan = self.trip.clone();
        plan.stamp(&new_session_id(), &now_timestamp());
        plan
    }

    pub fn resolve_blog(&self) -> BlogPost {
        let mut post = self.blog.clone();
        post.stamp(&new_session_id(), &now_timestamp());
        post
    }

    /// 按种类返回原始文档副本（仅 sessionId / timestamp 被替换）
    pub fn resolve(&self, kind: ResultKind) -> Value {
        self.stamped_document(kind, &new_session_id(), &now_timestamp())
    }

    /// 同 resolve，但使用调用方给定的会话 ID 与时间戳
    pub fn stamped_document(&self, kind: ResultKind, session_id: &str, timestamp: &str) -> Value {
        let mut doc = match kind {
            ResultKind::Trip => self.trip_doc.clone(),
            ResultKind::Blog => self.blog_doc.clone(),
        };
        stamp_document(&mut doc, session_id, timestamp);
        doc
    }
}

/// 按结果类型取兜底值
pub trait FromFallback: StructuredResult {
    fn from_fallback(store: &FallbackStore) -> Self;
}

impl FromFallback for TripPlan {
    fn from_fallback(store: &FallbackStore) -> Self {
        store.resolve_trip()
    }
}

impl FromFallback for BlogPost {
    fn from_fallback(store: &FallbackStore) -> Self {
        store.resolve_blog()
    }
}
