use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::Arc;

/// 文件提交标识
///
/// 由 名称 + 大小 + 修改时间 派生，或由调用方显式指定
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionId(String);

impl SubmissionId {
    pub fn derive(name: &str, size: u64, last_modified_ms: i64) -> Self {
        Self(format!("{}:{}:{}", name, size, last_modified_ms))
    }

    pub fn explicit(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SubmissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 一个待上传的发票文件
///
/// 开始上传后不可变：内容以 `Arc` 共享，只读
#[derive(Debug, Clone)]
pub struct FileSubmission {
    pub id: SubmissionId,
    pub file_name: String,
    pub media_type: String,
    pub declared_size: u64,
    content: Arc<[u8]>,
}

impl FileSubmission {
    /// 创建文件提交，标识由名称、大小和修改时间派生
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Vec<u8>>,
        last_modified_ms: i64,
    ) -> Self {
        let file_name = file_name.into();
        let content: Vec<u8> = content.into();
        let declared_size = content.len() as u64;
        Self {
            id: SubmissionId::derive(&file_name, declared_size, last_modified_ms),
            file_name,
            media_type: media_type.into(),
            declared_size,
            content: content.into(),
        }
    }

    /// 使用显式 uid
    pub fn with_id(mut self, uid: impl Into<String>) -> Self {
        self.id = SubmissionId::explicit(uid);
        self
    }

    /// 覆盖声明大小（浏览器上传时大小由客户端声明）
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = size;
        self
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// 用于大小检查的有效大小：声明值与实际值取大
    pub fn effective_size(&self) -> u64 {
        self.declared_size.max(self.content.len() as u64)
    }
}
