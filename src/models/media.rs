//! 媒体类型表
//!
//! 简写、完整 MIME 与文件扩展名统一映射到规范 MIME

use crate::error::ExtractionError;
use phf::phf_map;

/// 媒体类型别名 → 规范 MIME
static MEDIA_ALIASES: phf::Map<&'static str, &'static str> = phf_map! {
    "pdf" => "application/pdf",
    "application/pdf" => "application/pdf",
    "jpeg" => "image/jpeg",
    "jpg" => "image/jpeg",
    "image/jpeg" => "image/jpeg",
    "image/jpg" => "image/jpeg",
    "png" => "image/png",
    "image/png" => "image/png",
};

/// 文件扩展名 → MIME（扫描目录时用来猜测声明类型）
static EXTENSION_TYPES: phf::Map<&'static str, &'static str> = phf_map! {
    "pdf" => "application/pdf",
    "jpg" => "image/jpeg",
    "jpeg" => "image/jpeg",
    "png" => "image/png",
    "zip" => "application/zip",
    "txt" => "text/plain",
};

/// 把别名或 MIME 归一化为规范 MIME
pub fn canonical_media_type(name: &str) -> Option<&'static str> {
    let key = name.trim().to_ascii_lowercase();
    // 去掉 "; charset=..." 之类的参数
    let key = key.split(';').next().unwrap_or_default().trim();
    MEDIA_ALIASES.get(key).copied()
}

/// 根据扩展名猜测 MIME，未知扩展名返回 application/octet-stream
pub fn guess_from_extension(ext: &str) -> &'static str {
    EXTENSION_TYPES
        .get(ext.to_ascii_lowercase().as_str())
        .copied()
        .unwrap_or("application/octet-stream")
}

/// 允许的媒体类型集合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPolicy {
    allowed: Vec<&'static str>,
}

impl MediaPolicy {
    /// 由配置中的名字构建；遇到未知名字时返回该名字
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, String> {
        let mut allowed = Vec::new();
        for name in names {
            let canonical =
                canonical_media_type(name.as_ref()).ok_or_else(|| name.as_ref().to_string())?;
            if !allowed.contains(&canonical) {
                allowed.push(canonical);
            }
        }
        Ok(Self { allowed })
    }

    /// 检查声明类型，通过时返回规范 MIME
    pub fn check(&self, declared: &str) -> Result<&'static str, ExtractionError> {
        canonical_media_type(declared)
            .filter(|canonical| self.allowed.contains(canonical))
            .ok_or_else(|| ExtractionError::UnsupportedMediaType {
                media_type: declared.to_string(),
            })
    }

    pub fn allowed(&self) -> &[&'static str] {
        &self.allowed
    }
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            allowed: vec!["application/pdf", "image/jpeg", "image/png"],
        }
    }
}
