use crate::models::media::guess_from_extension;
use crate::models::submission::FileSubmission;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tokio::fs;

/// 读取单个发票文件并转换为 FileSubmission
pub async fn load_invoice_file(file_path: &Path) -> Result<FileSubmission> {
    let content = fs::read(file_path)
        .await
        .with_context(|| format!("无法读取发票文件: {}", file_path.display()))?;

    let metadata = fs::metadata(file_path)
        .await
        .with_context(|| format!("无法读取文件信息: {}", file_path.display()))?;

    let last_modified_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default();

    let file_name = file_path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let media_type = guess_from_extension(
        file_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default(),
    );

    Ok(FileSubmission::new(file_name, media_type, content, last_modified_ms))
}

/// 从文件夹中加载所有发票文件（按文件名排序，保证提交顺序稳定）
///
/// 隐藏文件、空文件和子目录会被跳过；媒体类型不做过滤，交给 ExtractionClient 判定
pub async fn load_all_invoice_files(folder_path: &str) -> Result<Vec<FileSubmission>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("文件夹不存在: {}", folder_path);
    }

    let mut paths = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取文件夹: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|s| s.to_str())
            .map_or(true, |name| name.starts_with('.'));
        if path.is_file() && !hidden {
            paths.push(path);
        }
    }
    paths.sort();

    let mut submissions = Vec::new();
    for path in paths {
        match load_invoice_file(&path).await {
            Ok(submission) if submission.declared_size == 0 => {
                tracing::warn!("跳过空文件: {}", path.display());
            }
            Ok(submission) => {
                tracing::info!(
                    "正在加载: {} ({} 字节, {})",
                    submission.file_name,
                    submission.declared_size,
                    submission.media_type
                );
                submissions.push(submission);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(submissions)
}
