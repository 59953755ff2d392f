//! 批次报告写入服务 - 业务能力层
//!
//! 只负责"把批次汇总写成 JSON 文件"，不关心批次如何产生

use crate::models::outcome::BatchSummary;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 批次报告写入服务
pub struct ReportWriter {
    report_path: PathBuf,
}

impl ReportWriter {
    /// 使用指定文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            report_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.report_path
    }

    /// 写入批次汇总（覆盖已有文件）
    pub async fn write(&self, summary: &BatchSummary) -> Result<()> {
        let json = serde_json::to_string_pretty(summary)?;

        if let Some(parent) = self.report_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("无法创建报告目录: {}", parent.display()))?;
            }
        }

        tokio::fs::write(&self.report_path, json)
            .await
            .with_context(|| format!("无法写入报告: {}", self.report_path.display()))?;

        debug!(
            "已写入批次报告 {} ({} 个文件)",
            self.report_path.display(),
            summary.outcomes.len()
        );
        Ok(())
    }
}
