//! 文件处理上下文
//!
//! 封装"我正在处理哪个批次的第几个文件"这一信息，以及批次的取消信号

use crate::models::outcome::{BatchId, FileOutcome};
use crate::models::submission::SubmissionId;
use std::fmt::Display;
use tokio::sync::{mpsc, watch};

/// 文件处理上下文
#[derive(Debug, Clone)]
pub struct FileCtx {
    /// 所属批次
    pub batch_id: BatchId,

    /// 文件在批次中的位置（从0开始，与提交顺序一致）
    pub index: usize,

    /// 文件提交标识
    pub submission_id: SubmissionId,

    /// 文件名（仅用于日志显示）
    pub file_name: String,
}

impl FileCtx {
    pub fn new(batch_id: BatchId, index: usize, submission_id: SubmissionId, file_name: String) -> Self {
        Self {
            batch_id,
            index,
            submission_id,
            file_name,
        }
    }
}

impl Display for FileCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} 文件#{} {}]", self.batch_id, self.index + 1, self.file_name)
    }
}

/// 单个文件的状态更新
#[derive(Debug, Clone)]
pub struct OutcomeUpdate {
    pub index: usize,
    pub outcome: FileOutcome,
}

pub type UpdateSender = mpsc::UnboundedSender<OutcomeUpdate>;

/// 批次取消信号（协作式）
///
/// 只在任务的挂起点被观察到；发送端全部释放后视为永不取消
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// 等待取消发生
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
