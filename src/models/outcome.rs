//! 单文件结果与批次汇总
//!
//! 每个文件的状态机：
//!
//! ```text
//! Pending ──> Uploading ──> Validating ──> Valid
//!    │            │              ├──────> NeedsReview
//!    │            │              └──────> Failed (取消)
//!    │            └──> Failed
//!    └──> Failed (取消)
//! ```
//!
//! Valid / NeedsReview / Failed 为终态，不允许再迁移。

use crate::error::{ExtractionError, FailureKind};
use crate::models::invoice::ExtractionResult;
use crate::models::submission::{FileSubmission, SubmissionId};
use crate::models::verdict::{ValidationIssue, ValidationVerdict};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// 文件生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeState {
    Pending,
    Uploading,
    Validating,
    Valid,
    NeedsReview,
    Failed,
}

impl OutcomeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::NeedsReview | Self::Failed)
    }

    /// 是否允许从当前状态迁移到 `next`
    pub fn can_advance_to(&self, next: OutcomeState) -> bool {
        use OutcomeState::*;
        matches!(
            (self, next),
            (Pending, Uploading)
                | (Pending, Failed)
                | (Uploading, Validating)
                | (Uploading, Failed)
                | (Validating, Valid)
                | (Validating, NeedsReview)
                | (Validating, Failed)
        )
    }
}

impl Display for OutcomeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "Pending",
            Self::Uploading => "Uploading",
            Self::Validating => "Validating",
            Self::Valid => "Valid",
            Self::NeedsReview => "NeedsReview",
            Self::Failed => "Failed",
        };
        write!(f, "{}", name)
    }
}

/// 非法状态迁移
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("文件 {id} 不能从 {from} 迁移到 {to}")]
pub struct TransitionError {
    pub id: SubmissionId,
    pub from: OutcomeState,
    pub to: OutcomeState,
}

/// 失败原因（面向用户）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureReason {
    pub fn cancelled() -> Self {
        Self {
            kind: FailureKind::Cancelled,
            message: "批次已取消，文件未完成处理".to_string(),
        }
    }
}

impl From<&ExtractionError> for FailureReason {
    fn from(err: &ExtractionError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// 单个文件的处理结果
///
/// 只由负责该文件的任务修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutcome {
    pub submission_id: SubmissionId,
    pub file_name: String,
    pub outcome_state: OutcomeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ExtractionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<ValidationIssue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<FailureReason>,
}

impl FileOutcome {
    pub fn pending(submission: &FileSubmission) -> Self {
        Self {
            submission_id: submission.id.clone(),
            file_name: submission.file_name.clone(),
            outcome_state: OutcomeState::Pending,
            result: None,
            issues: None,
            failure_reason: None,
        }
    }

    pub fn state(&self) -> OutcomeState {
        self.outcome_state
    }

    pub fn is_terminal(&self) -> bool {
        self.outcome_state.is_terminal()
    }

    fn advance(&mut self, next: OutcomeState) -> Result<(), TransitionError> {
        if !self.outcome_state.can_advance_to(next) {
            return Err(TransitionError {
                id: self.submission_id.clone(),
                from: self.outcome_state,
                to: next,
            });
        }
        self.outcome_state = next;
        Ok(())
    }

    pub fn start_upload(&mut self) -> Result<(), TransitionError> {
        self.advance(OutcomeState::Uploading)
    }

    /// 抽取成功，进入校验
    pub fn start_validation(&mut self, result: ExtractionResult) -> Result<(), TransitionError> {
        self.advance(OutcomeState::Validating)?;
        self.result = Some(result);
        Ok(())
    }

    /// 根据校验结论进入 Valid 或 NeedsReview
    pub fn finish(&mut self, verdict: ValidationVerdict) -> Result<(), TransitionError> {
        let next = if verdict.is_valid() {
            OutcomeState::Valid
        } else {
            OutcomeState::NeedsReview
        };
        self.advance(next)?;
        self.issues = Some(verdict.issues);
        Ok(())
    }

    pub fn fail(&mut self, reason: FailureReason) -> Result<(), TransitionError> {
        self.advance(OutcomeState::Failed)?;
        self.failure_reason = Some(reason);
        Ok(())
    }
}

/// 批次标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(u64);

impl BatchId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// 批次整体状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
}

/// 各状态计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCounts {
    pub pending: usize,
    pub uploading: usize,
    pub validating: usize,
    pub valid: usize,
    pub needs_review: usize,
    pub failed: usize,
}

impl StateCounts {
    pub fn tally<'a>(outcomes: impl IntoIterator<Item = &'a FileOutcome>) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.outcome_state {
                OutcomeState::Pending => counts.pending += 1,
                OutcomeState::Uploading => counts.uploading += 1,
                OutcomeState::Validating => counts.validating += 1,
                OutcomeState::Valid => counts.valid += 1,
                OutcomeState::NeedsReview => counts.needs_review += 1,
                OutcomeState::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn terminal(&self) -> usize {
        self.valid + self.needs_review + self.failed
    }

    pub fn total(&self) -> usize {
        self.pending + self.uploading + self.validating + self.terminal()
    }
}

/// 批次汇总
///
/// `outcomes` 顺序与提交顺序一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub batch_id: BatchId,
    pub status: BatchStatus,
    pub cancelled: bool,
    pub counts: StateCounts,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchSummary {
    pub fn from_outcomes(batch_id: BatchId, outcomes: Vec<FileOutcome>, cancelled: bool) -> Self {
        let counts = StateCounts::tally(&outcomes);
        let status = if outcomes.iter().all(FileOutcome::is_terminal) {
            BatchStatus::Completed
        } else {
            BatchStatus::InProgress
        };
        Self {
            batch_id,
            status,
            cancelled,
            counts,
            outcomes,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    pub fn outcome(&self, id: &SubmissionId) -> Option<&FileOutcome> {
        self.outcomes.iter().find(|o| &o.submission_id == id)
    }
}
