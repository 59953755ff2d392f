//! 单文件处理流程 - 流程层
//!
//! 核心职责：定义"一个文件"的完整生命周期
//!
//! 流程顺序：
//! 1. Pending → Uploading：调用 ExtractionClient
//! 2. 抽取失败 → Failed（附失败原因），结束
//! 3. 抽取成功 → Validating：运行 ResponseValidator
//! 4. 无问题 → Valid；有问题 → NeedsReview（附问题列表）
//!
//! 批次取消时，尚未进入终态的文件以 Cancelled 原因进入 Failed。

use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::clients::ExtractionClient;
use crate::models::outcome::{FailureReason, FileOutcome, OutcomeState, TransitionError};
use crate::models::submission::FileSubmission;
use crate::services::ResponseValidator;
use crate::workflow::file_ctx::{CancelSignal, FileCtx, OutcomeUpdate, UpdateSender};

/// 单文件处理流程
///
/// - 独占自己的 FileOutcome，不与其它任务共享
/// - 只依赖业务能力（client / validator）
/// - 每次状态迁移都向编排层发送一次更新
pub struct FileFlow {
    client: ExtractionClient,
    validator: ResponseValidator,
    upload_slots: Option<Arc<Semaphore>>,
    verbose_logging: bool,
}

impl FileFlow {
    /// # 参数
    /// - `max_concurrent_uploads`: 同时上传的文件上限，0 表示不限制
    pub fn new(client: ExtractionClient, max_concurrent_uploads: usize, verbose_logging: bool) -> Self {
        let upload_slots =
            (max_concurrent_uploads > 0).then(|| Arc::new(Semaphore::new(max_concurrent_uploads)));
        Self {
            client,
            validator: ResponseValidator::new(),
            upload_slots,
            verbose_logging,
        }
    }

    pub fn client(&self) -> &ExtractionClient {
        &self.client
    }

    /// 运行单个文件的完整流程，返回终态结果
    pub async fn run(
        &self,
        ctx: FileCtx,
        submission: FileSubmission,
        mut cancel: CancelSignal,
        updates: UpdateSender,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::pending(&submission);

        // 等待上传名额（等待期间可被取消）
        let permit = match &self.upload_slots {
            Some(slots) => tokio::select! {
                biased;
                _ = cancel.cancelled() => return self.abandon(&ctx, outcome, &updates),
                permit = slots.clone().acquire_owned() => permit.ok(),
            },
            None => None,
        };

        if cancel.is_cancelled() {
            return self.abandon(&ctx, outcome, &updates);
        }

        self.step(&ctx, &mut outcome, &updates, |o| o.start_upload());
        info!("{} 📤 开始上传 ({} 字节)", ctx, submission.effective_size());

        let extracted = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = self.client.extract(&submission) => Some(result),
        };
        drop(permit);

        let result = match extracted {
            None => return self.abandon(&ctx, outcome, &updates),
            Some(Err(e)) => {
                warn!("{} ❌ 抽取失败: {}", ctx, e);
                let reason = FailureReason::from(&e);
                self.step(&ctx, &mut outcome, &updates, |o| o.fail(reason));
                return outcome;
            }
            Some(Ok(result)) => result,
        };

        let verdict = self.validator.validate(&result);
        self.step(&ctx, &mut outcome, &updates, |o| o.start_validation(result));

        if cancel.is_cancelled() {
            return self.abandon(&ctx, outcome, &updates);
        }

        if self.verbose_logging {
            for issue in &verdict.issues {
                debug!("{} 校验问题 [{}] {}", ctx, issue.kind.as_str(), issue.message);
            }
        }

        let issue_count = verdict.issues.len();
        self.step(&ctx, &mut outcome, &updates, |o| o.finish(verdict));

        match outcome.state() {
            OutcomeState::Valid => info!("{} ✅ 校验通过", ctx),
            _ => info!("{} ⚠️ 需要人工复核 ({} 个问题)", ctx, issue_count),
        }

        outcome
    }

    /// 执行一次状态迁移并发送更新
    fn step<F>(&self, ctx: &FileCtx, outcome: &mut FileOutcome, updates: &UpdateSender, transition: F)
    where
        F: FnOnce(&mut FileOutcome) -> Result<(), TransitionError>,
    {
        if let Err(e) = transition(outcome) {
            error!("{} 状态迁移失败: {}", ctx, e);
            return;
        }
        // 接收端已关闭时丢弃更新，最终结果由任务返回值给出
        let _ = updates.send(OutcomeUpdate {
            index: ctx.index,
            outcome: outcome.clone(),
        });
    }

    /// 批次已取消：非终态文件进入 Failed(Cancelled)
    fn abandon(&self, ctx: &FileCtx, mut outcome: FileOutcome, updates: &UpdateSender) -> FileOutcome {
        if !outcome.is_terminal() {
            info!("{} 🛑 批次已取消，放弃处理 (当前状态 {})", ctx, outcome.state());
            self.step(ctx, &mut outcome, updates, |o| o.fail(FailureReason::cancelled()));
        }
        outcome
    }
}
