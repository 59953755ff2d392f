//! 批次编排器 - 编排层
//!
//! ## 职责
//!
//! 1. **准入检查**：空批次、重复提交、非正大小、调用方在途批次超限，全部在启动任务前拒绝
//! 2. **逐文件并发**：每个文件一个独立任务，互不阻塞，失败互不影响
//! 3. **渐进观察**：调用方可以订阅单文件更新，也可以随时读取当前快照
//! 4. **汇合点**：所有任务结束后生成最终 BatchSummary
//! 5. **协作式取消**：已进入终态的结果保留，其余文件以 Cancelled 原因失败
//!
//! ## 数据所有权
//!
//! 每个任务独占自己的 FileOutcome；驱动任务只接收任务发来的副本，
//! 并在汇合点之后用任务的返回值生成最终结果。

use crate::clients::ExtractionClient;
use crate::config::Config;
use crate::error::{AppError, AppResult, BatchRejection};
use crate::models::outcome::{BatchId, BatchSummary, FailureReason, FileOutcome};
use crate::models::submission::FileSubmission;
use crate::orchestrator::registry::{InFlightRegistry, InFlightSlot};
use crate::workflow::{CancelSignal, FileCtx, FileFlow, OutcomeUpdate};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};

/// 单文件更新广播的最小容量
const MIN_EVENT_CAPACITY: usize = 16;

/// 批次编排器
pub struct BatchOrchestrator {
    flow: Arc<FileFlow>,
    registry: InFlightRegistry,
}

impl BatchOrchestrator {
    /// 按配置创建
    pub fn new(client: ExtractionClient, config: &Config) -> Self {
        Self::with_flow(
            FileFlow::new(client, config.max_concurrent_uploads, config.verbose_logging),
            config.max_in_flight_batches_per_caller,
        )
    }

    pub fn with_flow(flow: FileFlow, max_in_flight_per_caller: usize) -> Self {
        Self {
            flow: Arc::new(flow),
            registry: InFlightRegistry::new(max_in_flight_per_caller),
        }
    }

    /// 提交一个批次
    ///
    /// # 参数
    /// - `caller`: 调用方标识（背压按调用方计算）
    /// - `files`: 待处理文件，顺序即汇总中的顺序
    ///
    /// # 返回
    /// 被接受时返回批次句柄；被拒绝时不会启动任何任务
    ///
    /// 必须在 tokio 运行时中调用
    pub fn submit(
        &self,
        caller: &str,
        files: Vec<FileSubmission>,
    ) -> Result<BatchHandle, BatchRejection> {
        check_admission(&files)?;
        let slot = self.registry.try_acquire(caller)?;

        let batch_id = BatchId::next();
        info!("{}", "=".repeat(60));
        info!("📦 批次 {} 已接受: {} 个文件 (调用方 {})", batch_id, files.len(), caller);
        info!("{}", "=".repeat(60));

        let outcomes: Vec<FileOutcome> = files.iter().map(FileOutcome::pending).collect();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (progress_tx, progress_rx) =
            watch::channel(BatchSummary::from_outcomes(batch_id, outcomes.clone(), false));
        let (events_tx, _) = broadcast::channel(MIN_EVENT_CAPACITY.max(files.len() * 4));
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        let mut tasks = JoinSet::new();
        for (index, submission) in files.into_iter().enumerate() {
            let ctx = FileCtx::new(
                batch_id,
                index,
                submission.id.clone(),
                submission.file_name.clone(),
            );
            let flow = self.flow.clone();
            let cancel = CancelSignal::new(cancel_rx.clone());
            let updates = updates_tx.clone();

            tasks.spawn(async move {
                let outcome = flow.run(ctx, submission, cancel, updates).await;
                (index, outcome)
            });
        }
        drop(updates_tx);

        let driver = tokio::spawn(drive(BatchDriver {
            batch_id,
            outcomes,
            tasks,
            updates: updates_rx,
            progress: progress_tx,
            events: events_tx.clone(),
            cancel: cancel_rx,
            slot,
        }));

        Ok(BatchHandle {
            id: batch_id,
            cancel: Arc::new(cancel_tx),
            progress: progress_rx,
            events: events_tx,
            driver,
        })
    }

    /// 调用方当前在途批次数量
    pub fn in_flight(&self, caller: &str) -> usize {
        self.registry.in_flight(caller)
    }

    /// 当前未释放的临时数据数量
    pub fn live_temp_handles(&self) -> usize {
        self.flow.client().live_temp_handles()
    }
}

/// 准入检查（不涉及在途名额）
fn check_admission(files: &[FileSubmission]) -> Result<(), BatchRejection> {
    if files.is_empty() {
        return Err(BatchRejection::EmptyBatch);
    }

    let mut seen = HashSet::new();
    for file in files {
        if file.declared_size == 0 {
            return Err(BatchRejection::InvalidSize {
                id: file.id.to_string(),
            });
        }
        if !seen.insert(&file.id) {
            return Err(BatchRejection::DuplicateSubmission {
                id: file.id.to_string(),
            });
        }
    }
    Ok(())
}

/// 批次句柄
///
/// 释放句柄不会中止批次；只有 `cancel` 会
pub struct BatchHandle {
    id: BatchId,
    cancel: Arc<watch::Sender<bool>>,
    progress: watch::Receiver<BatchSummary>,
    events: broadcast::Sender<FileOutcome>,
    driver: JoinHandle<BatchSummary>,
}

impl BatchHandle {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// 订阅单文件状态更新（只收到订阅之后发生的更新）
    pub fn subscribe(&self) -> broadcast::Receiver<FileOutcome> {
        self.events.subscribe()
    }

    /// 批次进度（每次有文件状态变化时更新）
    pub fn progress(&self) -> watch::Receiver<BatchSummary> {
        self.progress.clone()
    }

    /// 当前快照
    pub fn snapshot(&self) -> BatchSummary {
        self.progress.borrow().clone()
    }

    /// 请求取消批次
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// 可跨任务传递的取消器
    pub fn canceller(&self) -> BatchCanceller {
        BatchCanceller {
            cancel: self.cancel.clone(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.driver.is_finished()
    }

    /// 等待所有文件进入终态，返回最终汇总
    pub async fn wait(self) -> AppResult<BatchSummary> {
        let batch_id = self.id;
        self.driver
            .await
            .map_err(|e| AppError::Other(format!("批次 {} 驱动任务异常: {}", batch_id, e)))
    }
}

/// 批次取消器
#[derive(Clone)]
pub struct BatchCanceller {
    cancel: Arc<watch::Sender<bool>>,
}

impl BatchCanceller {
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

struct BatchDriver {
    batch_id: BatchId,
    outcomes: Vec<FileOutcome>,
    tasks: JoinSet<(usize, FileOutcome)>,
    updates: mpsc::UnboundedReceiver<OutcomeUpdate>,
    progress: watch::Sender<BatchSummary>,
    events: broadcast::Sender<FileOutcome>,
    cancel: watch::Receiver<bool>,
    slot: InFlightSlot,
}

impl BatchDriver {
    fn cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// 记录一次更新；已进入终态的结果不会被旧更新覆盖
    fn apply(&mut self, index: usize, outcome: FileOutcome) {
        let Some(slot) = self.outcomes.get_mut(index) else {
            return;
        };
        if slot.is_terminal() {
            return;
        }
        *slot = outcome.clone();
        // 没有订阅者时发送失败，忽略
        let _ = self.events.send(outcome);
        self.publish();
    }

    fn publish(&self) {
        self.progress.send_replace(BatchSummary::from_outcomes(
            self.batch_id,
            self.outcomes.clone(),
            self.cancelled(),
        ));
    }
}

/// 驱动任务：汇总更新，等待全部任务结束
async fn drive(mut driver: BatchDriver) -> BatchSummary {
    let total = driver.outcomes.len();
    let mut settled = 0usize;

    loop {
        // 先处理已排队的更新，再处理任务结束
        tokio::select! {
            biased;
            Some(update) = driver.updates.recv() => {
                driver.apply(update.index, update.outcome);
            }
            joined = driver.tasks.join_next() => match joined {
                Some(Ok((index, outcome))) => {
                    settled += 1;
                    info!(
                        "[{}] 进度 {}/{}: {} → {}",
                        driver.batch_id, settled, total, outcome.file_name, outcome.state()
                    );
                    driver.apply(index, outcome);
                }
                Some(Err(e)) => {
                    settled += 1;
                    error!("[{}] 文件任务异常终止: {}", driver.batch_id, e);
                }
                None => break,
            },
        }
    }

    // 任务异常终止时，其结果停留在最后一次更新的状态
    for outcome in driver.outcomes.iter_mut().filter(|o| !o.is_terminal()) {
        let reason = FailureReason {
            kind: crate::error::FailureKind::Cancelled,
            message: "文件任务异常终止".to_string(),
        };
        if let Err(e) = outcome.fail(reason) {
            error!("[{}] {}", driver.batch_id, e);
        }
    }

    let summary = BatchSummary::from_outcomes(
        driver.batch_id,
        driver.outcomes.clone(),
        driver.cancelled(),
    );
    log_summary(&summary);

    // 先归还在途名额，再发布最终结果
    let BatchDriver { progress, slot, .. } = driver;
    drop(slot);
    progress.send_replace(summary.clone());

    summary
}

fn log_summary(summary: &BatchSummary) {
    info!("\n{}", "─".repeat(60));
    info!(
        "✓ 批次 {} 完成{}: 通过 {} / 待复核 {} / 失败 {} (共 {})",
        summary.batch_id,
        if summary.cancelled { " (已取消)" } else { "" },
        summary.counts.valid,
        summary.counts.needs_review,
        summary.counts.failed,
        summary.counts.total()
    );
    info!("{}", "─".repeat(60));
}
