//! 批量发票处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是批处理模式的入口，负责把一个目录中的发票作为一个批次提交并输出结果。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：创建传输、临时存储、抽取客户端和批次编排器
//! 2. **批量加载**：扫描并加载目录中的所有发票文件（`Vec<FileSubmission>`）
//! 3. **提交与等待**：作为一个批次提交，Ctrl-C 触发协作式取消
//! 4. **报告输出**：把最终 BatchSummary 写成 JSON 文件
//! 5. **全局统计**：输出通过 / 待复核 / 失败数量

use crate::clients::ExtractionClient;
use crate::config::Config;
use crate::models::outcome::{BatchSummary, OutcomeState};
use crate::models::submission::FileSubmission;
use crate::orchestrator::batch_orchestrator::BatchOrchestrator;
use crate::services::ReportWriter;
use crate::utils::logging;
use anyhow::Result;
use std::path::Path;
use tracing::{info, warn};

/// 批处理模式下的调用方标识
const CLI_CALLER: &str = "cli";

/// 应用主结构
pub struct App {
    config: Config,
    orchestrator: BatchOrchestrator,
    report_writer: ReportWriter,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        logging::log_startup(&config);

        let client = ExtractionClient::from_config(&config)?;
        Ok(Self::with_client(config, client))
    }

    /// 使用指定的抽取客户端创建（测试中注入模拟传输）
    pub fn with_client(config: Config, client: ExtractionClient) -> Self {
        let orchestrator = BatchOrchestrator::new(client, &config);
        let report_writer = ReportWriter::with_path(&config.report_file);
        Self {
            config,
            orchestrator,
            report_writer,
        }
    }

    /// 运行应用主逻辑
    ///
    /// # 返回
    /// 目录为空时返回 `None`，否则返回最终批次汇总
    pub async fn run(&self) -> Result<Option<BatchSummary>> {
        let files = self.load_invoices().await?;

        if files.is_empty() {
            warn!("⚠️ 没有找到待处理的发票文件，程序结束");
            return Ok(None);
        }

        logging::log_files_loaded(files.len(), self.config.max_concurrent_uploads);

        let summary = self.process_batch(files).await?;

        self.report_writer.write(&summary).await?;
        print_final_stats(&summary, self.report_writer.path());

        Ok(Some(summary))
    }

    /// 加载发票
    async fn load_invoices(&self) -> Result<Vec<FileSubmission>> {
        info!("\n📁 正在扫描待处理的发票: {}", self.config.input_folder);
        crate::models::load_all_invoice_files(&self.config.input_folder).await
    }

    /// 提交批次并等待所有文件结束
    async fn process_batch(&self, files: Vec<FileSubmission>) -> Result<BatchSummary> {
        let handle = self.orchestrator.submit(CLI_CALLER, files)?;

        let canceller = handle.canceller();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("🛑 收到中断信号，正在取消批次...");
                canceller.cancel();
            }
        });

        let summary = handle.wait().await;
        interrupt.abort();

        Ok(summary?)
    }
}

fn print_final_stats(summary: &BatchSummary, report_path: &Path) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 通过: {}/{}", summary.counts.valid, summary.counts.total());
    info!("⚠️ 待复核: {}", summary.counts.needs_review);
    info!("❌ 失败: {}", summary.counts.failed);
    if summary.cancelled {
        info!("🛑 批次已被取消");
    }

    for outcome in &summary.outcomes {
        match (outcome.state(), &outcome.failure_reason, &outcome.issues) {
            (OutcomeState::Failed, Some(reason), _) => {
                info!("   ❌ {}: {} ({})", outcome.file_name, reason.kind, reason.message)
            }
            (OutcomeState::NeedsReview, _, Some(issues)) => {
                let kinds: Vec<&str> = issues.iter().map(|i| i.kind.as_str()).collect();
                info!("   ⚠️ {}: {}", outcome.file_name, kinds.join(", "))
            }
            _ => {}
        }
    }

    info!("{}", "=".repeat(60));
    info!("\n报告已保存至: {}", report_path.display());
}
