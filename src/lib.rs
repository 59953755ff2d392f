//! # Invoice Intake
//!
//! 发票批量提交、抽取与结果一致性校验
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 只暴露能力，不认识发票字段
//! - `ExtractionTransport` - 一个文件一次 multipart 请求（reqwest / 模拟实现）
//! - `TempStore` - 存入字节得到句柄、释放句柄（临时文件 / 内存）
//!
//! ### ② 业务能力层（Clients / Services）
//! - `clients/` - `ExtractionClient`：媒体类型与大小检查、调用、响应规范化
//! - `services/` - `ResponseValidator`：纯函数一致性校验；`ReportWriter`：写批次报告
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个文件"的完整生命周期
//! - `FileCtx` - 上下文封装（batch_id + index + 取消信号）
//! - `FileFlow` - 流程编排（upload → validate → Valid / NeedsReview / Failed）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_orchestrator` - 批次准入、逐文件并发、渐进观察、取消
//! - `orchestrator/batch_processor` - 批处理应用：扫描目录、提交、写报告
//!
//! ### 网关（Gateway）
//! - `gateway/` - 位于客户端与上游抽取服务之间的 HTTP 转发边界
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod gateway;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::ExtractionClient;
pub use config::Config;
pub use error::{AppError, AppResult, BatchRejection, ExtractionError, FailureKind};
pub use models::{
    BatchSummary, ExtractionResult, FileOutcome, FileSubmission, OutcomeState, ValidationVerdict,
};
pub use orchestrator::{App, BatchHandle, BatchOrchestrator};
pub use services::ResponseValidator;
pub use workflow::{FileCtx, FileFlow};
