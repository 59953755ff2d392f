//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批次准入、逐文件并发调度和结果汇总，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_orchestrator` - 批次编排器
//! - 批次准入检查（空批次 / 重复提交 / 非正大小 / 在途批次上限）
//! - 每个文件一个独立任务（JoinSet）
//! - 渐进观察（broadcast 单文件更新 + watch 快照）
//! - 汇合点生成最终 BatchSummary
//! - 协作式取消
//!
//! ### `registry` - 在途批次登记
//! - 按调用方统计在途批次，实现背压规则
//!
//! ### `batch_processor` - 批处理应用
//! - 管理应用生命周期（初始化、运行）
//! - 扫描目录并作为一个批次提交
//! - 写出批次报告、输出全局统计
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理一个目录)
//!     ↓
//! batch_orchestrator (处理 Vec<FileSubmission>)
//!     ↓
//! workflow::FileFlow (处理单个 FileSubmission)
//!     ↓
//! clients / services (能力层：extract / validate / report)
//!     ↓
//! infrastructure (基础设施：transport / temp store)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：batch_orchestrator 管批次，FileFlow 管单个文件
//! 2. **所有权隔离**：每个 FileOutcome 只由负责它的任务修改
//! 3. **向下依赖**：编排层 → workflow → services → infrastructure
//! 4. **无业务逻辑**：只做调度和统计，不做具体校验判断

pub mod batch_orchestrator;
pub mod batch_processor;
pub mod registry;

// 重新导出主要类型
pub use batch_orchestrator::{BatchCanceller, BatchHandle, BatchOrchestrator};
pub use batch_processor::App;
pub use registry::{InFlightRegistry, InFlightSlot};
