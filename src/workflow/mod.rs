pub mod file_ctx;
pub mod file_flow;

pub use file_ctx::{CancelSignal, FileCtx, OutcomeUpdate, UpdateSender};
pub use file_flow::FileFlow;
