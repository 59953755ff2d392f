//! 在途批次登记
//!
//! 按调用方统计正在处理中的批次数量，实现"每个调用方最多 N 个在途批次"的背压规则。

use crate::error::BatchRejection;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// 在途批次登记表
#[derive(Debug, Clone)]
pub struct InFlightRegistry {
    limit: usize,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl InFlightRegistry {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            counts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// 为调用方占用一个在途名额；已达上限时拒绝
    pub fn try_acquire(&self, caller: &str) -> Result<InFlightSlot, BatchRejection> {
        let mut counts = self.counts.lock();
        let in_flight = counts.get(caller).copied().unwrap_or(0);
        if in_flight >= self.limit {
            return Err(BatchRejection::BatchInFlight {
                caller: caller.to_string(),
                in_flight,
                limit: self.limit,
            });
        }
        counts.insert(caller.to_string(), in_flight + 1);
        debug!("调用方 {} 在途批次: {}", caller, in_flight + 1);

        Ok(InFlightSlot {
            caller: caller.to_string(),
            counts: self.counts.clone(),
        })
    }

    pub fn in_flight(&self, caller: &str) -> usize {
        self.counts.lock().get(caller).copied().unwrap_or(0)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }
}

/// 在途名额，释放时归还
#[derive(Debug)]
pub struct InFlightSlot {
    caller: String,
    counts: Arc<Mutex<HashMap<String, usize>>>,
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        let mut counts = self.counts.lock();
        if let Some(count) = counts.get_mut(&self.caller) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                counts.remove(&self.caller);
            }
        }
    }
}
