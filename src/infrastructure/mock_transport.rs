//! 可编排的模拟传输
//!
//! 按文件名预置响应，记录所有调用，支持"等待触发后再返回"的响应，
//! 用于测试并发、隔离与取消。

use crate::infrastructure::transport::{
    ExtractionTransport, TransportError, TransportResponse, UploadRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

type MockResult = Result<TransportResponse, TransportError>;

enum MockResponse {
    Immediate(MockResult),
    /// 等待触发信号（发送或丢弃 sender）后返回
    Triggered {
        response: MockResult,
        trigger: oneshot::Receiver<()>,
    },
    Delayed {
        response: MockResult,
        delay: Duration,
    },
    /// 调用时 panic，模拟任务异常终止
    Panic(String),
}

/// 一次调用记录
#[derive(Debug, Clone)]
pub struct MockCall {
    pub file_name: String,
    pub media_type: String,
    pub size: usize,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    fallback: Arc<Mutex<Option<MockResult>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    in_flight: Arc<AtomicUsize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个文件名追加一个响应（同名多次按 FIFO 返回）
    pub fn add_response(&self, file_name: &str, response: MockResult) {
        self.push(file_name, MockResponse::Immediate(response));
    }

    /// 追加一个 200 JSON 响应
    pub fn add_json(&self, file_name: &str, body: JsonValue) {
        self.add_response(file_name, Ok(json_response(200, &body)));
    }

    /// 追加一个需要手动触发的响应，返回触发器
    pub fn add_response_with_trigger(
        &self,
        file_name: &str,
        response: MockResult,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.push(
            file_name,
            MockResponse::Triggered {
                response,
                trigger: rx,
            },
        );
        tx
    }

    /// 追加一个延迟返回的响应
    pub fn add_delayed(&self, file_name: &str, delay: Duration, response: MockResult) {
        self.push(file_name, MockResponse::Delayed { response, delay });
    }

    /// 追加一个调用时 panic 的响应
    pub fn add_panic(&self, file_name: &str, message: &str) {
        self.push(file_name, MockResponse::Panic(message.to_string()));
    }

    /// 未预置响应时使用的默认响应
    pub fn set_fallback(&self, response: MockResult) {
        *self.fallback.lock() = Some(response);
    }

    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_for(&self, file_name: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.file_name == file_name)
            .count()
    }

    /// 正在执行中的请求数量（取消后会下降）
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, file_name: &str, response: MockResponse) {
        self.responses
            .lock()
            .entry(file_name.to_string())
            .or_default()
            .push(response);
    }
}

/// 构造 JSON 响应体
pub fn json_response(status: u16, body: &JsonValue) -> TransportResponse {
    TransportResponse {
        status,
        body: body.to_string(),
    }
}

#[async_trait]
impl ExtractionTransport for MockTransport {
    async fn send(&self, request: UploadRequest) -> MockResult {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let _guard = InFlightGuard {
            in_flight: self.in_flight.clone(),
        };

        self.calls.lock().push(MockCall {
            file_name: request.file_name.clone(),
            media_type: request.media_type.clone(),
            size: request.bytes.len(),
        });

        let scripted = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&request.file_name)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        match scripted {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                let _ = trigger.await;
                response
            }
            Some(MockResponse::Delayed { response, delay }) => {
                tokio::time::sleep(delay).await;
                response
            }
            Some(MockResponse::Panic(message)) => panic!("{}", message),
            None => self.fallback.lock().clone().unwrap_or_else(|| {
                Err(TransportError::Request(format!(
                    "没有为 {} 预置模拟响应",
                    request.file_name
                )))
            }),
        }
    }

    fn endpoint(&self) -> &str {
        "mock://extraction"
    }
}

/// 离开作用域时减少在途计数（包括被取消的情况）
struct InFlightGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
