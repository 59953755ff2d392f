use axum::body::Body;
use axum::extract::{Multipart, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use invoice_intake::clients::ExtractionClient;
use invoice_intake::config::Config;
use invoice_intake::error::{BatchRejection, ExtractionError, FailureKind};
use invoice_intake::gateway::{router, serve_on, GatewayState};
use invoice_intake::infrastructure::{
    MemoryTempStore, MockTransport, ReqwestTransport, TempStore, TransportError,
    TransportResponse,
};
use invoice_intake::models::{
    BatchSummary, FileSubmission, IssueKind, MediaPolicy, OutcomeState,
};
use invoice_intake::orchestrator::{BatchHandle, BatchOrchestrator};
use serde_json::{json, Value as JsonValue};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

// ========== 辅助函数 ==========

fn invoice(subtotal: f64) -> JsonValue {
    json!({
        "vendor": "Acme",
        "invoiceDate": "2025-01-01",
        "dueDate": "2025-01-30",
        "invoiceNumber": "INV001",
        "lineItems": [{"quantity": 2, "unitPrice": 5, "amount": 10}],
        "subtotal": subtotal,
        "tax": 1,
        "totalAmount": 11
    })
}

fn ok_body(body: JsonValue) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status: 200,
        body: body.to_string(),
    })
}

fn pdf(name: &str) -> FileSubmission {
    FileSubmission::new(name, "application/pdf", vec![7u8; 2048], 1_700_000_000_000)
}

fn orchestrator_with(mock: &MockTransport, store: Arc<MemoryTempStore>) -> BatchOrchestrator {
    let config = Config::default();
    let client = ExtractionClient::new(
        Arc::new(mock.clone()),
        store,
        MediaPolicy::default(),
        config.max_file_size_bytes,
        Duration::from_secs(5),
    );
    BatchOrchestrator::new(client, &config)
}

fn orchestrator(mock: &MockTransport) -> BatchOrchestrator {
    orchestrator_with(mock, Arc::new(MemoryTempStore::new()))
}

/// 等待批次快照满足条件
async fn wait_until<F>(handle: &BatchHandle, predicate: F) -> BatchSummary
where
    F: Fn(&BatchSummary) -> bool,
{
    let mut progress = handle.progress();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let summary = progress.borrow_and_update();
                if predicate(&*summary) {
                    return summary.clone();
                }
            }
            progress.changed().await.expect("进度通道提前关闭");
        }
    })
    .await
    .expect("等待批次进度超时")
}

// ========== 具体场景 ==========

#[tokio::test]
async fn test_scenario_a_consistent_invoice_is_valid() {
    let mock = MockTransport::new();
    mock.add_json("a.pdf", invoice(10.0));
    let orchestrator = orchestrator(&mock);

    let summary = orchestrator
        .submit("ui", vec![pdf("a.pdf")])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(summary.is_completed());
    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.state(), OutcomeState::Valid);
    assert_eq!(outcome.issues.as_deref(), Some(&[][..]));
    assert_eq!(mock.calls()[0].size, 2048);
}

#[tokio::test]
async fn test_scenario_b_subtotal_mismatch_needs_review() {
    let mock = MockTransport::new();
    mock.add_json("b.pdf", invoice(50.0));
    let orchestrator = orchestrator(&mock);

    let summary = orchestrator
        .submit("ui", vec![pdf("b.pdf")])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.state(), OutcomeState::NeedsReview);
    assert!(outcome.result.is_some());
    assert!(outcome
        .issues
        .as_ref()
        .unwrap()
        .iter()
        .any(|issue| issue.kind == IssueKind::SubtotalMismatch));
    assert_eq!(summary.counts.needs_review, 1);
}

#[tokio::test]
async fn test_scenario_c_zip_is_rejected_without_upstream_call() {
    let mock = MockTransport::new();
    let orchestrator = orchestrator(&mock);

    let archive = FileSubmission::new("c.zip", "application/zip", vec![1; 512], 0);
    let summary = orchestrator
        .submit("ui", vec![archive])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let outcome = &summary.outcomes[0];
    assert_eq!(outcome.state(), OutcomeState::Failed);
    assert_eq!(
        outcome.failure_reason.as_ref().unwrap().kind,
        FailureKind::UnsupportedMediaType
    );
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_scenario_d_unavailable_file_does_not_affect_siblings() {
    let mock = MockTransport::new();
    mock.add_json("1.pdf", invoice(10.0));
    mock.add_response("2.pdf", Err(TransportError::Connect("connection refused".into())));
    mock.add_json("3.pdf", invoice(50.0));
    let orchestrator = orchestrator(&mock);

    let summary = orchestrator
        .submit("ui", vec![pdf("1.pdf"), pdf("2.pdf"), pdf("3.pdf")])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert_eq!(summary.outcomes.len(), 3);
    let names: Vec<_> = summary.outcomes.iter().map(|o| o.file_name.as_str()).collect();
    assert_eq!(names, vec!["1.pdf", "2.pdf", "3.pdf"]);

    assert_eq!(summary.outcomes[0].state(), OutcomeState::Valid);
    assert_eq!(summary.outcomes[1].state(), OutcomeState::Failed);
    assert_eq!(
        summary.outcomes[1].failure_reason.as_ref().unwrap().kind,
        FailureKind::UpstreamUnavailable
    );
    assert_eq!(summary.outcomes[2].state(), OutcomeState::NeedsReview);
}

// ========== 批次隔离 ==========

#[tokio::test]
async fn test_batch_isolation_exactly_one_failure() {
    let mock = MockTransport::new();
    let mut files = Vec::new();
    for i in 0..6 {
        let name = format!("{}.pdf", i);
        if i == 3 {
            files.push(FileSubmission::new("3.gif", "image/gif", vec![1; 64], 0));
        } else {
            mock.add_json(&name, invoice(10.0));
            files.push(pdf(&name));
        }
    }
    let orchestrator = orchestrator(&mock);

    let summary = orchestrator.submit("ui", files).unwrap().wait().await.unwrap();

    let failed: Vec<_> = summary
        .outcomes
        .iter()
        .filter(|o| o.state() == OutcomeState::Failed)
        .map(|o| o.file_name.as_str())
        .collect();
    assert_eq!(failed, vec!["3.gif"]);
    assert_eq!(summary.counts.valid, 5);
    assert_eq!(summary.counts.total(), 6);
}

#[tokio::test]
async fn test_panicked_file_task_still_settles() {
    let mock = MockTransport::new();
    mock.add_json("a.pdf", invoice(10.0));
    mock.add_panic("b.pdf", "模拟传输崩溃");
    let store = Arc::new(MemoryTempStore::new());
    let orchestrator = orchestrator_with(&mock, store.clone());

    let summary = orchestrator
        .submit("ui", vec![pdf("a.pdf"), pdf("b.pdf")])
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(summary.is_completed());
    assert_eq!(summary.outcomes[0].state(), OutcomeState::Valid);
    let crashed = &summary.outcomes[1];
    assert_eq!(crashed.state(), OutcomeState::Failed);
    let reason = crashed.failure_reason.as_ref().unwrap();
    assert_eq!(reason.kind, FailureKind::Cancelled);
    assert_eq!(reason.message, "文件任务异常终止");

    assert_eq!(store.live_handles(), 0);
    assert_eq!(orchestrator.in_flight("ui"), 0);
}

#[tokio::test]
async fn test_slow_file_does_not_block_others() {
    let mock = MockTransport::new();
    let trigger = mock.add_response_with_trigger("slow.pdf", ok_body(invoice(10.0)));
    mock.add_json("fast.pdf", invoice(10.0));
    let orchestrator = orchestrator(&mock);

    let handle = orchestrator
        .submit("ui", vec![pdf("slow.pdf"), pdf("fast.pdf")])
        .unwrap();

    let snapshot = wait_until(&handle, |s| s.outcomes[1].is_terminal()).await;
    assert_eq!(snapshot.outcomes[1].state(), OutcomeState::Valid);
    assert!(!snapshot.outcomes[0].is_terminal());
    assert!(!snapshot.is_completed());

    trigger.send(()).unwrap();
    let summary = handle.wait().await.unwrap();
    assert_eq!(summary.counts.valid, 2);
}

#[tokio::test]
async fn test_upstream_missing_field_fails_as_malformed() {
    let mock = MockTransport::new();
    let mut body = invoice(10.0);
    body.as_object_mut().unwrap().remove("dueDate");
    mock.add_json("a.pdf", body);
    let orchestrator = orchestrator(&mock);

    let summary = orchestrator
        .submit("ui", vec![pdf("a.pdf")])
        .unwrap()
        .wait()
        .await
        .unwrap();

    let reason = summary.outcomes[0].failure_reason.as_ref().unwrap();
    assert_eq!(reason.kind, FailureKind::UpstreamMalformed);
    assert!(reason.message.contains("dueDate"));
}

// ========== 渐进观察 ==========

#[tokio::test]
async fn test_subscribers_see_every_transition() {
    let mock = MockTransport::new();
    let trigger = mock.add_response_with_trigger("a.pdf", ok_body(invoice(10.0)));
    let orchestrator = orchestrator(&mock);

    let handle = orchestrator.submit("ui", vec![pdf("a.pdf")]).unwrap();
    let mut updates = handle.subscribe();

    // 订阅之后才放行响应，保证订阅者看到 Validating 和 Valid
    trigger.send(()).unwrap();

    let mut states = Vec::new();
    while let Ok(Ok(outcome)) =
        tokio::time::timeout(Duration::from_secs(5), updates.recv()).await
    {
        states.push(outcome.state());
        if outcome.is_terminal() {
            break;
        }
    }

    assert_eq!(states.last(), Some(&OutcomeState::Valid));
    assert!(states.contains(&OutcomeState::Validating));
    assert_ok!(handle.wait().await);
}

// ========== 取消 ==========

#[tokio::test]
async fn test_cancel_preserves_terminal_outcomes() {
    let store = Arc::new(MemoryTempStore::new());
    let mock = MockTransport::new();
    mock.add_json("done.pdf", invoice(10.0));
    let _hold_b = mock.add_response_with_trigger("b.pdf", ok_body(invoice(10.0)));
    let _hold_c = mock.add_response_with_trigger("c.pdf", ok_body(invoice(10.0)));
    let orchestrator = orchestrator_with(&mock, store.clone());

    let handle = orchestrator
        .submit("ui", vec![pdf("done.pdf"), pdf("b.pdf"), pdf("c.pdf")])
        .unwrap();

    wait_until(&handle, |s| {
        s.outcomes[0].is_terminal()
            && s.outcomes[1].state() == OutcomeState::Uploading
            && s.outcomes[2].state() == OutcomeState::Uploading
    })
    .await;

    handle.cancel();
    let summary = handle.wait().await.unwrap();

    assert!(summary.cancelled);
    assert!(summary.is_completed());
    assert_eq!(summary.outcomes[0].state(), OutcomeState::Valid);
    for outcome in &summary.outcomes[1..] {
        assert_eq!(outcome.state(), OutcomeState::Failed);
        assert_eq!(
            outcome.failure_reason.as_ref().unwrap().kind,
            FailureKind::Cancelled
        );
    }

    assert_eq!(store.live_handles(), 0);
    assert_eq!(mock.in_flight_count(), 0);
    assert_eq!(orchestrator.in_flight("ui"), 0);
}

// ========== 准入与背压 ==========

#[tokio::test]
async fn test_second_batch_rejected_while_first_in_flight() {
    let mock = MockTransport::new();
    let trigger = mock.add_response_with_trigger("first.pdf", ok_body(invoice(10.0)));
    mock.add_json("other-caller.pdf", invoice(10.0));
    mock.add_json("after.pdf", invoice(10.0));
    let orchestrator = orchestrator(&mock);

    let first = orchestrator.submit("ui", vec![pdf("first.pdf")]).unwrap();

    let rejected = orchestrator.submit("ui", vec![pdf("second.pdf")]);
    assert!(matches!(
        rejected,
        Err(BatchRejection::BatchInFlight { in_flight: 1, limit: 1, .. })
    ));
    assert_eq!(mock.calls_for("second.pdf"), 0);

    // 背压按调用方计算
    let other = orchestrator
        .submit("api", vec![pdf("other-caller.pdf")])
        .unwrap();
    assert_ok!(other.wait().await);

    trigger.send(()).unwrap();
    assert_ok!(first.wait().await);

    let after = orchestrator.submit("ui", vec![pdf("after.pdf")]);
    assert_ok!(assert_ok!(after).wait().await);
}

#[tokio::test]
async fn test_empty_and_duplicate_batches_are_rejected() {
    let mock = MockTransport::new();
    let orchestrator = orchestrator(&mock);

    assert!(matches!(
        orchestrator.submit("ui", Vec::new()),
        Err(BatchRejection::EmptyBatch)
    ));

    let duplicate = orchestrator.submit("ui", vec![pdf("a.pdf"), pdf("a.pdf")]);
    assert!(matches!(
        duplicate,
        Err(BatchRejection::DuplicateSubmission { .. })
    ));

    let zero = FileSubmission::new("zero.pdf", "application/pdf", Vec::new(), 0);
    assert!(matches!(
        orchestrator.submit("ui", vec![zero]),
        Err(BatchRejection::InvalidSize { .. })
    ));

    // 被拒绝的批次不占用在途名额，也不产生任何调用
    assert_eq!(orchestrator.in_flight("ui"), 0);
    assert_eq!(mock.call_count(), 0);
}

// ========== 网关 ==========

fn gateway_state(upstream: &MockTransport, store: Arc<MemoryTempStore>, max: u64) -> GatewayState {
    GatewayState::new(
        MediaPolicy::default(),
        max,
        Duration::from_secs(5),
        Arc::new(upstream.clone()),
        store,
    )
}

fn multipart_request(file_name: &str, media_type: &str, bytes: &[u8]) -> Request<Body> {
    let boundary = "XINVOICEBOUNDARY";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: {media_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/v1/extract")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn json_of(response: Response) -> JsonValue {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_gateway_health() {
    let upstream = MockTransport::new();
    let app = router(gateway_state(&upstream, Arc::new(MemoryTempStore::new()), 1024));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["upstream"], "mock://extraction");
}

#[tokio::test]
async fn test_gateway_rejects_locally_before_upstream() {
    let upstream = MockTransport::new();
    let store = Arc::new(MemoryTempStore::new());
    let app = router(gateway_state(&upstream, store.clone(), 16));

    let response = app
        .clone()
        .oneshot(multipart_request("a.gif", "image/gif", b"GIF89a"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json_of(response).await["error"], "UnsupportedMediaType");

    let response = app
        .oneshot(multipart_request("big.pdf", "application/pdf", &[0u8; 64]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_of(response).await;
    assert_eq!(body["error"], "PayloadTooLarge");
    assert_eq!(body["size"], 64);

    assert_eq!(upstream.call_count(), 0);
    assert_eq!(store.live_handles(), 0);
}

#[tokio::test]
async fn test_gateway_body_over_limit_is_payload_too_large() {
    let upstream = MockTransport::new();
    let store = Arc::new(MemoryTempStore::new());
    let app = router(gateway_state(&upstream, store.clone(), 1024));

    // 超过 2 × 1024 + 1 MiB 的请求体上限
    let mut request = multipart_request("huge.pdf", "application/pdf", &vec![0u8; 2 * 1024 * 1024]);
    let declared = 2 * 1024 * 1024 + 200;
    request
        .headers_mut()
        .insert("content-length", declared.to_string().parse().unwrap());

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_of(response).await;
    assert_eq!(body["error"], "PayloadTooLarge");
    assert_eq!(body["size"], declared);
    assert_eq!(body["max"], 1024);

    assert_eq!(upstream.call_count(), 0);
    assert_eq!(store.live_handles(), 0);
}

#[tokio::test]
async fn test_gateway_body_over_limit_without_length_header() {
    let upstream = MockTransport::new();
    let app = router(gateway_state(&upstream, Arc::new(MemoryTempStore::new()), 1024));

    let response = app
        .oneshot(multipart_request("huge.pdf", "application/pdf", &vec![0u8; 2 * 1024 * 1024]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    let body = json_of(response).await;
    assert_eq!(body["error"], "PayloadTooLarge");
    assert_eq!(body["size"], 1025);
}

#[tokio::test]
async fn test_gateway_truncated_multipart_is_bad_request() {
    let upstream = MockTransport::new();
    let app = router(gateway_state(&upstream, Arc::new(MemoryTempStore::new()), 1024));

    // 缺少结束边界
    let body = "--XINVOICEBOUNDARY\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.pdf\"\r\nContent-Type: application/pdf\r\n\r\n%PDF-1.4";
    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/extract")
        .header("content-type", "multipart/form-data; boundary=XINVOICEBOUNDARY")
        .body(Body::from(body))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_of(response).await["error"], "InvalidMultipart");
    assert_eq!(upstream.call_count(), 0);
}

#[tokio::test]
async fn test_gateway_forwards_and_normalizes() {
    let upstream = MockTransport::new();
    upstream.add_json("a.png", invoice(10.0));
    upstream.add_response(
        "b.png",
        Ok(TransportResponse {
            status: 500,
            body: json!({"detail": "Error processing invoice"}).to_string(),
        }),
    );
    let store = Arc::new(MemoryTempStore::new());
    let app = router(gateway_state(&upstream, store.clone(), 1024));

    let response = app
        .clone()
        .oneshot(multipart_request("a.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_of(response).await;
    assert_eq!(body["invoiceNumber"], "INV001");
    assert_eq!(body["currency"], "USD");

    let response = app
        .oneshot(multipart_request("b.png", "image/png", b"png"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = json_of(response).await;
    assert_eq!(body["error"], "UpstreamRejected");
    assert_eq!(body["status"], 500);

    assert_eq!(store.live_handles(), 0);
}

// ========== 端到端（真实套接字） ==========

async fn upstream_process(
    State(calls): State<Arc<AtomicUsize>>,
    mut multipart: Multipart,
) -> Response {
    calls.fetch_add(1, Ordering::SeqCst);

    let mut file_name = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            file_name = field.file_name().unwrap_or_default().to_string();
            let _ = field.bytes().await;
        }
    }

    match file_name.as_str() {
        // 上游原始字段名：price / lineTotal，且不返回 currency
        "good.pdf" => Json(json!({
            "vendor": "Acme",
            "invoiceDate": "2025-01-01",
            "dueDate": "2025-01-30",
            "invoiceNumber": "INV001",
            "lineItems": [{"description": "Widget", "quantity": 2, "price": 5, "lineTotal": 10}],
            "subtotal": 10,
            "tax": 1,
            "totalAmount": 11
        }))
        .into_response(),
        "review.png" => Json(invoice(50.0)).into_response(),
        "partial.jpg" => {
            let mut body = invoice(10.0);
            body.as_object_mut().unwrap().remove("tax");
            Json(body).into_response()
        }
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"detail": "Error processing invoice: model error"})),
        )
            .into_response(),
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_end_to_end_through_gateway() {
    let upstream_calls = Arc::new(AtomicUsize::new(0));
    let upstream_addr = spawn(
        Router::new()
            .route("/process", post(upstream_process))
            .with_state(upstream_calls.clone()),
    )
    .await;

    let gateway_store = Arc::new(MemoryTempStore::new());
    let gateway_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let gateway_addr = gateway_listener.local_addr().unwrap();
    let gateway = GatewayState::new(
        MediaPolicy::default(),
        1024,
        Duration::from_secs(5),
        Arc::new(ReqwestTransport::new(format!("http://{}/process", upstream_addr))),
        gateway_store.clone(),
    );
    tokio::spawn(serve_on(gateway_listener, gateway));

    let client_store = Arc::new(MemoryTempStore::new());
    let client = ExtractionClient::new(
        Arc::new(ReqwestTransport::new(format!(
            "http://{}/api/v1/extract",
            gateway_addr
        ))),
        client_store.clone(),
        MediaPolicy::default(),
        10 * 1024 * 1024,
        Duration::from_secs(10),
    );
    let orchestrator = BatchOrchestrator::new(client, &Config::default());

    let files = vec![
        FileSubmission::new("good.pdf", "application/pdf", b"%PDF-1.4 good".to_vec(), 1),
        FileSubmission::new("review.png", "image/png", b"png-bytes".to_vec(), 2),
        FileSubmission::new("partial.jpg", "image/jpeg", b"jpg-bytes".to_vec(), 3),
        FileSubmission::new("broken.pdf", "application/pdf", b"%PDF-1.4 bad".to_vec(), 4),
        FileSubmission::new("huge.pdf", "application/pdf", vec![0u8; 2048], 5),
        FileSubmission::new("archive.zip", "application/zip", b"PK".to_vec(), 6),
    ];

    let summary = orchestrator
        .submit("ui", files)
        .unwrap()
        .wait()
        .await
        .unwrap();

    assert!(summary.is_completed());
    let by_name = |name: &str| {
        summary
            .outcomes
            .iter()
            .find(|o| o.file_name == name)
            .unwrap()
    };

    let good = by_name("good.pdf");
    assert_eq!(good.state(), OutcomeState::Valid);
    let result = good.result.as_ref().unwrap();
    assert_eq!(result.currency.as_deref(), Some("USD"));
    assert_eq!(result.line_items.as_ref().unwrap()[0].unit_price, 5.0);

    assert_eq!(by_name("review.png").state(), OutcomeState::NeedsReview);

    let kind_of = |name: &str| by_name(name).failure_reason.as_ref().unwrap().kind;
    assert_eq!(kind_of("partial.jpg"), FailureKind::UpstreamMalformed);
    assert_eq!(kind_of("broken.pdf"), FailureKind::UpstreamRejected);
    assert_eq!(kind_of("huge.pdf"), FailureKind::PayloadTooLarge);
    assert_eq!(kind_of("archive.zip"), FailureKind::UnsupportedMediaType);
    assert!(by_name("broken.pdf")
        .failure_reason
        .as_ref()
        .unwrap()
        .message
        .contains("model error"));

    // zip 在客户端被拒绝，huge.pdf 在网关被拒绝，都没有到达上游
    assert_eq!(upstream_calls.load(Ordering::SeqCst), 4);
    assert_eq!(gateway_store.live_handles(), 0);
    assert_eq!(client_store.live_handles(), 0);
}

#[tokio::test]
async fn test_unreachable_gateway_is_upstream_unavailable() {
    // 绑定后立即释放端口，保证没有服务在监听
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ExtractionClient::new(
        Arc::new(ReqwestTransport::new(format!("http://{}/api/v1/extract", addr))),
        Arc::new(MemoryTempStore::new()),
        MediaPolicy::default(),
        1024 * 1024,
        Duration::from_secs(5),
    );

    let err = assert_err!(client.extract(&pdf("a.pdf")).await);
    assert!(matches!(err, ExtractionError::UpstreamUnavailable { .. }));
    assert_eq!(client.live_temp_handles(), 0);
}
