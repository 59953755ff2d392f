//! 抽取网关 HTTP 服务
//!
//! 职责：
//! - 接收单个文件的 multipart 上传（字段名 `file`）
//! - 在调用上游之前本地检查媒体类型与大小（失败即拒绝，不转发）
//! - 字节经临时存储中转后转发给上游抽取服务
//! - 上游响应规范化后返回；错误响应体与 ExtractionClient 使用同一格式

use crate::config::Config;
use crate::error::{AppResult, ConfigError, ExtractionError, GatewayError};
use crate::gateway::normalize::{error_body, normalize_response, status_for, transport_failure};
use crate::infrastructure::temp_store::{FileTempStore, TempGuard, TempStore};
use crate::infrastructure::transport::{ExtractionTransport, ReqwestTransport, UploadRequest};
use crate::models::invoice::ExtractionResult;
use crate::models::media::{guess_from_extension, MediaPolicy};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// multipart 编码的额外开销
const MULTIPART_OVERHEAD: usize = 1024 * 1024;

/// 网关共享状态
#[derive(Clone)]
pub struct GatewayState {
    policy: MediaPolicy,
    max_file_size: u64,
    timeout: Duration,
    upstream: Arc<dyn ExtractionTransport>,
    store: Arc<dyn TempStore>,
}

impl GatewayState {
    pub fn new(
        policy: MediaPolicy,
        max_file_size: u64,
        timeout: Duration,
        upstream: Arc<dyn ExtractionTransport>,
        store: Arc<dyn TempStore>,
    ) -> Self {
        Self {
            policy,
            max_file_size,
            timeout,
            upstream,
            store,
        }
    }

    /// 按配置构建：上游走 reqwest，临时数据落盘
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let store: Arc<dyn TempStore> = match &config.temp_dir {
            Some(dir) => Arc::new(FileTempStore::in_dir(dir)),
            None => Arc::new(FileTempStore::new()),
        };
        Ok(Self::new(
            config.media_policy()?,
            config.max_file_size_bytes,
            config.extraction_timeout(),
            Arc::new(ReqwestTransport::new(config.upstream_endpoint.clone())),
            store,
        ))
    }

    /// 当前未释放的临时数据数量
    pub fn live_temp_handles(&self) -> usize {
        self.store.live_handles()
    }
}

/// 构建路由
pub fn router(state: GatewayState) -> Router {
    let body_limit = usize::try_from(state.max_file_size.saturating_mul(2))
        .unwrap_or(usize::MAX)
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/api/v1/extract", post(handle_extract))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// 绑定配置中的地址并运行网关，直到进程退出
pub async fn serve(config: &Config) -> AppResult<()> {
    let addr: SocketAddr =
        config
            .gateway_bind
            .parse()
            .map_err(|e: std::net::AddrParseError| GatewayError::InvalidBindAddress {
                addr: config.gateway_bind.clone(),
                reason: e.to_string(),
            })?;
    let state = GatewayState::from_config(config)?;

    let listener = TcpListener::bind(addr).await.map_err(GatewayError::Serve)?;
    info!("🌐 抽取网关已启动: http://{}", addr);
    info!("   上游抽取服务: {}", config.upstream_endpoint);

    serve_on(listener, state).await?;
    Ok(())
}

/// 在已绑定的监听器上运行网关
pub async fn serve_on(listener: TcpListener, state: GatewayState) -> Result<(), GatewayError> {
    axum::serve(listener, router(state))
        .await
        .map_err(GatewayError::Serve)
}

async fn handle_health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "upstream": state.upstream.endpoint(),
    }))
}

async fn handle_extract(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut upload: Option<(String, String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return multipart_failure(&state, &headers, e),
        };
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let media_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| guess_from_extension(extension_of(&file_name)).to_string());

        match field.bytes().await {
            Ok(bytes) => upload = Some((file_name, media_type, bytes.to_vec())),
            Err(e) => return multipart_failure(&state, &headers, e),
        }
    }

    let Some((file_name, media_type, bytes)) = upload else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "MissingFile",
                "detail": "请求中没有名为 file 的文件字段",
            })),
        )
            .into_response();
    };

    match extract(&state, file_name.clone(), &media_type, bytes).await {
        Ok(result) => {
            info!("✅ 网关抽取成功: {}", file_name);
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(err) => {
            warn!("⚠️ 网关抽取失败: {} - {}", file_name, err);
            failure_response(&err)
        }
    }
}

/// 本地检查 → 暂存 → 转发 → 规范化
async fn extract(
    state: &GatewayState,
    file_name: String,
    media_type: &str,
    bytes: Vec<u8>,
) -> Result<ExtractionResult, ExtractionError> {
    let canonical = state.policy.check(media_type)?;

    let size = bytes.len() as u64;
    if size > state.max_file_size {
        return Err(ExtractionError::PayloadTooLarge {
            size,
            max: state.max_file_size,
        });
    }

    let staged = TempGuard::stage_async(state.store.clone(), bytes).await?;

    let request = UploadRequest {
        file_name,
        media_type: canonical.to_string(),
        bytes: staged.read_async().await?,
    };

    let response = match tokio::time::timeout(state.timeout, state.upstream.send(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => return Err(transport_failure(e)),
        Err(_) => {
            return Err(ExtractionError::UpstreamUnavailable {
                reason: format!("上游在 {:?} 内未响应", state.timeout),
            })
        }
    };

    normalize_response(&response)
}

/// multipart 读取失败：超出请求体上限按文件过大处理
fn multipart_failure(
    state: &GatewayState,
    headers: &HeaderMap,
    err: axum::extract::multipart::MultipartError,
) -> Response {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let size = headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(state.max_file_size.saturating_add(1));
        return failure_response(&ExtractionError::PayloadTooLarge {
            size,
            max: state.max_file_size,
        });
    }

    error!("读取上传数据失败: {}", err);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": "InvalidMultipart",
            "detail": err.body_text(),
        })),
    )
        .into_response()
}

fn failure_response(err: &ExtractionError) -> Response {
    (status_for(err), Json(error_body(err))).into_response()
}

fn extension_of(file_name: &str) -> &str {
    file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}
