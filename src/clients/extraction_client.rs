/// 抽取服务客户端
///
/// 把一个文件提交变成一次抽取调用，返回规范化后的结果或失败类型。
/// 不重试；临时数据在每条路径上都会释放。
use crate::config::Config;
use crate::error::{ConfigError, ExtractionError};
use crate::gateway::normalize::{normalize_response, transport_failure};
use crate::infrastructure::temp_store::{FileTempStore, TempGuard, TempStore};
use crate::infrastructure::transport::{ExtractionTransport, ReqwestTransport, UploadRequest};
use crate::models::invoice::ExtractionResult;
use crate::models::media::MediaPolicy;
use crate::models::submission::FileSubmission;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 抽取服务客户端
#[derive(Clone)]
pub struct ExtractionClient {
    transport: Arc<dyn ExtractionTransport>,
    store: Arc<dyn TempStore>,
    policy: MediaPolicy,
    max_file_size: u64,
    timeout: Duration,
}

impl ExtractionClient {
    pub fn new(
        transport: Arc<dyn ExtractionTransport>,
        store: Arc<dyn TempStore>,
        policy: MediaPolicy,
        max_file_size: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            transport,
            store,
            policy,
            max_file_size,
            timeout,
        }
    }

    /// 按配置创建：请求发往 `extraction_endpoint`
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let store: Arc<dyn TempStore> = match &config.temp_dir {
            Some(dir) => Arc::new(FileTempStore::in_dir(dir)),
            None => Arc::new(FileTempStore::new()),
        };
        Ok(Self::new(
            Arc::new(ReqwestTransport::new(config.extraction_endpoint.clone())),
            store,
            config.media_policy()?,
            config.max_file_size_bytes,
            config.extraction_timeout(),
        ))
    }

    /// 抽取单个文件
    ///
    /// # 参数
    /// - `submission`: 待上传的文件
    ///
    /// # 返回
    /// 八个必填字段齐全的抽取结果；否则返回对应的 `ExtractionError`
    pub async fn extract(
        &self,
        submission: &FileSubmission,
    ) -> Result<ExtractionResult, ExtractionError> {
        let media_type = self.policy.check(&submission.media_type)?;

        let size = submission.effective_size();
        if size > self.max_file_size {
            return Err(ExtractionError::PayloadTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        let staged =
            TempGuard::stage_async(self.store.clone(), submission.content().to_vec()).await?;
        let request = UploadRequest {
            file_name: submission.file_name.clone(),
            media_type: media_type.to_string(),
            bytes: staged.read_async().await?,
        };

        debug!(
            "发送 {} 到 {} (临时句柄 {})",
            submission.file_name,
            self.transport.endpoint(),
            staged.handle().id()
        );

        let response = match tokio::time::timeout(self.timeout, self.transport.send(request)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(transport_failure(e)),
            Err(_) => {
                return Err(ExtractionError::UpstreamUnavailable {
                    reason: format!("抽取服务在 {:?} 内未响应", self.timeout),
                })
            }
        };

        normalize_response(&response)
    }

    /// 当前未释放的临时数据数量
    pub fn live_temp_handles(&self) -> usize {
        self.store.live_handles()
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }
}
