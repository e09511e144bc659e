//! 后端REST客户端
//!
//! 统一负责重试、状态码分类、指标记录和列表形状规范化，
//! 具体接口分组见 [`crate::endpoints`]。

use rengen_core::{RengenError, Result};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::endpoints::{
    DashboardApi, DistributionApi, DoctorsApi, SchedulesApi, StudiesApi, StudyTypesApi,
};
use crate::envelope::ListEnvelope;
use crate::metrics::ClientMetrics;
use crate::retry::RetryPolicy;
use crate::transport::{ApiRequest, ReqwestTransport, Transport, TransportConfig};

/// 客户端配置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    pub retry: RetryPolicy,
}

/// 后端REST客户端
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    metrics: Arc<ClientMetrics>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("retry", &self.retry)
            .field("metrics", &self.metrics)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// 使用 reqwest 传输创建客户端
    pub fn new(config: ClientConfig) -> Result<Self> {
        info!("Creating API client for {}", config.transport.base_url);
        let transport = ReqwestTransport::new(config.transport)?;
        Self::with_transport(Arc::new(transport), config.retry)
    }

    /// 使用自定义传输创建客户端
    pub fn with_transport(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            transport,
            retry,
            metrics: Arc::new(ClientMetrics::new()?),
        })
    }

    pub fn metrics(&self) -> &ClientMetrics {
        &self.metrics
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// 发送请求并返回成功响应的JSON
    ///
    /// 非2xx响应转换为 [`RengenError::Server`] 或 [`RengenError::NotFound`]。
    pub async fn send(&self, request: ApiRequest) -> Result<serde_json::Value> {
        let idempotent = request.method.is_read();
        let method = request.method.as_str();
        let path = request.path.clone();

        let result = self
            .retry
            .run(
                idempotent,
                |attempt| {
                    let transport = Arc::clone(&self.transport);
                    let metrics = Arc::clone(&self.metrics);
                    let request = request.clone();
                    async move {
                        debug!("{} {} attempt {}", method, request.path, attempt);
                        let started = Instant::now();
                        let outcome = transport.execute(request).await;
                        metrics.record_attempt(method, started.elapsed());

                        let response = outcome?;
                        if response.is_success() {
                            Ok(response.body)
                        } else {
                            Err(RengenError::from_response(response.status, &response.body))
                        }
                    }
                },
                |_| self.metrics.record_retry(),
            )
            .await;

        if let Err(e) = &result {
            error!("API call {} {} failed: {}", method, path, e);
            self.metrics.record_failure(e);
        }
        result
    }

    /// 发送请求并解析为指定类型
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let body = self.send(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// 发送列表请求，接受裸数组或分页包装
    ///
    /// 只取第一页，后端还有更多页时记录警告。
    pub async fn fetch_list<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<Vec<T>> {
        let path = request.path.clone();
        let body = self.send(request).await?;
        let envelope = ListEnvelope::from_value(body)?;
        let total = envelope.total();
        let truncated = envelope.has_more();
        let items = envelope.into_vec();
        if truncated {
            warn!("{} returned {} of {} items, remaining pages were not fetched", path, items.len(), total);
        } else {
            debug!("{} returned {} items", path, items.len());
        }
        Ok(items)
    }

    pub fn doctors(&self) -> DoctorsApi<'_> {
        DoctorsApi::new(self)
    }

    pub fn study_types(&self) -> StudyTypesApi<'_> {
        StudyTypesApi::new(self)
    }

    pub fn schedules(&self) -> SchedulesApi<'_> {
        SchedulesApi::new(self)
    }

    pub fn studies(&self) -> StudiesApi<'_> {
        StudiesApi::new(self)
    }

    pub fn dashboard(&self) -> DashboardApi<'_> {
        DashboardApi::new(self)
    }

    pub fn distribution(&self) -> DistributionApi<'_> {
        DistributionApi::new(self)
    }
}
