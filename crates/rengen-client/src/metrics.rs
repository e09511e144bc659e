//! 客户端请求指标

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use rengen_core::{RengenError, Result};
use std::time::Duration;

/// 客户端指标收集器
#[derive(Clone)]
pub struct ClientMetrics {
    /// Prometheus指标注册表
    registry: Registry,
    /// 按HTTP方法统计的请求次数（每次尝试计一次）
    requests_total: IntCounterVec,
    /// 重试次数
    retries_total: IntCounter,
    /// 按失败类型统计的最终失败次数
    failures_total: IntCounterVec,
    /// 请求延迟直方图
    request_duration: Histogram,
}

impl ClientMetrics {
    /// 创建新的指标收集器
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("rengen_api_requests_total", "Total number of API request attempts"),
            &["method"],
        )
        .map_err(metrics_error)?;

        let retries_total = IntCounter::with_opts(Opts::new(
            "rengen_api_retries_total",
            "Total number of API request retries",
        ))
        .map_err(metrics_error)?;

        let failures_total = IntCounterVec::new(
            Opts::new("rengen_api_failures_total", "Total number of failed API calls"),
            &["kind"],
        )
        .map_err(metrics_error)?;

        let request_duration = Histogram::with_opts(HistogramOpts::new(
            "rengen_api_request_duration_seconds",
            "API request duration in seconds",
        ))
        .map_err(metrics_error)?;

        registry.register(Box::new(requests_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(retries_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(failures_total.clone())).map_err(metrics_error)?;
        registry.register(Box::new(request_duration.clone())).map_err(metrics_error)?;

        Ok(Self {
            registry,
            requests_total,
            retries_total,
            failures_total,
            request_duration,
        })
    }

    pub fn record_attempt(&self, method: &str, elapsed: Duration) {
        self.requests_total.with_label_values(&[method]).inc();
        self.request_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_retry(&self) {
        self.retries_total.inc();
    }

    pub fn record_failure(&self, error: &RengenError) {
        let kind = match error {
            RengenError::Transport(_) => "transport",
            RengenError::Server { .. } | RengenError::NotFound(_) => "server",
            RengenError::Decode(_) => "decode",
            _ => "other",
        };
        self.failures_total.with_label_values(&[kind]).inc();
    }

    pub fn requests(&self, method: &str) -> u64 {
        self.requests_total.with_label_values(&[method]).get()
    }

    pub fn retries(&self) -> u64 {
        self.retries_total.get()
    }

    pub fn failures(&self, kind: &str) -> u64 {
        self.failures_total.with_label_values(&[kind]).get()
    }

    /// 以Prometheus文本格式导出
    pub fn render(&self) -> Result<String> {
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).map_err(metrics_error)?;

        String::from_utf8(buffer).map_err(|e| RengenError::Internal(e.to_string()))
    }
}

impl std::fmt::Debug for ClientMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientMetrics")
            .field("retries_total", &self.retries_total.get())
            .finish_non_exhaustive()
    }
}

fn metrics_error(e: prometheus::Error) -> RengenError {
    RengenError::Internal(format!("metrics error: {}", e))
}
