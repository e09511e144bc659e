//! HTTP传输层
//!
//! 所有请求都经过 [`Transport`]，生产环境使用基于 reqwest 的实现，
//! 测试中可以替换为内存实现。

use async_trait::async_trait;
use rengen_core::{RengenError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// HTTP方法
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    /// 只读请求可以安全重试
    pub fn is_read(&self) -> bool {
        matches!(self, Self::Get)
    }
}

/// 发往后端的请求
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
    pub request_id: Uuid,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            request_id: Uuid::new_v4(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    pub fn query_pairs(mut self, pairs: Vec<(String, String)>) -> Self {
        self.query.extend(pairs);
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }
}

/// 后端响应（任何状态码都会返回，由客户端负责分类）
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 传输层接口
#[async_trait]
pub trait Transport: Send + Sync {
    /// 执行一次请求，不做重试
    ///
    /// 没有收到响应时返回 [`RengenError::Transport`]。
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthenticationConfig {
    #[default]
    None,
    BasicAuth { username: String, password: String },
    ApiKey { key: String, header: Option<String> },
    BearerToken { token: String },
}

/// 传输层配置
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub authentication: AuthenticationConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            timeout: Duration::from_secs(10),
            authentication: AuthenticationConfig::None,
        }
    }
}

/// 基于 reqwest 的传输实现
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl ReqwestTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent("Rengen-Dashboard/0.1")
            .build()
            .map_err(|e| RengenError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// 添加认证头
    fn add_auth_headers(
        request: reqwest::RequestBuilder,
        auth: &AuthenticationConfig,
    ) -> reqwest::RequestBuilder {
        match auth {
            AuthenticationConfig::None => request,
            AuthenticationConfig::BasicAuth { username, password } => {
                request.basic_auth(username, Some(password))
            }
            AuthenticationConfig::ApiKey { key, header } => {
                let header_name = header.as_deref().unwrap_or("X-API-Key");
                request.header(header_name, key)
            }
            AuthenticationConfig::BearerToken { token } => request.bearer_auth(token),
        }
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!("{} {} [{}]", request.method.as_str(), url, request.request_id);

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method), &url)
            .header("Content-Type", "application/json")
            .header("X-Request-Id", request.request_id.to_string());

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let builder = Self::add_auth_headers(builder, &self.config.authentication);

        let response = builder
            .send()
            .await
            .map_err(|e| RengenError::Transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RengenError::Transport(e.to_string()))?;

        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            match serde_json::from_slice(&bytes) {
                Ok(value) => value,
                Err(e) if status.is_success() => return Err(e.into()),
                Err(_) => {
                    warn!("Non-JSON error body from {} ({})", url, status);
                    serde_json::Value::String(String::from_utf8_lossy(&bytes).into_owned())
                }
            }
        };

        Ok(ApiResponse::new(status.as_u16(), body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = ApiRequest::get("/schedules/")
            .query("date_from", "2025-10-13")
            .query("doctor_id", 26);
        assert_eq!(request.method, Method::Get);
        assert_eq!(
            request.query,
            vec![
                ("date_from".to_string(), "2025-10-13".to_string()),
                ("doctor_id".to_string(), "26".to_string()),
            ]
        );
        assert!(request.body.is_none());
    }

    #[test]
    fn test_url_join() {
        let transport = ReqwestTransport::new(TransportConfig {
            base_url: "http://localhost:8000/api/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            transport.url_for("/doctors/with_load/"),
            "http://localhost:8000/api/doctors/with_load/"
        );
    }

    #[test]
    fn test_method_classification() {
        assert!(Method::Get.is_read());
        assert!(!Method::Post.is_read());
        assert!(!Method::Put.is_read());
        assert!(!Method::Delete.is_read());
    }
}
