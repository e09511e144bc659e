//! # Rengen客户端
//!
//! 放射科后端REST接口的类型化客户端：
//! - 可替换的HTTP传输层
//! - 区分读写请求的指数退避重试
//! - 列表响应与医生引用的规范化
//! - 请求指标

pub mod api;
pub mod endpoints;
pub mod envelope;
pub mod metrics;
pub mod retry;
pub mod transport;

pub use api::{ApiClient, ClientConfig};
pub use endpoints::{ScheduleQuery, StudyQuery};
pub use envelope::ListEnvelope;
pub use metrics::ClientMetrics;
pub use retry::RetryPolicy;
pub use transport::{
    ApiRequest, ApiResponse, AuthenticationConfig, Method, ReqwestTransport, Transport,
    TransportConfig,
};
