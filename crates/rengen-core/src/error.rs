//! 错误定义模块

use thiserror::Error;

/// 看板客户端统一错误类型
#[derive(Error, Debug)]
pub enum RengenError {
    #[error("配置错误: {0}")]
    Config(String),

    /// 请求未得到任何响应（连接失败、超时）
    #[error("网络错误: {0}")]
    Transport(String),

    /// 服务器返回了非2xx状态码
    #[error("服务器错误 {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Server { status: u16, detail: Option<String> },

    #[error("响应解析错误: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl RengenError {
    /// 从服务器响应构造错误，尽量提取后端给出的说明
    pub fn from_response(status: u16, body: &serde_json::Value) -> Self {
        let detail = ["detail", "error", "message"]
            .iter()
            .find_map(|key| body.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string);

        if status == 404 {
            return Self::NotFound(detail.unwrap_or_else(|| "resource not found".to_string()));
        }

        Self::Server { status, detail }
    }

    /// HTTP状态码（仅服务器错误）
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// 是否为传输层失败（请求可能根本没有到达服务器）
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// 按请求是否幂等判断能否重试
    ///
    /// 幂等读取：传输失败和5xx可以重试。
    /// 修改操作：只有传输失败可以重试，服务器已经响应的一律不重试。
    pub fn is_retryable(&self, idempotent: bool) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Server { status, .. } => idempotent && *status >= 500,
            _ => false,
        }
    }

    /// 阻塞式提示框中展示给用户的文本
    pub fn user_message(&self) -> String {
        match self {
            Self::Server { detail: Some(detail), .. } => detail.clone(),
            Self::Server { status, detail: None } => format!("Request failed with status {}", status),
            Self::Transport(_) => "Server is unreachable, please try again".to_string(),
            Self::Validation(message) => message.clone(),
            Self::NotFound(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// 看板客户端统一结果类型
pub type Result<T> = std::result::Result<T, RengenError>;
