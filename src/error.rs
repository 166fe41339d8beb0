use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// 启动阶段错误（配置、IO、解析）
#[derive(Error, Debug)]
pub enum MythiqError {
    #[error("配置错误: {0}")]
    ConfigError(String),

    #[error("IO 错误: {0}")]
    IoError(#[from] std::io::Error),

    #[error("YAML 解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON 解析错误: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("内部错误: {0}")]
    InternalError(String),
}

impl MythiqError {
    pub fn config(msg: impl Into<String>) -> Self {
        MythiqError::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        MythiqError::InternalError(msg.into())
    }
}

/// 结构化错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    TransportError,
    HttpError,
    AllProvidersExhausted,
    Unroutable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::TransportError => "transport_error",
            ErrorKind::HttpError => "http_error",
            ErrorKind::AllProvidersExhausted => "all_providers_exhausted",
            ErrorKind::Unroutable => "unroutable",
        }
    }

    /// 对外 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::TransportError | ErrorKind::HttpError => StatusCode::BAD_GATEWAY,
            ErrorKind::AllProvidersExhausted | ErrorKind::Unroutable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 下游调用失败时返回给调用方的统一错误结构
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ServiceError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            provider: None,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportError, message)
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::HttpError,
            format!("上游返回状态 {}: {}", status, message.into()),
        )
    }

    pub fn exhausted(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AllProvidersExhausted, message)
    }

    pub fn unroutable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unroutable, message)
    }

    /// 标注出错的 provider
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ServiceError::timeout(format!("请求超时: {}", err))
        } else if err.is_decode() {
            ServiceError::new(ErrorKind::HttpError, format!("响应不是合法 JSON: {}", err))
        } else if let Some(status) = err.status() {
            ServiceError::http(status.as_u16(), err.to_string())
        } else {
            ServiceError::transport(format!("连接失败: {}", err))
        }
    }
}
