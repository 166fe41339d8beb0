use crate::config::ProviderConfig;
use crate::error::ServiceError;
use crate::types::{ChatRequest, ChatResponse};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

/// 单次转发失败
#[derive(Debug, Clone)]
pub struct ForwardFailure {
    pub error: ServiceError,
    pub rate_limited: bool,
    /// 上游给出的 Retry-After
    pub retry_after: Option<Duration>,
}

impl From<ServiceError> for ForwardFailure {
    fn from(error: ServiceError) -> Self {
        Self {
            error,
            rate_limited: false,
            retry_after: None,
        }
    }
}

impl From<reqwest::Error> for ForwardFailure {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::from(err).into()
    }
}

fn endpoint(provider: &ProviderConfig, path: &str) -> String {
    format!("{}{}", provider.api_base.trim_end_matches('/'), path)
}

/// 转发聊天请求到 OpenAI 兼容的 provider（Groq、OpenRouter、Together 等）
pub async fn forward_request(
    client: &Client,
    provider: &ProviderConfig,
    req: &ChatRequest,
    timeout: Duration,
) -> Result<ChatResponse, ForwardFailure> {
    let url = endpoint(provider, "/chat/completions");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .header("Content-Type", "application/json")
        .timeout(timeout)
        .json(req)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let rate_limited = status == StatusCode::TOO_MANY_REQUESTS;
        let retry_after = retry_after(&response);
        let error_body = read_error_body(response).await;
        return Err(ForwardFailure {
            error: ServiceError::http(status.as_u16(), error_body),
            rate_limited,
            retry_after,
        });
    }

    let chat_response: ChatResponse = response.json().await?;
    if chat_response.choices.is_empty() {
        return Err(ServiceError::http(status.as_u16(), "响应中没有 choices").into());
    }
    Ok(chat_response)
}

/// 轻量健康探测：GET {api_base}/models
pub async fn probe(
    client: &Client,
    provider: &ProviderConfig,
    timeout: Duration,
) -> Result<(), ServiceError> {
    let url = endpoint(provider, "/models");

    let response = client
        .get(&url)
        .header("Authorization", format!("Bearer {}", provider.api_key))
        .timeout(timeout)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_body = read_error_body(response).await;
        return Err(ServiceError::http(status.as_u16(), error_body));
    }
    Ok(())
}

fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

const MAX_ERROR_BODY: usize = 4096;

/// 读取错误响应体，最多读 4096 字节，其余部分不再接收
pub(crate) async fn read_error_body(mut response: Response) -> String {
    let mut buf = Vec::new();
    while buf.len() < MAX_ERROR_BODY {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            _ => break,
        }
    }
    buf.truncate(MAX_ERROR_BODY);
    String::from_utf8_lossy(&buf).into_owned()
}
