use crate::agent::Agent;
use crate::metrics;
use crate::types::{MessageRequest, ResponseEnvelope};
use chrono::Utc;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type BoxBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

const SERVICE_NAME: &str = "mythiq-agent";

/// 处理 HTTP 请求的主路由
pub async fn handle_request(
    req: Request<hyper::body::Incoming>,
    agent: Arc<Agent>,
) -> Result<Response<BoxBody>, BoxError> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/") => Ok(index()),
        (&Method::GET, "/health") => Ok(health_check(&agent)),
        (&Method::POST, "/health/check") => {
            agent.selector().probe().await;
            Ok(health_check(&agent))
        }
        (&Method::GET, "/metrics") => Ok(metrics_endpoint()),
        (&Method::POST, "/process") => {
            let message = match read_message(req).await {
                Ok(message) => message,
                Err(resp) => return Ok(resp),
            };
            Ok(envelope_response(&agent.process(&message).await))
        }
        (&Method::POST, "/chat") => {
            let message = match read_message(req).await {
                Ok(message) => message,
                Err(resp) => return Ok(resp),
            };
            Ok(envelope_response(&agent.chat(&message).await))
        }
        _ => Ok(not_found()),
    }
}

fn full_body(data: impl Into<Bytes>) -> BoxBody {
    Full::new(data.into())
        .map_err(|e| Box::new(e) as BoxError)
        .boxed()
}

fn response(status: StatusCode, content_type: &'static str, body: impl Into<Bytes>) -> Response<BoxBody> {
    let mut resp = Response::new(full_body(body));
    *resp.status_mut() = status;
    resp.headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    resp
}

fn json_response(status: StatusCode, body: &Value) -> Response<BoxBody> {
    response(status, "application/json", body.to_string())
}

/// 服务说明
fn index() -> Response<BoxBody> {
    let body = "Mythiq Agent API\n\n\
                GET  /              this page\n\
                GET  /health        service and provider health\n\
                POST /health/check  probe providers now\n\
                GET  /metrics       Prometheus metrics\n\
                POST /process       {\"message\": \"Create a puzzle game\"}\n\
                POST /chat          {\"message\": \"Hello, how are you?\"}\n";
    response(StatusCode::OK, "text/plain; charset=utf-8", body)
}

/// 健康检查端点，附带每个 provider 的状态
fn health_check(agent: &Agent) -> Response<BoxBody> {
    let body = json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "providers": agent.selector().health().snapshot(),
        "timestamp": Utc::now(),
    });
    json_response(StatusCode::OK, &body)
}

/// 指标端点
fn metrics_endpoint() -> Response<BoxBody> {
    let body = metrics::global_metrics().export_prometheus();
    response(StatusCode::OK, "text/plain", body)
}

fn bad_request(message: impl Into<String>) -> Response<BoxBody> {
    let body = json!({
        "error": {
            "message": message.into(),
            "type": "invalid_request_error"
        }
    });
    json_response(StatusCode::BAD_REQUEST, &body)
}

/// 读取并校验 `{"message": ...}` 请求体
async fn read_message(req: Request<hyper::body::Incoming>) -> Result<String, Response<BoxBody>> {
    let whole_body = req
        .collect()
        .await
        .map_err(|e| bad_request(format!("读取请求体失败: {}", e)))?
        .to_bytes();

    let msg_req: MessageRequest = serde_json::from_slice(&whole_body)
        .map_err(|e| bad_request(format!("无效的 JSON: {}", e)))?;
    msg_req.validate().map_err(bad_request)?;

    Ok(msg_req.message)
}

/// 信封总是以 JSON 返回；失败时按错误类别给出状态码
fn envelope_response(envelope: &ResponseEnvelope) -> Response<BoxBody> {
    let status = envelope
        .error()
        .map(|e| e.kind.status_code())
        .unwrap_or(StatusCode::OK);
    match serde_json::to_value(envelope) {
        Ok(body) => json_response(status, &body),
        Err(e) => json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({"error": {"message": e.to_string(), "type": "internal_error"}}),
        ),
    }
}

/// 404 响应
fn not_found() -> Response<BoxBody> {
    response(StatusCode::NOT_FOUND, "text/plain", "Not Found")
}
