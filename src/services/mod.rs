//! 下游 Mythiq 微服务的一次性调用
//!
//! 每次调用只发送一次 POST，不重试；所有传输与 HTTP 错误都转换为 `ServiceError`。

use crate::config::ServicesConfig;
use crate::error::ServiceError;
use crate::providers::http_client;
use crate::types::{RequestEnvelope, ServiceTarget};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

pub struct ServiceClient {
    config: ServicesConfig,
    client: Client,
}

impl ServiceClient {
    pub fn new(config: ServicesConfig) -> Self {
        Self {
            config,
            client: http_client().clone(),
        }
    }

    pub fn config(&self) -> &ServicesConfig {
        &self.config
    }

    /// 目标服务的完整地址
    pub fn endpoint(&self, target: ServiceTarget) -> Result<String, ServiceError> {
        let base = self.config.base_url(target).ok_or_else(|| {
            ServiceError::unroutable(format!(
                "{} 服务未配置（{} 未设置）",
                target,
                ServicesConfig::env_name(target)
            ))
        })?;
        Ok(format!("{}{}", base.trim_end_matches('/'), target.path()))
    }

    /// 调用信封指定的目标服务
    pub async fn call(&self, envelope: &RequestEnvelope) -> Result<Value, ServiceError> {
        let url = self.endpoint(envelope.target)?;
        let payload = build_payload(envelope);
        debug!("调用 {} -> {}", envelope.target, url);

        let response = self
            .client
            .post(&url)
            .timeout(self.config.timeout())
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!("{} 调用失败: {}", url, e);
                ServiceError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = crate::providers::openai::read_error_body(response).await;
            return Err(ServiceError::http(status.as_u16(), error_message(&body)));
        }

        response.json::<Value>().await.map_err(ServiceError::from)
    }
}

/// 各服务的请求体
pub fn build_payload(envelope: &RequestEnvelope) -> Value {
    let params = &envelope.params;
    match envelope.target {
        ServiceTarget::Assistant => json!({ "message": envelope.message }),
        ServiceTarget::Game | ServiceTarget::Image => json!({ "prompt": params.prompt }),
        ServiceTarget::Music | ServiceTarget::Video => json!({
            "prompt": params.prompt,
            "duration": params.duration,
        }),
        ServiceTarget::Speech => {
            let mut payload = json!({ "text": params.prompt });
            if let Some(preset) = &params.voice_preset {
                payload["voice_preset"] = json!(preset);
            }
            payload
        }
    }
}

/// 优先取错误体中的 message / error 字段
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::routing::build_envelope;

    #[test]
    fn test_build_payload_per_service() {
        let services = ServicesConfig {
            voice_preset: Some("v2/en_speaker_0".to_string()),
            ..ServicesConfig::default()
        };

        let env = build_envelope("a puzzle", ServiceTarget::Game, &services);
        assert_eq!(build_payload(&env), json!({"prompt": "a puzzle"}));

        let env = build_envelope("jazz", ServiceTarget::Music, &services);
        assert_eq!(build_payload(&env), json!({"prompt": "jazz", "duration": 30}));

        let env = build_envelope("waves", ServiceTarget::Video, &services);
        assert_eq!(build_payload(&env), json!({"prompt": "waves", "duration": 10}));

        let env = build_envelope("say hi", ServiceTarget::Speech, &services);
        assert_eq!(
            build_payload(&env),
            json!({"text": "say hi", "voice_preset": "v2/en_speaker_0"})
        );

        let env = build_envelope("hello", ServiceTarget::Assistant, &services);
        assert_eq!(build_payload(&env), json!({"message": "hello"}));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message": "bad prompt"}"#), "bad prompt");
        assert_eq!(error_message(r#"{"error": "quota"}"#), "quota");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[test]
    fn test_endpoint_missing_url_is_unroutable() {
        let client = ServiceClient::new(ServicesConfig::default());
        let err = client.endpoint(ServiceTarget::Game).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unroutable);
        assert!(err.message.contains("GAME_URL"));
    }

    #[test]
    fn test_endpoint_joins_path() {
        let client = ServiceClient::new(ServicesConfig {
            audio_url: Some("http://audio.local/".to_string()),
            ..ServicesConfig::default()
        });
        assert_eq!(
            client.endpoint(ServiceTarget::Music).unwrap(),
            "http://audio.local/generate-music"
        );
        assert_eq!(
            client.endpoint(ServiceTarget::Speech).unwrap(),
            "http://audio.local/generate-speech"
        );
    }
}
