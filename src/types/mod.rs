use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// 请求的目标服务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTarget {
    Assistant,
    Game,
    Image,
    Music,
    Speech,
    Video,
}

impl ServiceTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceTarget::Assistant => "assistant",
            ServiceTarget::Game => "game",
            ServiceTarget::Image => "image",
            ServiceTarget::Music => "music",
            ServiceTarget::Speech => "speech",
            ServiceTarget::Video => "video",
        }
    }

    /// 下游服务的固定路径
    pub fn path(&self) -> &'static str {
        match self {
            ServiceTarget::Assistant => "/chat",
            ServiceTarget::Game => "/generate-game",
            ServiceTarget::Image => "/generate-image",
            ServiceTarget::Music => "/generate-music",
            ServiceTarget::Speech => "/generate-speech",
            ServiceTarget::Video => "/generate-video",
        }
    }
}

impl fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从用户消息中提取的参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestParams {
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_preset: Option<String>,
}

/// 单次请求的信封，响应后即丢弃
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub message: String,
    pub params: RequestParams,
    pub target: ServiceTarget,
}

/// 服务结果：成功时透传下游 JSON，失败时为结构化错误
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServiceResult {
    Failure { error: ServiceError },
    Success(Value),
}

/// 返回给调用方的响应信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub service: ServiceTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub result: ServiceResult,
}

impl ResponseEnvelope {
    pub fn success(service: ServiceTarget, result: Value) -> Self {
        Self {
            service,
            provider: None,
            result: ServiceResult::Success(result),
        }
    }

    pub fn failure(service: ServiceTarget, error: ServiceError) -> Self {
        Self {
            service,
            provider: error.provider.clone(),
            result: ServiceResult::Failure { error },
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn error(&self) -> Option<&ServiceError> {
        match &self.result {
            ServiceResult::Failure { error } => Some(error),
            ServiceResult::Success(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error().is_none()
    }
}

/// `/process` 与 `/chat` 的请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub message: String,
}

impl MessageRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.message.trim().is_empty() {
            return Err("请求体缺少 'message' 字段".to_string());
        }
        Ok(())
    }
}

/// OpenAI 兼容的聊天请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// 聊天消息
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    /// 创建用户消息
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    /// 创建系统消息
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// OpenAI 兼容的聊天响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl ChatResponse {
    /// 第一个候选回复的文本
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

/// 响应选择
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: Option<String>,
}

/// Token 使用统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// 故障转移成功后的聊天回复
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReply {
    pub provider: String,
    pub message: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_service_target_paths() {
        assert_eq!(ServiceTarget::Game.path(), "/generate-game");
        assert_eq!(ServiceTarget::Image.path(), "/generate-image");
        assert_eq!(ServiceTarget::Music.path(), "/generate-music");
        assert_eq!(ServiceTarget::Speech.path(), "/generate-speech");
        assert_eq!(ServiceTarget::Video.path(), "/generate-video");
        assert_eq!(ServiceTarget::Assistant.path(), "/chat");
    }

    #[test]
    fn test_service_target_serde() {
        let json = serde_json::to_string(&ServiceTarget::Speech).unwrap();
        assert_eq!(json, "\"speech\"");
        let target: ServiceTarget = serde_json::from_str("\"video\"").unwrap();
        assert_eq!(target, ServiceTarget::Video);
    }

    #[test]
    fn test_envelope_success_serialization() {
        let env = ResponseEnvelope::success(ServiceTarget::Game, json!({"title": "Space"}));
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["service"], "game");
        assert_eq!(value["result"]["title"], "Space");
        assert!(value.get("provider").is_none());
        assert!(env.is_success());
    }

    #[test]
    fn test_envelope_failure_carries_provider() {
        let err = ServiceError::timeout("超时").with_provider("together");
        let env = ResponseEnvelope::failure(ServiceTarget::Assistant, err);
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["provider"], "together");
        assert_eq!(value["result"]["error"]["kind"], "timeout");
        assert_eq!(env.error().unwrap().kind, ErrorKind::Timeout);
    }

    #[test]
    fn test_message_request_validate() {
        let req: MessageRequest = serde_json::from_str(r#"{"message": "hi"}"#).unwrap();
        assert!(req.validate().is_ok());

        let req: MessageRequest = serde_json::from_str("{}").unwrap();
        assert!(req.validate().is_err());

        let req: MessageRequest = serde_json::from_str(r#"{"message": "   "}"#).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_chat_request_skips_none() {
        let req = ChatRequest {
            model: "llama3-8b-8192".to_string(),
            messages: vec![Message::user("test")],
            temperature: None,
            max_tokens: Some(150),
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"max_tokens\":150"));
        assert!(!json.contains("temperature"));
    }

    #[test]
    fn test_chat_response_content() {
        let json = r#"{
            "id": "chatcmpl-1",
            "model": "llama3",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hi!"},
                "finish_reason": "stop"
            }]
        }"#;
        let resp: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.content(), Some("Hi!"));
        assert!(resp.usage.is_none());
    }
}
