use crate::config::Config;
use crate::error::ServiceError;
use crate::metrics;
use crate::providers::FailoverSelector;
use crate::routing::{build_envelope, KeywordRouter};
use crate::services::ServiceClient;
use crate::types::{RequestEnvelope, ResponseEnvelope, ServiceTarget};
use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// 请求入口：关键词路由 + provider 故障转移 + 下游服务调用
pub struct Agent {
    router: KeywordRouter,
    selector: FailoverSelector,
    services: ServiceClient,
}

impl Agent {
    pub fn new(config: &Config) -> Self {
        Self {
            router: KeywordRouter::new(&config.routing.rules),
            selector: FailoverSelector::from_config(config),
            services: ServiceClient::new(config.services.clone()),
        }
    }

    pub fn router(&self) -> &KeywordRouter {
        &self.router
    }

    pub fn selector(&self) -> &FailoverSelector {
        &self.selector
    }

    /// 按关键词路由后处理消息
    pub async fn process(&self, message: &str) -> ResponseEnvelope {
        let envelope = self.router.envelope(message, self.services.config());
        self.handle(envelope).await
    }

    /// 直接走 assistant
    pub async fn chat(&self, message: &str) -> ResponseEnvelope {
        let envelope = build_envelope(message, ServiceTarget::Assistant, self.services.config());
        self.handle(envelope).await
    }

    async fn handle(&self, envelope: RequestEnvelope) -> ResponseEnvelope {
        let span = info_span!("request", id = %Uuid::new_v4(), service = %envelope.target);
        async move {
            info!("处理请求");
            let response = match envelope.target {
                ServiceTarget::Assistant => self.assistant(&envelope).await,
                target => match self.services.call(&envelope).await {
                    Ok(result) => ResponseEnvelope::success(target, result),
                    Err(e) => ResponseEnvelope::failure(target, e),
                },
            };

            let metrics = metrics::global_metrics();
            match response.error() {
                None => metrics.record_success(),
                Some(e) => {
                    metrics.record_failure();
                    warn!("请求失败: {}", e);
                }
            }
            response
        }
        .instrument(span)
        .await
    }

    /// 有 provider 时走故障转移；没有 provider 但配置了 assistant 服务时直接调用它
    async fn assistant(&self, envelope: &RequestEnvelope) -> ResponseEnvelope {
        let target = ServiceTarget::Assistant;

        if self.selector.is_empty() {
            if self.services.config().base_url(target).is_some() {
                return match self.services.call(envelope).await {
                    Ok(result) => ResponseEnvelope::success(target, result),
                    Err(e) => ResponseEnvelope::failure(target, e),
                };
            }
            return ResponseEnvelope::failure(
                target,
                ServiceError::exhausted("没有配置任何 provider，也没有设置 ASSISTANT_URL"),
            );
        }

        match self.selector.dispatch(&envelope.message).await {
            Ok(reply) => ResponseEnvelope::success(
                target,
                json!({
                    "message": reply.message,
                    "model": reply.model,
                    "usage": reply.usage,
                }),
            )
            .with_provider(reply.provider),
            Err(e) => ResponseEnvelope::failure(target, e),
        }
    }
}
