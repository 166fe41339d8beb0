//! Provider 故障转移
//!
//! 每个聊天请求：按优先级筛选健康的候选，依次串行发送，
//! 失败（超时、连接错误、非 2xx、响应无法解析）就记入健康表并尝试下一个。
//! 总耗时不超过 候选数 × 单次超时。

use crate::config::{Config, FailoverConfig, ProviderConfig};
use crate::error::ServiceError;
use crate::metrics;
use crate::providers::health::HealthTable;
use crate::providers::{http_client, openai};
use crate::types::{ChatReply, ChatRequest, Message};
use reqwest::Client;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct FailoverSelector {
    providers: Vec<ProviderConfig>,
    health: Arc<HealthTable>,
    client: Client,
    request_timeout: Duration,
    rate_limit_cooldown: Duration,
    max_retry_after: Duration,
    max_tokens: u32,
    temperature: f32,
    system_prompt: Option<String>,
}

impl FailoverSelector {
    pub fn new(providers: &[ProviderConfig], failover: &FailoverConfig) -> Self {
        let mut providers = providers.to_vec();
        // 稳定排序，同优先级保持配置顺序
        providers.sort_by_key(|p| p.priority);

        let health = HealthTable::new(
            providers.iter().map(|p| p.name.clone()),
            failover.cooldown(),
            failover.failure_threshold,
        );

        Self {
            providers,
            health: Arc::new(health),
            client: http_client().clone(),
            request_timeout: failover.request_timeout(),
            rate_limit_cooldown: failover.rate_limit_cooldown(),
            max_retry_after: failover.max_retry_after(),
            max_tokens: failover.max_tokens,
            temperature: failover.temperature,
            system_prompt: failover.system_prompt.clone(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.providers, &config.failover)
    }

    pub fn health(&self) -> &Arc<HealthTable> {
        &self.health
    }

    /// 按优先级排好序的全部 provider
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// 当前健康的候选，按优先级升序
    pub fn candidates(&self) -> Vec<&ProviderConfig> {
        self.providers
            .iter()
            .filter(|p| self.health.is_available(&p.name))
            .collect()
    }

    fn build_request(&self, provider: &ProviderConfig, message: &str) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(message));

        ChatRequest {
            model: provider.model.clone(),
            messages,
            temperature: Some(self.temperature),
            max_tokens: Some(self.max_tokens),
        }
    }

    /// 限流后的冷却时长：优先用 Retry-After，但不超过上限
    fn rate_limit_wait(&self, retry_after: Option<Duration>) -> Duration {
        retry_after
            .map(|d| d.min(self.max_retry_after))
            .unwrap_or(self.rate_limit_cooldown)
    }

    /// 发送聊天请求，失败时依次转移到下一个 provider
    pub async fn dispatch(&self, message: &str) -> Result<ChatReply, ServiceError> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            warn!("没有健康的 provider，放弃发送");
            return Err(ServiceError::exhausted("没有健康的 provider 可用"));
        }

        let mut last_error: Option<ServiceError> = None;

        for (attempt, provider) in candidates.iter().enumerate() {
            if attempt > 0 {
                metrics::global_metrics().record_failover();
                info!("转移到 provider {}（第 {} 次尝试）", provider.name, attempt + 1);
            }

            let req = self.build_request(provider, message);
            let started = Instant::now();
            match openai::forward_request(&self.client, provider, &req, self.request_timeout).await
            {
                Ok(response) => {
                    self.health.record_success(&provider.name, started.elapsed());
                    info!("provider {} 响应成功", provider.name);
                    return Ok(ChatReply {
                        provider: provider.name.clone(),
                        message: response.content().unwrap_or_default().to_string(),
                        model: if response.model.is_empty() {
                            provider.model.clone()
                        } else {
                            response.model
                        },
                        usage: response.usage,
                    });
                }
                Err(failure) => {
                    warn!("provider {} 失败: {}", provider.name, failure.error);
                    let cooldown = failure
                        .rate_limited
                        .then(|| self.rate_limit_wait(failure.retry_after));
                    self.health.record_failure_with_cooldown(
                        &provider.name,
                        failure.error.to_string(),
                        cooldown,
                    );
                    last_error = Some(failure.error.with_provider(provider.name.clone()));
                }
            }
        }

        let detail = last_error
            .map(|e| format!("，最后错误来自 {}: {}", e.provider.as_deref().unwrap_or_default(), e))
            .unwrap_or_default();
        Err(ServiceError::exhausted(format!(
            "已尝试 {} 个 provider，全部失败{}",
            candidates.len(),
            detail
        )))
    }

    /// 探测所有 provider 并更新健康表（包括冷却中的）
    pub async fn probe(&self) {
        for provider in &self.providers {
            let started = Instant::now();
            match openai::probe(&self.client, provider, self.request_timeout).await {
                Ok(()) => self.health.record_success(&provider.name, started.elapsed()),
                Err(e) => {
                    warn!("provider {} 健康探测失败: {}", provider.name, e);
                    self.health.record_failure_with_cooldown(
                        &provider.name,
                        e.to_string(),
                        Some(self.health.cooldown()),
                    );
                }
            }
        }
    }
}
