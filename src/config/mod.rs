use crate::error::MythiqError;
use crate::routing::RouteRule;
use crate::types::ServiceTarget;
use crate::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub failover: FailoverConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

/// 下游微服务地址
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    pub assistant_url: Option<String>,
    pub game_url: Option<String>,
    pub media_url: Option<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    #[serde(default = "default_service_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_music_duration")]
    pub music_duration: u32,
    #[serde(default = "default_video_duration")]
    pub video_duration: u32,
    #[serde(default)]
    pub voice_preset: Option<String>,
}

/// AI 聊天 provider（OpenAI 兼容接口）
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub name: String,
    pub api_key: String,
    #[serde(default)]
    pub api_base: String,
    #[serde(default)]
    pub model: String,
    /// 数值越小优先级越高
    #[serde(default = "default_priority")]
    pub priority: u32,
}

/// 故障转移与健康检查参数
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FailoverConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,
    /// 上游 Retry-After 的上限
    #[serde(default = "default_max_retry_after_secs")]
    pub max_retry_after_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default)]
    pub health_check_interval_secs: Option<u64>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// 关键词路由规则，按列表顺序匹配
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoutingConfig {
    #[serde(default = "crate::routing::default_rules")]
    pub rules: Vec<RouteRule>,
}

fn default_service_timeout_secs() -> u64 {
    30
}

fn default_music_duration() -> u32 {
    30
}

fn default_video_duration() -> u32 {
    10
}

fn default_priority() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_cooldown_secs() -> u64 {
    300
}

fn default_rate_limit_cooldown_secs() -> u64 {
    60
}

fn default_max_retry_after_secs() -> u64 {
    3600
}

fn default_failure_threshold() -> u32 {
    1
}

fn default_max_tokens() -> u32 {
    150
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            cooldown_secs: default_cooldown_secs(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            max_retry_after_secs: default_max_retry_after_secs(),
            failure_threshold: default_failure_threshold(),
            health_check_interval_secs: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            system_prompt: None,
        }
    }
}

impl FailoverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_secs)
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            rules: crate::routing::default_rules(),
        }
    }
}

impl ServicesConfig {
    /// 目标服务对应的基础地址（音乐与语音共用音频服务）
    pub fn base_url(&self, target: ServiceTarget) -> Option<&str> {
        let url = match target {
            ServiceTarget::Assistant => &self.assistant_url,
            ServiceTarget::Game => &self.game_url,
            ServiceTarget::Image => &self.media_url,
            ServiceTarget::Music | ServiceTarget::Speech => &self.audio_url,
            ServiceTarget::Video => &self.video_url,
        };
        url.as_deref().filter(|u| !u.is_empty())
    }

    /// 该服务对应的环境变量名，用于错误提示
    pub fn env_name(target: ServiceTarget) -> &'static str {
        match target {
            ServiceTarget::Assistant => "ASSISTANT_URL",
            ServiceTarget::Game => "GAME_URL",
            ServiceTarget::Image => "MEDIA_URL",
            ServiceTarget::Music | ServiceTarget::Speech => "AUDIO_URL",
            ServiceTarget::Video => "VIDEO_URL",
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            assistant_url: None,
            game_url: None,
            media_url: None,
            audio_url: None,
            video_url: None,
            timeout_secs: default_service_timeout_secs(),
            music_duration: default_music_duration(),
            video_duration: default_video_duration(),
            voice_preset: None,
        }
    }
}

/// 已知 provider 的默认值：(名称, API key 环境变量, 默认地址, 默认模型, 优先级)
type KnownProvider = (&'static str, &'static str, &'static str, &'static str, u32);

static KNOWN_PROVIDERS: [KnownProvider; 5] = [
    (
        "groq",
        "GROQ_API_KEY",
        "https://api.groq.com/openai/v1",
        "llama3-8b-8192",
        1,
    ),
    (
        "openrouter",
        "OPENROUTER_API_KEY",
        "https://openrouter.ai/api/v1",
        "meta-llama/llama-3.1-8b-instruct:free",
        2,
    ),
    (
        "together",
        "TOGETHER_API_KEY",
        "https://api.together.xyz/v1",
        "meta-llama/Llama-2-7b-chat-hf",
        3,
    ),
    (
        "fireworks",
        "FIREWORKS_API_KEY",
        "https://api.fireworks.ai/inference/v1",
        "accounts/fireworks/models/llama-v2-7b-chat",
        4,
    ),
    (
        "cerebras",
        "CEREBRAS_API_KEY",
        "https://api.cerebras.ai/v1",
        "llama3.1-8b",
        5,
    ),
];

fn known_provider(name: &str) -> Option<&'static KnownProvider> {
    KNOWN_PROVIDERS.iter().find(|p| p.0 == name)
}

impl Config {
    /// 从 YAML 文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let content = Self::replace_env_vars(&content)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_provider_defaults();
        config.validate()?;
        Ok(config)
    }

    /// 仅从环境变量构建配置；未设置 API key 的 provider 会被跳过
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        let mut config = Config {
            services: ServicesConfig {
                assistant_url: var("ASSISTANT_URL"),
                game_url: var("GAME_URL"),
                media_url: var("MEDIA_URL"),
                audio_url: var("AUDIO_URL"),
                video_url: var("VIDEO_URL"),
                ..ServicesConfig::default()
            },
            ..Config::default()
        };

        for (name, key_env, api_base, model, priority) in KNOWN_PROVIDERS {
            if let Some(api_key) = var(key_env) {
                config.providers.push(ProviderConfig {
                    name: name.to_string(),
                    api_key,
                    api_base: api_base.to_string(),
                    model: model.to_string(),
                    priority,
                });
            }
        }

        if let Some(v) = var("SERVICE_TIMEOUT_SECS") {
            config.services.timeout_secs = parse_secs("SERVICE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("PROVIDER_TIMEOUT_SECS") {
            config.failover.request_timeout_secs = parse_secs("PROVIDER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("PROVIDER_COOLDOWN_SECS") {
            config.failover.cooldown_secs = parse_secs("PROVIDER_COOLDOWN_SECS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 替换配置中的环境变量 ${VAR}
    fn replace_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| MythiqError::internal(e.to_string()))?;
        let mut result = content.to_string();

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let var_value = std::env::var(var_name).map_err(|_| {
                MythiqError::config(format!("环境变量未找到: {}", var_name))
            })?;
            result = result.replace(&cap[0], &var_value);
        }

        Ok(result)
    }

    /// 为已知 provider 补全缺省的地址与模型
    fn apply_provider_defaults(&mut self) {
        for provider in &mut self.providers {
            if let Some((_, _, api_base, model, _)) = known_provider(&provider.name) {
                if provider.api_base.is_empty() {
                    provider.api_base = api_base.to_string();
                }
                if provider.model.is_empty() {
                    provider.model = model.to_string();
                }
            }
        }
    }

    /// 验证配置
    fn validate(&self) -> Result<()> {
        for (i, provider) in self.providers.iter().enumerate() {
            if provider.name.is_empty() {
                return Err(MythiqError::config("provider name 不能为空"));
            }
            if provider.api_key.is_empty() {
                return Err(MythiqError::config(format!(
                    "provider {} 的 api_key 不能为空",
                    provider.name
                )));
            }
            if provider.api_base.is_empty() {
                return Err(MythiqError::config(format!(
                    "provider {} 缺少 api_base",
                    provider.name
                )));
            }
            if provider.model.is_empty() {
                return Err(MythiqError::config(format!(
                    "provider {} 缺少 model",
                    provider.name
                )));
            }
            if self.providers[..i].iter().any(|p| p.name == provider.name) {
                return Err(MythiqError::config(format!(
                    "provider 名称重复: {}",
                    provider.name
                )));
            }
        }

        if self.failover.request_timeout_secs == 0 {
            return Err(MythiqError::config("request_timeout_secs 必须大于 0"));
        }
        if self.failover.failure_threshold == 0 {
            return Err(MythiqError::config("failure_threshold 必须大于 0"));
        }
        if self.services.timeout_secs == 0 {
            return Err(MythiqError::config("services.timeout_secs 必须大于 0"));
        }

        for rule in &self.routing.rules {
            if rule.service == ServiceTarget::Assistant {
                return Err(MythiqError::config(
                    "assistant 是默认目标，不能作为路由规则",
                ));
            }
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(MythiqError::config(format!(
                    "路由规则 {} 没有关键词",
                    rule.service
                )));
            }
        }

        Ok(())
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse()
        .map_err(|_| MythiqError::config(format!("{} 不是合法的秒数: {}", name, value)))
}
