//! 关键词路由
//!
//! 规则按列表顺序匹配，第一个命中的服务胜出；都未命中时回落到 assistant。
//! 不同服务的关键词重叠时只由列表顺序决定，所以顺序本身就是配置的一部分。

use crate::config::ServicesConfig;
use crate::types::{RequestEnvelope, RequestParams, ServiceTarget};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// 单条路由规则
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RouteRule {
    pub service: ServiceTarget,
    pub keywords: Vec<String>,
}

impl RouteRule {
    pub fn new(service: ServiceTarget, keywords: &[&str]) -> Self {
        Self {
            service,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// 默认规则顺序：game、image、music、speech、video
pub fn default_rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new(
            ServiceTarget::Game,
            &["game", "play", "puzzle", "rpg", "adventure"],
        ),
        RouteRule::new(
            ServiceTarget::Image,
            &["image", "picture", "draw", "art", "visual", "photo"],
        ),
        RouteRule::new(
            ServiceTarget::Music,
            &["music", "song", "melody", "compose", "audio", "sound"],
        ),
        RouteRule::new(
            ServiceTarget::Speech,
            &["speech", "voice", "say", "speak", "text to speech"],
        ),
        RouteRule::new(
            ServiceTarget::Video,
            &["video", "clip", "animate", "animation", "movie", "film"],
        ),
    ]
}

/// 预先分词后的规则
#[derive(Debug, Clone)]
struct CompiledRule {
    service: ServiceTarget,
    keywords: Vec<Vec<String>>,
}

/// 关键词路由器，构建后只读
#[derive(Debug, Clone)]
pub struct KeywordRouter {
    rules: Vec<CompiledRule>,
}

impl Default for KeywordRouter {
    fn default() -> Self {
        Self::new(&default_rules())
    }
}

impl KeywordRouter {
    pub fn new(rules: &[RouteRule]) -> Self {
        let rules = rules
            .iter()
            .map(|rule| CompiledRule {
                service: rule.service,
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| tokenize(k))
                    .filter(|tokens| !tokens.is_empty())
                    .collect(),
            })
            .collect();
        Self { rules }
    }

    /// 为消息选择目标服务
    pub fn route(&self, message: &str) -> ServiceTarget {
        let tokens = tokenize(message);

        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|kw| contains_run(&tokens, kw)))
            .map(|rule| rule.service)
            .unwrap_or(ServiceTarget::Assistant)
    }

    /// 路由并提取参数，生成请求信封
    pub fn envelope(&self, message: &str, services: &ServicesConfig) -> RequestEnvelope {
        build_envelope(message, self.route(message), services)
    }
}

/// 为指定目标生成请求信封
pub fn build_envelope(
    message: &str,
    target: ServiceTarget,
    services: &ServicesConfig,
) -> RequestEnvelope {
    let duration = match target {
        ServiceTarget::Music => Some(extract_duration(message).unwrap_or(services.music_duration)),
        ServiceTarget::Video => Some(extract_duration(message).unwrap_or(services.video_duration)),
        _ => None,
    };
    let voice_preset = match target {
        ServiceTarget::Speech => services.voice_preset.clone(),
        _ => None,
    };

    RequestEnvelope {
        message: message.to_string(),
        params: RequestParams {
            prompt: message.to_string(),
            duration,
            voice_preset,
        },
        target,
    }
}

/// 从文本中提取时长（秒），如 "45 seconds"、"30sec"、"2 minutes"
///
/// 不识别单字母单位（"20s"、"5m"），"the 90s" 不是时长。
pub fn extract_duration(message: &str) -> Option<u32> {
    static DURATION_RE: Lazy<Option<Regex>> = Lazy::new(|| {
        Regex::new(r"(?i)\b(\d{1,4})\s*-?\s*(sec|secs|seconds?|min|mins|minutes?)\b").ok()
    });

    let caps = DURATION_RE.as_ref()?.captures(message)?;
    let value: u32 = caps[1].parse().ok()?;
    let seconds = if caps[2].to_lowercase().starts_with('m') {
        value.checked_mul(60)?
    } else {
        value
    };
    (seconds > 0).then_some(seconds)
}

/// 小写并按非字母数字字符切分
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// `needle` 是否作为连续子序列出现在 `tokens` 中
fn contains_run(tokens: &[String], needle: &[String]) -> bool {
    if needle.is_empty() || needle.len() > tokens.len() {
        return false;
    }
    tokens.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_puzzle_game() {
        let router = KeywordRouter::default();
        assert_eq!(
            router.route("Create a puzzle game about space exploration"),
            ServiceTarget::Game
        );
        assert_eq!(router.route("I want an RPG"), ServiceTarget::Game);
    }

    #[test]
    fn test_route_defaults_to_assistant() {
        let router = KeywordRouter::default();
        assert_eq!(router.route("Hello, how are you?"), ServiceTarget::Assistant);
        assert_eq!(router.route(""), ServiceTarget::Assistant);
    }

    #[test]
    fn test_route_each_service() {
        let router = KeywordRouter::default();
        assert_eq!(router.route("Draw me a cat"), ServiceTarget::Image);
        assert_eq!(router.route("compose a calm melody"), ServiceTarget::Music);
        assert_eq!(router.route("Please SAY good morning"), ServiceTarget::Speech);
        assert_eq!(router.route("make a short movie"), ServiceTarget::Video);
    }

    #[test]
    fn test_route_whole_tokens_only() {
        let router = KeywordRouter::default();
        // "display" 包含 "play"，"party" 包含 "art"，都不应命中
        assert_eq!(router.route("display the party list"), ServiceTarget::Assistant);
    }

    #[test]
    fn test_cross_service_tie_uses_rule_order() {
        let router = KeywordRouter::default();
        assert_eq!(router.route("a video game"), ServiceTarget::Game);
        assert_eq!(router.route("a song with a picture"), ServiceTarget::Image);

        let reordered = KeywordRouter::new(&[
            RouteRule::new(ServiceTarget::Video, &["video"]),
            RouteRule::new(ServiceTarget::Game, &["game"]),
        ]);
        assert_eq!(reordered.route("a video game"), ServiceTarget::Video);
    }

    #[test]
    fn test_multi_word_keyword() {
        let router = KeywordRouter::new(&[RouteRule::new(
            ServiceTarget::Speech,
            &["text to speech"],
        )]);
        assert_eq!(router.route("run text-to-speech on this"), ServiceTarget::Speech);
        assert_eq!(router.route("text me, speech later"), ServiceTarget::Assistant);
    }

    #[test]
    fn test_route_is_deterministic() {
        let router = KeywordRouter::default();
        let msg = "Play a sound while I draw";
        let first = router.route(msg);
        for _ in 0..10 {
            assert_eq!(router.route(msg), first);
        }
    }

    #[test]
    fn test_extract_duration() {
        assert_eq!(extract_duration("a 45 second song"), Some(45));
        assert_eq!(extract_duration("a 20sec clip of rain"), Some(20));
        assert_eq!(extract_duration("2 minutes of jazz"), Some(120));
        assert_eq!(extract_duration("a 5-min video"), Some(300));
        assert_eq!(extract_duration("compose something"), None);
        assert_eq!(extract_duration("0 seconds"), None);
        // 年代和单字母缩写不算时长
        assert_eq!(extract_duration("a song in the style of the 90s"), None);
        assert_eq!(extract_duration("I want 3 m of rope"), None);
    }

    #[test]
    fn test_envelope_params() {
        let services = ServicesConfig {
            voice_preset: Some("v2/en_speaker_0".to_string()),
            ..ServicesConfig::default()
        };
        let router = KeywordRouter::default();

        let env = router.envelope("compose a song", &services);
        assert_eq!(env.target, ServiceTarget::Music);
        assert_eq!(env.params.duration, Some(30));

        let env = router.envelope("write a song in the style of the 90s", &services);
        assert_eq!(env.target, ServiceTarget::Music);
        assert_eq!(env.params.duration, Some(30));

        let env = router.envelope("a 15 second video of waves", &services);
        assert_eq!(env.target, ServiceTarget::Video);
        assert_eq!(env.params.duration, Some(15));

        let env = router.envelope("say hello", &services);
        assert_eq!(env.params.voice_preset.as_deref(), Some("v2/en_speaker_0"));
        assert_eq!(env.params.duration, None);

        let env = router.envelope("Create a puzzle game", &services);
        assert_eq!(env.params.prompt, "Create a puzzle game");
        assert_eq!(env.params.duration, None);
    }
}
