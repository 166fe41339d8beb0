//! Provider 健康表
//!
//! 进程内共享，读写锁保护；任何锁都不会跨 await 持有。

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// 单个 provider 的健康状态
#[derive(Debug, Clone)]
pub struct ProviderHealth {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub success_count: u64,
    pub error_count: u64,
    pub unhealthy_until: Option<Instant>,
    pub last_check: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// 成功调用耗时的滑动平均
    pub response_time: Option<Duration>,
}

impl Default for ProviderHealth {
    fn default() -> Self {
        Self {
            healthy: true,
            consecutive_failures: 0,
            success_count: 0,
            error_count: 0,
            unhealthy_until: None,
            last_check: None,
            last_error: None,
            response_time: None,
        }
    }
}

impl ProviderHealth {
    pub fn success_rate(&self) -> f64 {
        let total = self.success_count + self.error_count;
        if total == 0 {
            1.0
        } else {
            self.success_count as f64 / total as f64
        }
    }

    fn observe_response_time(&mut self, elapsed: Duration) {
        self.response_time = Some(match self.response_time {
            Some(avg) => (avg + elapsed) / 2,
            None => elapsed,
        });
    }
}

/// `/health` 输出用的快照
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub success_rate: f64,
    /// 平均响应时间（秒）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// 所有 provider 的健康表
#[derive(Debug)]
pub struct HealthTable {
    entries: RwLock<HashMap<String, ProviderHealth>>,
    cooldown: Duration,
    failure_threshold: u32,
}

impl HealthTable {
    pub fn new<I, S>(names: I, cooldown: Duration, failure_threshold: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .map(|n| (n.into(), ProviderHealth::default()))
            .collect();
        Self {
            entries: RwLock::new(entries),
            cooldown,
            failure_threshold: failure_threshold.max(1),
        }
    }

    /// provider 当前是否可用；冷却期已过的 provider 会在这里被恢复
    pub fn is_available(&self, name: &str) -> bool {
        self.is_available_at(name, Instant::now())
    }

    pub fn is_available_at(&self, name: &str, now: Instant) -> bool {
        {
            let entries = self.entries.read();
            match entries.get(name) {
                None => return false,
                Some(h) if h.healthy => return true,
                Some(h) => match h.unhealthy_until {
                    Some(until) if now >= until => {}
                    _ => return false,
                },
            }
        }

        let mut entries = self.entries.write();
        match entries.get_mut(name) {
            Some(h) if h.healthy => true,
            Some(h) if h.unhealthy_until.is_some_and(|until| now >= until) => {
                info!("provider {} 冷却结束，重新可用", name);
                h.healthy = true;
                h.consecutive_failures = 0;
                h.unhealthy_until = None;
                true
            }
            _ => false,
        }
    }

    /// 记录一次成功调用及其耗时
    pub fn record_success(&self, name: &str, elapsed: Duration) {
        let mut entries = self.entries.write();
        if let Some(h) = entries.get_mut(name) {
            if !h.healthy {
                info!("provider {} 恢复健康", name);
            }
            h.healthy = true;
            h.consecutive_failures = 0;
            h.success_count += 1;
            h.observe_response_time(elapsed);
            h.unhealthy_until = None;
            h.last_check = Some(Utc::now());
            h.last_error = None;
        }
    }

    /// 记录一次失败；连续失败达到阈值后进入冷却
    pub fn record_failure(&self, name: &str, error: impl Into<String>) {
        self.record_failure_with_cooldown(name, error, None);
    }

    /// 记录一次失败并指定冷却时长（限流时使用）；指定时长会立即标记为不健康
    pub fn record_failure_with_cooldown(
        &self,
        name: &str,
        error: impl Into<String>,
        cooldown: Option<Duration>,
    ) {
        let mut entries = self.entries.write();
        let Some(h) = entries.get_mut(name) else {
            return;
        };

        h.consecutive_failures += 1;
        h.error_count += 1;
        h.last_check = Some(Utc::now());
        h.last_error = Some(error.into());

        if cooldown.is_some() || h.consecutive_failures >= self.failure_threshold {
            let wait = cooldown.unwrap_or(self.cooldown);
            warn!(
                "provider {} 标记为不健康，冷却 {}s（连续失败 {} 次）",
                name,
                wait.as_secs(),
                h.consecutive_failures
            );
            h.healthy = false;
            // 溢出时退回默认冷却；仍然溢出则立即允许重试
            let now = Instant::now();
            h.unhealthy_until = Some(
                now.checked_add(wait)
                    .or_else(|| now.checked_add(self.cooldown))
                    .unwrap_or(now),
            );
        } else {
            debug!(
                "provider {} 失败 {}/{}",
                name, h.consecutive_failures, self.failure_threshold
            );
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn get(&self, name: &str) -> Option<ProviderHealth> {
        self.entries.read().get(name).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, HealthSnapshot> {
        self.entries
            .read()
            .iter()
            .map(|(name, h)| {
                (
                    name.clone(),
                    HealthSnapshot {
                        healthy: h.healthy,
                        consecutive_failures: h.consecutive_failures,
                        success_rate: h.success_rate(),
                        response_time: h.response_time.map(|d| d.as_secs_f64()),
                        last_check: h.last_check,
                        last_error: h.last_error.clone(),
                    },
                )
            })
            .collect()
    }
}
