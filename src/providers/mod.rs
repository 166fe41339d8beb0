pub mod failover;
pub mod health;
pub mod openai;

use reqwest::Client;
use std::time::Duration;

pub use failover::FailoverSelector;
pub use health::{HealthSnapshot, HealthTable, ProviderHealth};

/// 获取全局 HTTP 客户端（连接池复用）；超时由每次请求单独指定
pub fn http_client() -> &'static Client {
    use once_cell::sync::Lazy;
    static CLIENT: Lazy<Client> = Lazy::new(|| {
        Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| Client::new())
    });
    &CLIENT
}
