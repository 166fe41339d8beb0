use anyhow::Context;
use clap::{Parser, Subcommand};
use mythiq_agent::config::Config;
use mythiq_agent::{server, Agent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "mythiq-agent")]
#[command(about = "将用户消息路由到 Mythiq 创作微服务", long_about = None)]
struct Args {
    /// 配置文件路径；不指定时从环境变量（及 .env）读取
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务
    Serve {
        /// 监听地址
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        bind: String,
    },
    /// 处理一条消息并打印结果
    Ask {
        /// 直接走 assistant，不做关键词路由
        #[arg(long)]
        chat: bool,
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// 交互模式
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略；需在日志初始化前加载，RUST_LOG 才会生效
    let _ = dotenvy::dotenv();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 解析命令行参数
    let args = Args::parse();

    // 加载配置
    let config = match &args.config {
        Some(path) => Config::from_file(path).with_context(|| format!("加载配置 {} 失败", path))?,
        None => Config::from_env().context("从环境变量加载配置失败")?,
    };
    let agent = Arc::new(Agent::new(&config));

    match args.command.unwrap_or(Command::Repl) {
        Command::Serve { bind } => {
            let addr: SocketAddr = bind.parse().with_context(|| format!("无效的监听地址: {}", bind))?;
            if let Some(secs) = config.failover.health_check_interval_secs.filter(|s| *s > 0) {
                server::spawn_health_checks(Arc::clone(&agent), Duration::from_secs(secs));
            }
            server::start_server(agent, addr).await?;
        }
        Command::Ask { chat, message } => {
            let message = message.join(" ");
            let response = if chat {
                agent.chat(&message).await
            } else {
                agent.process(&message).await
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Repl => repl(&agent).await?,
    }

    Ok(())
}

async fn repl(agent: &Agent) -> anyhow::Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all("Mythiq Agent 交互模式，输入 quit 或 exit 退出。\n".as_bytes())
        .await?;

    loop {
        stdout.write_all(b">>> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            stdout.write_all(b"\n").await?;
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit") {
            break;
        }

        let response = agent.process(message).await;
        let output = serde_json::to_string_pretty(&response)?;
        stdout.write_all(output.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    Ok(())
}
