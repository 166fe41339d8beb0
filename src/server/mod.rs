pub mod handlers;

use crate::agent::Agent;
use crate::Result;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// 启动 HTTP 服务器（带优雅关闭）
pub async fn start_server(agent: Arc<Agent>, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Mythiq Agent 服务器运行在 http://{}", addr);
    serve(listener, agent, shutdown_signal()).await
}

/// 在已绑定的监听器上提供服务，直到 `shutdown` 完成
pub async fn serve<F>(listener: TcpListener, agent: Arc<Agent>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());

    let server_handle = tokio::spawn({
        let mut shutdown_rx = shutdown_rx.clone();

        async move {
            loop {
                tokio::select! {
                    // 等待新连接
                    result = listener.accept() => {
                        match result {
                            Ok((stream, peer)) => {
                                debug!("新连接: {}", peer);
                                let io = TokioIo::new(stream);
                                let agent = Arc::clone(&agent);

                                tokio::spawn(async move {
                                    let service = service_fn(move |req| {
                                        let agent = Arc::clone(&agent);
                                        handlers::handle_request(req, agent)
                                    });

                                    if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                                        error!("服务连接错误: {}", e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("接受连接失败: {}", e);
                            }
                        }
                    }
                    // 等待关闭信号
                    _ = shutdown_rx.changed() => {
                        info!("收到关闭信号，停止接受新连接");
                        break;
                    }
                }
            }
        }
    });

    shutdown.await;
    let _ = shutdown_tx.send(());

    if let Err(e) = server_handle.await {
        error!("等待服务器关闭时出错: {}", e);
    }

    info!("服务器已优雅关闭");
    Ok(())
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("设置 Ctrl+C 信号处理失败: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("设置 SIGTERM 信号处理失败: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => warn!("收到 Ctrl+C 信号，开始优雅关闭..."),
        _ = terminate => warn!("收到 SIGTERM 信号，开始优雅关闭..."),
    }
}

/// 按固定间隔在后台探测所有 provider
pub fn spawn_health_checks(agent: Arc<Agent>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // 第一次 tick 立即返回，跳过它
        ticker.tick().await;
        loop {
            ticker.tick().await;
            debug!("执行 provider 健康探测");
            agent.selector().probe().await;
        }
    })
}
