//! Publish-only endpoint: every subscriber gets one `SERVER_SHUTDOWN` line
//! when the server starts shutting down.

use crate::wait_for_shutdown;
use anyhow::{Context, Result};
use search_core::frame::write_frame;
use search_core::protocol::SHUTDOWN_NOTICE;
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

pub struct ShutdownNotifier {
    listener: TcpListener,
}

impl ShutdownNotifier {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind notify endpoint {addr}"))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut subscribers = JoinSet::new();
        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((mut stream, peer)) => {
                        debug!(%peer, "shutdown subscriber connected");
                        let mut shutdown = shutdown.clone();
                        subscribers.spawn(async move {
                            wait_for_shutdown(&mut shutdown).await;
                            if let Err(e) = write_frame(&mut stream, SHUTDOWN_NOTICE).await {
                                debug!(%peer, error = %e, "subscriber gone before notice");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "notify accept failed"),
                },
            }
        }
        info!(subscribers = subscribers.len(), "publishing shutdown notice");
        while subscribers.join_next().await.is_some() {}
    }
}
