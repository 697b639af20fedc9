pub mod broker;
pub mod config;
pub mod notify;
pub mod worker;

use anyhow::{bail, Result};
use broker::Broker;
use notify::ShutdownNotifier;
use search_core::{ClientRegistry, IndexStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, info};
use worker::{run_worker, RequestHandler};

pub use config::ServerConfig;

/// Resolves once shutdown has been signalled or the signalling side is gone.
pub(crate) async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stopped = *shutdown.borrow_and_update();
        if stopped || shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// A running server: broker, handler pool and optional notifier sharing one store.
pub struct Server {
    addr: SocketAddr,
    notify_addr: Option<SocketAddr>,
    store: Arc<IndexStore>,
    shutdown: watch::Sender<bool>,
    broker: JoinHandle<()>,
    notifier: Option<JoinHandle<()>>,
    workers: JoinSet<()>,
}

impl Server {
    pub async fn start(config: ServerConfig) -> Result<Self> {
        Self::start_with_store(config, Arc::new(IndexStore::new())).await
    }

    pub async fn start_with_store(config: ServerConfig, store: Arc<IndexStore>) -> Result<Self> {
        if config.workers == 0 {
            bail!("at least one worker is required");
        }
        let clients = Arc::new(ClientRegistry::new());
        if config.reset_on_start {
            store.reset();
            clients.reset();
        }

        let (queue_tx, queue_rx) = mpsc::channel(config.queue_depth.max(1));
        let broker = Broker::bind(&config.bind_addr(), queue_tx, config.max_frame_len).await?;
        let addr = broker.local_addr()?;
        let notifier = match config.notify_addr() {
            Some(notify_addr) => Some(ShutdownNotifier::bind(&notify_addr).await?),
            None => None,
        };
        let notify_addr = notifier.as_ref().map(|n| n.local_addr()).transpose()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let queue = Arc::new(Mutex::new(queue_rx));
        let handler = RequestHandler::new(Arc::clone(&store), clients);
        let mut workers = JoinSet::new();
        for worker in 0..config.workers {
            workers.spawn(run_worker(worker, handler.clone(), Arc::clone(&queue)));
        }
        let broker = tokio::spawn(broker.run(shutdown_rx.clone()));
        let notifier = notifier.map(|n| tokio::spawn(n.run(shutdown_rx)));

        info!(%addr, workers = config.workers, notify = ?notify_addr, "server started");
        Ok(Self { addr, notify_addr, store, shutdown, broker, notifier, workers })
    }

    pub fn local_addr(&self) -> SocketAddr { self.addr }

    pub fn notify_addr(&self) -> Option<SocketAddr> { self.notify_addr }

    pub fn store(&self) -> Arc<IndexStore> { Arc::clone(&self.store) }

    /// Stops accepting, lets in-flight requests finish, then joins every task.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("shutting down server");
        // no receiver left only if every task already exited
        let _ = self.shutdown.send(true);

        if let Some(notifier) = self.notifier.take() {
            if let Err(e) = notifier.await {
                error!(error = %e, "notifier task failed");
            }
        }
        // the broker owns the last queue sender; once it returns the handlers drain and stop
        if let Err(e) = self.broker.await {
            error!(error = %e, "broker task failed");
        }
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "handler task failed");
            }
        }
        info!(documents = self.store.document_count(), terms = self.store.term_count(), "server fully shut down");
        Ok(())
    }
}
