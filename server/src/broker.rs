//! Client-facing side of the server.
//!
//! Each connection is served strictly request/reply: one frame is read, handed
//! to whichever handler is idle through the shared queue, and the answer is
//! written back before the next frame is read. Handlers never see sockets; the
//! reply travels back on the envelope's oneshot channel.

use crate::wait_for_shutdown;
use anyhow::{Context, Result};
use search_core::frame::{read_frame, write_frame};
use std::io;
use std::net::SocketAddr;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub type ConnectionId = u64;

/// What a handler sends back for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Frame(String),
    /// End the session without replying.
    Close,
}

pub struct Envelope {
    pub origin: ConnectionId,
    pub frame: String,
    pub reply: oneshot::Sender<Response>,
}

pub struct Broker {
    listener: TcpListener,
    queue: mpsc::Sender<Envelope>,
    max_frame_len: usize,
}

impl Broker {
    pub async fn bind(addr: &str, queue: mpsc::Sender<Envelope>, max_frame_len: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind request endpoint {addr}"))?;
        Ok(Self { listener, queue, max_frame_len })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.listener.local_addr() }

    /// Accepts connections until shutdown is signalled, then waits for every
    /// connection to finish its in-flight request.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Broker { listener, queue, max_frame_len } = self;
        let mut connections = JoinSet::new();
        let mut next_id: ConnectionId = 0;

        loop {
            tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        let origin = next_id;
                        debug!(origin, %peer, "connection accepted");
                        let queue = queue.clone();
                        let shutdown = shutdown.clone();
                        connections.spawn(async move {
                            if let Err(e) = serve_connection(stream, origin, queue, shutdown, max_frame_len).await {
                                warn!(origin, %peer, error = %e, "connection terminated");
                            }
                            debug!(origin, "connection closed");
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "connection task failed");
                    }
                }
            }
        }

        drop(listener);
        info!(open = connections.len(), "broker stopped accepting, draining connections");
        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "connection task failed");
            }
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    origin: ConnectionId,
    queue: mpsc::Sender<Envelope>,
    mut shutdown: watch::Receiver<bool>,
    max_frame_len: usize,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return Ok(()),
            frame = read_frame(&mut reader, max_frame_len) => frame?,
        };
        let Some(frame) = frame else { return Ok(()) };

        let (reply, answer) = oneshot::channel();
        if queue.send(Envelope { origin, frame, reply }).await.is_err() {
            // handler pool is gone
            return Ok(());
        }
        match answer.await {
            Ok(Response::Frame(reply)) => write_frame(&mut write_half, &reply).await?,
            Ok(Response::Close) => return Ok(()),
            Err(_) => return Err(io::Error::new(io::ErrorKind::BrokenPipe, "handler dropped request")),
        }
    }
}
