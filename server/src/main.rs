use anyhow::Result;
use clap::Parser;
use search_core::frame::DEFAULT_MAX_FRAME_LEN;
use server::{Server, ServerConfig};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search-server")]
#[command(about = "Shared inverted-index server", long_about = None)]
struct Args {
    /// Port for client requests
    port: u16,
    /// Number of request handler workers
    worker_threads: usize,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port publishing SERVER_SHUTDOWN to subscribers
    #[arg(long)]
    notify_port: Option<u16>,
    /// Requests allowed to wait for a free worker
    #[arg(long, default_value_t = 1024)]
    queue_depth: usize,
    /// Largest accepted message in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_LEN)]
    max_frame_len: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        workers: args.worker_threads,
        queue_depth: args.queue_depth,
        max_frame_len: args.max_frame_len,
        notify_port: args.notify_port,
        reset_on_start: true,
    };
    let server = Server::start(config).await?;
    println!("Server started on {} with {} worker threads.", server.local_addr(), args.worker_threads);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => match line {
                Ok(Some(cmd)) if cmd.trim() == "quit" => break,
                Ok(Some(cmd)) if cmd.trim().is_empty() => {}
                Ok(Some(_)) => println!("Unrecognized command!"),
                // stdin closed; keep serving until interrupted
                Ok(None) => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!(error = %e, "failed to wait for interrupt");
                    }
                    break;
                }
                Err(e) => {
                    error!(error = %e, "failed to read console");
                    break;
                }
            },
        }
    }

    server.shutdown().await?;
    println!("Server fully shut down.");
    Ok(())
}
