use anyhow::Result;
use clap::Parser;
use client::{parse_query, subscribe_shutdown, ClientEngine};
use search_core::SearchHit;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search-client")]
#[command(about = "Index local folders into a shared search server and query it", long_about = None)]
struct Args {
    /// Server port publishing shutdown notices
    #[arg(long)]
    notify_port: Option<u16>,
    /// Print search results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Serialize)]
struct SearchReport<'a> {
    query: &'a [String],
    took_s: f64,
    results: &'a [SearchHit],
}

fn prompt() {
    print!("> ");
    std::io::stdout().flush().ok();
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let mut engine = ClientEngine::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    prompt();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim();
        let (name, rest) = command.split_once(' ').map_or((command, ""), |(n, r)| (n, r.trim()));
        match name {
            "" => {}
            "quit" => break,
            "connect" => match rest.split_once(' ').map(|(ip, port)| (ip, port.trim().parse::<u16>())) {
                Some((ip, Ok(port))) => match engine.connect(ip, port).await {
                    Ok(id) => {
                        println!("Connected to server. Client ID: {id}");
                        if let Some(notify_port) = args.notify_port {
                            match subscribe_shutdown(&format!("{ip}:{notify_port}")).await {
                                Ok(notice) => {
                                    tokio::spawn(async move {
                                        if let Ok(true) = notice.await {
                                            println!("\nServer is shutting down.");
                                        }
                                    });
                                }
                                Err(e) => eprintln!("ERROR: {e:#}"),
                            }
                        }
                    }
                    Err(e) => eprintln!("ERROR: {e:#}"),
                },
                _ => println!("Usage: connect <server IP> <server port>"),
            },
            "get_info" => match engine.client_id() {
                Some(id) => println!("Client ID: {id}"),
                None => println!("Not connected."),
            },
            "index" if !rest.is_empty() => match engine.index_folder(Path::new(rest)).await {
                Ok(outcome) => println!(
                    "Indexing completed in {:.3} s, files: {}, bytes read: {}",
                    outcome.elapsed.as_secs_f64(),
                    outcome.files,
                    outcome.bytes_read
                ),
                Err(e) => eprintln!("ERROR: {e:#}"),
            },
            "index" => println!("Usage: index <folder path>"),
            "search" if !rest.is_empty() => match parse_query(rest) {
                Ok(terms) => match engine.search(&terms).await {
                    Ok(outcome) if args.json => {
                        let report = SearchReport { query: &terms, took_s: outcome.elapsed.as_secs_f64(), results: &outcome.hits };
                        println!("{}", serde_json::to_string_pretty(&report)?);
                    }
                    Ok(outcome) => {
                        println!("Search completed in {:.3} s", outcome.elapsed.as_secs_f64());
                        if outcome.hits.is_empty() {
                            println!("No matches found.");
                        }
                        for hit in &outcome.hits {
                            let owner = hit.owner.map_or_else(|| "unknown".to_string(), |id| id.to_string());
                            println!("Client {owner} - {} - Frequency: {}", hit.path, hit.freq);
                        }
                    }
                    Err(e) => eprintln!("ERROR: {e:#}"),
                },
                Err(e) => eprintln!("ERROR: {e:#}"),
            },
            "search" => println!("Usage: search <term1 AND term2 ...>"),
            _ => println!("Unrecognized command!"),
        }
        prompt();
    }

    engine.disconnect().await?;
    println!("Disconnected from server.");
    Ok(())
}
