use anyhow::Result;
use clap::Parser;
use client::{parse_query, ClientEngine, IndexOutcome};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "search-benchmark")]
#[command(about = "Index several datasets concurrently, one client per dataset, then run sample queries")]
struct Args {
    server_ip: String,
    server_port: u16,
    /// Dataset folders; each gets its own client connection
    #[arg(required = true)]
    datasets: Vec<PathBuf>,
    /// Queries to run after indexing, `term AND term` syntax
    #[arg(long = "query", default_values = ["the", "child-like", "child-like AND cats", "child-like AND cats AND dogs"])]
    queries: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let mut engines = Vec::with_capacity(args.datasets.len());
    for _ in &args.datasets {
        let mut engine = ClientEngine::new();
        engine.connect(&args.server_ip, args.server_port).await?;
        engines.push(engine);
    }

    let start = Instant::now();
    let tasks: Vec<_> = engines
        .into_iter()
        .zip(args.datasets.iter().cloned())
        .map(|(mut engine, dataset)| {
            tokio::spawn(async move {
                let outcome = engine.index_folder(&dataset).await;
                (engine, dataset, outcome)
            })
        })
        .collect();

    let mut engines = Vec::new();
    let mut total = IndexOutcome::default();
    for task in tasks {
        let (engine, dataset, outcome) = task.await?;
        let outcome = outcome?;
        println!(
            "Indexed {} in {:.3} s, bytes read: {}",
            dataset.display(),
            outcome.elapsed.as_secs_f64(),
            outcome.bytes_read
        );
        total.files += outcome.files;
        total.bytes_read += outcome.bytes_read;
        engines.push(engine);
    }
    println!("\nTotal time {:.3} seconds.", start.elapsed().as_secs_f64());
    println!("Total files: {}, bytes read: {}", total.files, total.bytes_read);

    if let Some(first) = engines.first_mut() {
        for query in &args.queries {
            let outcome = first.search(&parse_query(query)?).await?;
            println!("\nSearch query: \"{query}\"");
            println!("Search completed in {:.3} s", outcome.elapsed.as_secs_f64());
            if outcome.hits.is_empty() {
                println!("No valid matches found.");
            }
            for hit in &outcome.hits {
                let owner = hit.owner.map_or_else(|| "unknown".to_string(), |id| id.to_string());
                println!("Client {owner} - {} - Frequency: {}", hit.path, hit.freq);
            }
        }
    }

    for engine in &mut engines {
        engine.disconnect().await?;
    }
    Ok(())
}
