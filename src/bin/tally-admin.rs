use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tally::api::AppState;
use tally::config::Config;
use tally::metrics::validate_filter;
use tally::models::{EventInput, MetricsQuery};

#[derive(Parser)]
#[command(name = "tally-admin")]
#[command(about = "Tally event store management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import events from a newline-delimited JSON file
    Import {
        /// Path to the file, one event object per line
        file: PathBuf,
    },
    /// Print aggregated metrics for an event
    Metrics {
        #[arg(long)]
        event_name: String,
        /// Unix timestamp (seconds), inclusive
        #[arg(long)]
        from: i64,
        /// Unix timestamp (seconds), inclusive
        #[arg(long)]
        to: i64,
        #[arg(long)]
        channel: Option<String>,
        /// channel or time
        #[arg(long, default_value = "")]
        group_by: String,
        /// hour or day, used with --group-by time
        #[arg(long, default_value = "")]
        interval: String,
    },
}

fn read_events(file: &PathBuf) -> Result<Vec<EventInput>> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut events = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event: EventInput = serde_json::from_str(line)
            .with_context(|| format!("Invalid event on line {}", index + 1))?;
        events.push(event);
    }
    Ok(events)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let state = AppState::from_config(&config).await?;

    match cli.command {
        Commands::Import { file } => {
            let events = read_events(&file)?;
            if events.is_empty() {
                println!("⚠ No events found in {}", file.display());
                return Ok(());
            }

            let outcome = state.bulk.store_many(events).await?;
            println!(
                "✓ Imported {} events ({} created, {} duplicates)",
                outcome.total(),
                outcome.created_count,
                outcome.duplicate_count
            );
        }
        Commands::Metrics {
            event_name,
            from,
            to,
            channel,
            group_by,
            interval,
        } => {
            let filter = validate_filter(MetricsQuery {
                event_name,
                from,
                to,
                channel,
                group_by,
                interval,
            })?;
            let metrics = state.metrics.query(&filter).await?;

            println!(
                "{} from {} to {}: {} events, {} unique users",
                metrics.event_name,
                metrics.from,
                metrics.to,
                metrics.total_count,
                metrics.unique_users
            );
            if !metrics.groups.is_empty() {
                println!();
                println!("{:<28} {:>12} {:>14}", "Group", "Events", "Unique users");
                println!("{}", "-".repeat(56));
                for group in metrics.groups {
                    println!(
                        "{:<28} {:>12} {:>14}",
                        group.key, group.total_count, group.unique_users
                    );
                }
            }
        }
    }

    Ok(())
}
