use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use linkpulse::analytics::sample::{self, MAX_SPAN_DAYS};
use linkpulse::analytics::{Channel, ClickEvent, EventStore, FilterSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "linkpulse-report")]
#[command(about = "Click analytics reports from the command line", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ChannelArg {
    Qr,
    Link,
}

impl From<ChannelArg> for Channel {
    fn from(arg: ChannelArg) -> Self {
        match arg {
            ChannelArg::Qr => Channel::Qr,
            ChannelArg::Link => Channel::Link,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compute a metrics snapshot and print it as JSON
    Metrics {
        /// JSON-lines file of click events (defaults to the built-in sample events)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Window start (RFC 3339); defaults to the earliest event
        #[arg(long)]
        start: Option<DateTime<Utc>>,
        /// Window end (RFC 3339); defaults to the latest event
        #[arg(long)]
        end: Option<DateTime<Utc>>,
        #[arg(long)]
        user_id: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long, value_enum)]
        channel: Option<ChannelArg>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        campaign: Option<String>,
    },
    /// Print synthetic click events as JSON lines
    Sample {
        /// Number of events to generate
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Spread events over this many days before now
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(0..=MAX_SPAN_DAYS))]
        days: i64,
    },
}

/// Read click events from a JSON-lines file, skipping blank lines
fn load_events(path: &Path) -> Result<Vec<ClickEvent>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut events = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let event: ClickEvent = serde_json::from_str(&line)
            .with_context(|| format!("Invalid event on line {}", line_no + 1))?;
        events.push(event);
    }
    Ok(events)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Metrics {
            input,
            start,
            end,
            user_id,
            tag,
            channel,
            country,
            campaign,
        } => {
            let events = match input {
                Some(path) => load_events(&path)?,
                None => {
                    warn!("No --input given, using built-in sample events");
                    sample::seed_events(Utc::now())
                }
            };
            info!("Loaded {} events", events.len());

            let earliest = events.iter().map(|e| e.timestamp).min();
            let latest = events.iter().map(|e| e.timestamp).max();
            let now = Utc::now();
            let start = start.or(earliest).unwrap_or(now - Duration::days(7));
            let end = end.or(latest).unwrap_or(now);
            if start > end {
                bail!("--start must not be later than --end");
            }

            let filters = FilterSet {
                user_id,
                tag,
                channel: channel.map(Channel::from),
                country,
                campaign,
            };

            let store = EventStore::with_events(events);
            let snapshot = store.calculate_metrics(start, end, Some(&filters));
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Sample { count, days } => {
            let span = Duration::days(days);
            for event in sample::synthesize(count, Utc::now(), span) {
                println!("{}", serde_json::to_string(&event)?);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_days_are_bounded() {
        let cli = Cli::try_parse_from(["linkpulse-report", "sample", "--days", "30"]).unwrap();
        assert!(matches!(cli.command, Commands::Sample { days: 30, .. }));

        assert!(Cli::try_parse_from(["linkpulse-report", "sample", "--days", "36501"]).is_err());
        assert!(Cli::try_parse_from(["linkpulse-report", "sample", "--days", "-1"]).is_err());
        assert!(
            Cli::try_parse_from(["linkpulse-report", "sample", "--days", "200000000000000"]).is_err()
        );
    }
}
