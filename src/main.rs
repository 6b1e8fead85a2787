use std::{path::PathBuf, time::Duration};

use chrono::NaiveDateTime;
use clap::Parser;
use stop_schedule::{ArrivalEntry, NormalizerConfig, ScheduleNormalizer, TimeFormat, TransitClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stop-schedule")]
#[command(about = "Upcoming departures for a Winnipeg Transit stop")]
struct Args {
    /// Stop number to look up
    #[arg(short, long)]
    stop: String,

    #[arg(long, env = "WINNIPEG_TRANSIT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Show clock times for departures that are on schedule
    #[arg(long, conflicts_with = "mixed")]
    clock: bool,

    /// Countdown for the next bus of each route, clock times for the rest
    #[arg(long)]
    mixed: bool,

    /// JSON file with thresholds and labels
    #[arg(long, env = "STOP_SCHEDULE_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long)]
    due_grace: Option<i64>,

    /// Countdown window in minutes
    #[arg(long)]
    window: Option<i64>,

    /// How many hours of departures to request
    #[arg(long, default_value = "2")]
    lookahead_hours: i64,

    /// Pretend the current local time is this (e.g. 2024-05-01T14:30:00)
    #[arg(long)]
    now: Option<NaiveDateTime>,

    #[arg(long, conflicts_with = "rows")]
    json: bool,

    /// Print flattened widget rows
    #[arg(long)]
    rows: bool,

    /// Refresh every N seconds instead of exiting
    #[arg(long)]
    watch: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => NormalizerConfig::load(path)?,
        None => NormalizerConfig::default(),
    };
    if let Some(minutes) = args.due_grace {
        config.due_grace_minutes = minutes;
    }
    if let Some(minutes) = args.window {
        config.next_bus_window_minutes = minutes;
    }

    let normalizer = ScheduleNormalizer::new(config);
    let client = TransitClient::new(args.api_key.clone())?;

    let Some(interval) = args.watch else {
        return refresh(&args, &client, &normalizer).await;
    };

    info!("Refreshing stop {} every {}s", args.stop, interval);
    loop {
        if let Err(e) = refresh(&args, &client, &normalizer).await {
            warn!("Refresh failed: {}", e);
        }
        tokio::time::sleep(Duration::from_secs(interval)).await;
    }
}

async fn refresh(
    args: &Args,
    client: &TransitClient,
    normalizer: &ScheduleNormalizer,
) -> Result<(), Box<dyn std::error::Error>> {
    let now = args
        .now
        .unwrap_or_else(|| chrono::Local::now().naive_local());
    let window = (now, now + chrono::Duration::hours(args.lookahead_hours));

    let raw = client.fetch_schedule(&args.stop, Some(window)).await?;
    let entries = if args.mixed {
        normalizer.normalize_mixed_format(&raw, now)
    } else if args.clock {
        normalizer.normalize(&raw, now, TimeFormat::ClockTime)
    } else {
        normalizer.normalize(&raw, now, TimeFormat::MinutesRemaining)
    };

    print_entries(args, normalizer, &entries)?;
    Ok(())
}

fn print_entries(
    args: &Args,
    normalizer: &ScheduleNormalizer,
    entries: &[ArrivalEntry],
) -> Result<(), serde_json::Error> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("Stop {}: no upcoming departures", args.stop);
        return Ok(());
    }

    let labels = &normalizer.config().labels;
    for entry in entries {
        if args.rows {
            println!("{}", entry.to_row(labels));
        } else if entry.display_text.is_empty() {
            println!("{} {}: {}", entry.route_key, entry.route_name, labels.state(entry.state));
        } else {
            println!(
                "{} {}: {} ({})",
                entry.route_key,
                entry.route_name,
                entry.display_text,
                labels.state(entry.state)
            );
        }
    }
    Ok(())
}
