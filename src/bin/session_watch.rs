use session_watch::config::Config;
use session_watch::models::report::{sort_by_rsi, GatherStatus};
use session_watch::scrapers::yahoo::YahooChartSource;
use session_watch::services::aggregator::ConcurrentAggregator;
use session_watch::services::stage::{classify, Stage, StageReport};

use anyhow::Context;
use chrono::Utc;
use clap::{Arg, ArgMatches, Command};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init();

    let app = Command::new("session_watch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("US stock pre/post-market monitor")
        .arg(
            Arg::new("symbols")
                .short('s')
                .long("symbols")
                .value_name("SYMBOLS")
                .help("Comma-separated ticker list (defaults to the built-in watch list)")
                .takes_value(true),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("N")
                .help("Concurrent fetch workers")
                .takes_value(true)
                .default_value("2"),
        )
        .arg(
            Arg::new("cache-dir")
                .long("cache-dir")
                .value_name("DIR")
                .help("Directory for per-symbol minute caches")
                .takes_value(true)
                .default_value("cache_arrow"),
        )
        .arg(
            Arg::new("ttl")
                .long("ttl")
                .value_name("SECONDS")
                .help("Cache time-to-live in seconds")
                .takes_value(true)
                .default_value("180"),
        )
        .subcommand(Command::new("once").about("Fetch all symbols once and print the table"))
        .subcommand(
            Command::new("watch")
                .about("Fetch periodically until interrupted")
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Seconds between rounds")
                        .takes_value(true)
                        .default_value("300"),
                ),
        );

    let matches = app.get_matches();
    let config = build_config(&matches)?;
    info!(
        "Watching {} symbols with {} workers, cache {} (ttl {:?})",
        config.symbols.len(),
        config.max_workers,
        config.cache_dir.display(),
        config.cache_ttl
    );

    let source = Arc::new(YahooChartSource::new()?);
    let aggregator = ConcurrentAggregator::new(&config, source);

    if let Some(matches) = matches.subcommand_matches("watch") {
        let interval = matches
            .value_of("interval")
            .unwrap_or("300")
            .parse::<u64>()
            .context("invalid --interval")?;
        loop {
            run_round(&aggregator, &config).await;
            tokio::time::sleep(Duration::from_secs(interval)).await;
        }
    } else {
        run_round(&aggregator, &config).await;
    }

    Ok(())
}

fn build_config(matches: &ArgMatches) -> anyhow::Result<Config> {
    let mut config = Config::new();

    if let Some(symbols) = matches.value_of("symbols") {
        let symbols: Vec<&str> = symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        config = config.with_symbols(&symbols);
    }

    let workers = matches
        .value_of("workers")
        .unwrap_or("2")
        .parse::<usize>()
        .context("invalid --workers")?;
    let ttl = matches
        .value_of("ttl")
        .unwrap_or("180")
        .parse::<u64>()
        .context("invalid --ttl")?;

    config = config
        .with_max_workers(workers)
        .with_cache_ttl(Duration::from_secs(ttl))
        .with_cache_dir(matches.value_of("cache-dir").unwrap_or("cache_arrow"));

    Ok(config)
}

async fn run_round(aggregator: &ConcurrentAggregator, config: &Config) {
    let mut report = aggregator.gather_all(&config.symbols).await;

    match report.status() {
        GatherStatus::NoSymbols => {
            warn!("No symbols configured");
            return;
        }
        GatherStatus::TotalOutage => {
            error!("All {} symbols failed, try again later", report.failed.len());
            return;
        }
        GatherStatus::Partial | GatherStatus::Complete => {}
    }

    sort_by_rsi(&mut report.rows);
    let staged = classify(report.rows, Utc::now());
    print_table(&staged);

    if !report.failed.is_empty() {
        let failed: Vec<&str> = report.failed.iter().map(String::as_str).collect();
        warn!("No data / failed: {}", failed.join(", "));
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_table(staged: &StageReport) {
    info!(
        "UTC+8 {} | {}",
        staged.reference_time.format("%Y-%m-%d %H:%M"),
        staged.title
    );
    if staged.stage == Stage::DefaultPostMarket {
        info!("(outside both comparison windows, showing post-market)");
    }
    info!("{:-<112}", "");
    info!(
        "{:<8} {:>10} {:>11} {:>8} {:>11} {:>8} {:>7} {:>8} {:>10} {:>10} {:>10}",
        "Symbol", staged.label_a, staged.label_b, "Chg%", "PrevClose", "Day%", "RSI14", "ATR", "MA5", "MA20", "MA60"
    );
    info!("{:-<112}", "");

    for row in &staged.rows {
        let (a, b) = staged.stage.pair(&row.session);
        info!(
            "{:<8} {:>10} {:>11} {:>8} {:>11} {:>8} {:>7} {:>8} {:>10} {:>10} {:>10}",
            row.symbol,
            fmt_opt(a),
            fmt_opt(b),
            fmt_opt(row.delta),
            fmt_opt(row.daily.prior_close),
            fmt_opt(row.daily.percent_change),
            row.daily.rsi14.map(|v| format!("{:.1}", v)).unwrap_or_else(|| "-".to_string()),
            fmt_opt(row.daily.atr),
            fmt_opt(row.daily.ma5),
            fmt_opt(row.daily.ma20),
            fmt_opt(row.daily.ma60),
        );
    }
}
