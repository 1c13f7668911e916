//! daabot CLI
//!
//! Local execution entry point, meant to be run from cron or a systemd timer.
//! For AWS Lambda, use `daabot-lambda`.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use daabot::{
    clock::SystemClock,
    error::Result,
    models::Config,
    pipeline::{self, RunOptions},
    services::{ChartRenderer, DaaFetcher, Fetcher, noon_chart_title},
    storage::{Store, open_store},
};

/// daabot - Dublin Airport security times bot
#[derive(Parser, Debug)]
#[command(
    name = "daabot",
    version,
    about = "Posts Dublin Airport security queue times"
)]

struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "daabot.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Defaults to `run` when omitted
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, store, chart (when due) and publish once
    Run {
        /// Compose and log the post without storing or publishing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Fetch and print the current queue times
    Fetch,

    /// Render the trailing 24-hour chart to a PNG file now
    Chart {
        /// Output file
        #[arg(short, long, default_value = "plot.png")]
        output: PathBuf,

        /// Chart title (default: the noon title for today)
        #[arg(long)]
        title: Option<String>,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, default_level: &str) {
    let level = if verbose { "debug" } else { default_level };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_path_and_env(&cli.config);
    init_logging(cli.verbose, &config.logging.level);

    log::info!("daabot starting (config: {})", cli.config.display());

    match cli.command.unwrap_or(Command::Run { dry_run: false }) {
        Command::Run { dry_run } => {
            let report =
                pipeline::run(&config, Arc::new(SystemClock), RunOptions { dry_run }).await?;
            if report.publish_failures() > 0 {
                log::warn!(
                    "{} of {} platforms failed",
                    report.publish_failures(),
                    report.published.len()
                );
            }
        }

        Command::Fetch => {
            let fetcher = DaaFetcher::new(config.source.clone())?;
            let reading = fetcher.fetch().await?;
            println!(
                "Terminal 1: {} minutes\nTerminal 2: {} minutes",
                reading.terminal1_minutes, reading.terminal2_minutes
            );
        }

        Command::Chart { output, title } => {
            let store = open_store(&config.store)?;
            let renderer = ChartRenderer::from_config(store.as_chart_source(), &config.chart)?;
            let now = Utc::now();
            let title = title.unwrap_or_else(|| {
                let today = now.with_timezone(&renderer.timezone()).date_naive();
                noon_chart_title(today)
            });

            match renderer.render(&title, now).await? {
                Some(image) => {
                    std::fs::write(&output, &image.png)?;
                    log::info!("Chart saved to {}", output.display());
                }
                None => log::warn!("No readings in the last 24 hours; nothing to draw"),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
            for warning in config.credential_warnings() {
                log::warn!("  {}", warning);
            }
            log::info!("  Source: {}", config.source.url);
            log::info!("  Store: {:?} ({})", config.store.backend, config.store.measurement);
            log::info!(
                "  Charts: {} at {:?} ({})",
                if config.chart.enabled { "on" } else { "off" },
                config.chart.schedule,
                config.chart.timezone
            );
            log::info!(
                "  Platforms: x={} bluesky={}",
                config.x.enabled,
                config.bluesky.enabled
            );
        }
    }

    log::info!("Done!");

    Ok(())
}
