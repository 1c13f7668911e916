//! AWS Lambda entry point for daabot
//!
//! Deploy with `cargo lambda build --release --features lambda` and trigger
//! it from an EventBridge schedule. Each event runs the pipeline once.

use std::sync::Arc;

use lambda_runtime::{Error as LambdaError, LambdaEvent, service_fn};

use daabot::clock::SystemClock;
use daabot::models::Config;
use daabot::pipeline::{self, RunOptions};
use serde_json::Value;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the AWS Lambda function.
#[tokio::main]
async fn main() -> Result<(), LambdaError> {
    let config_path =
        std::env::var("DAABOT_CONFIG").unwrap_or_else(|_| "daabot.toml".to_string());
    let config = Config::from_path_and_env(&config_path);

    tracing_subscriber::registry()
        .with(log_filter(&config))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("daabot Lambda starting (config: {})", config_path);
    let config = &config;
    lambda_runtime::run(service_fn(move |event| handler(event, config))).await
}

fn log_filter(config: &Config) -> EnvFilter {
    EnvFilter::new(filter_directives(std::env::var("RUST_LOG").ok(), config))
}

/// `RUST_LOG` wins; otherwise the `[logging]` level from the config.
fn filter_directives(rust_log: Option<String>, config: &Config) -> String {
    rust_log
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.logging.level.clone())
}

/// Handler for scheduled events.
#[instrument(skip(event, config))]
async fn handler(event: LambdaEvent<Value>, config: &Config) -> Result<Value, LambdaError> {
    info!("Received event: {:?}", event.payload);

    let dry_run = event
        .payload
        .get("dry_run")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match pipeline::run(config, Arc::new(SystemClock), RunOptions { dry_run }).await {
        Ok(report) => {
            info!(
                "Run complete: stored={}, chart={}, publish failures={}",
                report.stored,
                report.chart_attached,
                report.publish_failures()
            );
            Ok(serde_json::json!({
                "status": "success",
                "report": report,
            }))
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Ok(serde_json::json!({
                "status": "error",
                "message": e.to_string(),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_level_used_without_rust_log() {
        let mut config = Config::default();
        config.logging.level = "debug".to_string();

        assert_eq!(filter_directives(None, &config), "debug");
        assert_eq!(filter_directives(Some(" ".to_string()), &config), "debug");
        assert_eq!(
            filter_directives(Some("daabot=trace".to_string()), &config),
            "daabot=trace"
        );
    }
}
