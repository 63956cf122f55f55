use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use pollvoter::config::Config;
use pollvoter::voter::evaluator::PollEvaluator;
use pollvoter::voter::gateway::GatewayClient;
use pollvoter::voter::history::VoteHistory;
use pollvoter::voter::{listener, scanner};

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "pollvoter.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    // Setup logging: stdout plus an append-only file under data_dir/logs
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("pollvoter.log"))
        .expect("Failed to open log file");
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .init();

    info!("Starting poll voter...");
    info!("Loaded config from {config_path}");
    info!(
        "Target chat: {}, voting \"{}\", window {}h, scan every {}ms (last {} messages)",
        config.target_chat_id,
        config.target_option,
        config.eligibility_window_hours,
        config.scan_interval_ms,
        config.scan_depth
    );

    let client = match GatewayClient::new(&config.api_url, &config.id_instance, &config.api_token) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    match client.get_state().await {
        Ok(state) => info!("Gateway instance state: {state}"),
        Err(e) => warn!("Could not query gateway state: {e}"),
    }

    let history = VoteHistory::load(&config.history_path());
    let evaluator = Arc::new(PollEvaluator::new(client.clone(), config.policy(), history));

    let (tx, rx) = mpsc::channel(64);

    let notifications = tokio::spawn(client.clone().run_notification_loop(tx));
    let listener = tokio::spawn(listener::run_listener(rx, evaluator.clone()));
    let scanner = tokio::spawn(scanner::run_scanner(evaluator, client));

    // Every task loops until shutdown; any early exit is worth a log line.
    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
        result = notifications => error!("Notification loop ended unexpectedly: {result:?}"),
        result = listener => error!("Listener ended unexpectedly: {result:?}"),
        result = scanner => error!("Scanner ended unexpectedly: {result:?}"),
    }
}
