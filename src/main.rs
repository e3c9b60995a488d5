//! wsevent Demo Server
//!
//! Serves the event hub at `/wsevents` and a small test page at `/`, and
//! publishes example events from a few producers.
//!
//! Run with: cargo run --bin wsevent -- --producers 10
//!
//! # Configuration
//!
//! Loaded from `--config`, or the default locations (see
//! [`Config::load_default`]), with `WSEVENT_*` environment overrides.
//! `RUST_LOG` takes precedence over the configured log level.

use anyhow::Context;
use axum::{response::Html, routing::get};
use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wsevent::config::generate_default_config;
use wsevent::{api, Config, Hub, LoggingConfig};

#[derive(Debug, Parser)]
#[command(name = "wsevent", version, about = "WebSocket event hub demo server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// WebSocket path
    #[arg(long)]
    path: Option<String>,

    /// Number of example event producers
    #[arg(long, default_value_t = 10)]
    producers: usize,

    /// Interval between events of one producer, in milliseconds
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

/// Example event published by the demo producers
#[derive(Debug, Clone, Serialize)]
struct ExampleEvent {
    event: String,
    from: usize,
    time: chrono::DateTime<Utc>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::load_with_env(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::load_default(),
    };

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(path) = args.path {
        config.server.path = path;
    }

    init_tracing(&config.logging);

    tracing::info!("wsevent demo server v{}", env!("CARGO_PKG_VERSION"));

    let hub: Hub<ExampleEvent> = Hub::new(config.hub_options());

    let interval = Duration::from_millis(args.interval_ms.max(1));
    for index in 1..=args.producers {
        tokio::spawn(publish_example_events(hub.clone(), index, interval));
    }

    let router = api::build_router(&hub, &config.server.path).route("/", get(home_page));

    api::serve(router, config.server.addr())
        .await
        .context("running server")?;

    Ok(())
}

/// Initialize tracing from the logging config
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("wsevent={},tower_http=info", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn publish_example_events(hub: Hub<ExampleEvent>, index: usize, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        let event = ExampleEvent {
            event: "test".to_string(),
            from: index,
            time: Utc::now(),
        };

        if let Err(e) = hub.publish(event).await {
            tracing::warn!(producer = index, error = %e, "Producer stopped");
            break;
        }
    }
}

async fn home_page() -> Html<&'static str> {
    Html(HOME_PAGE)
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>wsevent</title>
</head>
<body>
<h1>wsevent</h1>
<pre id="log"></pre>
<script>
  const log = document.getElementById("log");
  const ws = new WebSocket(`ws://${location.host}/wsevents`);
  ws.onopen = () => ws.send(JSON.stringify({type: "reg", args: null}));
  ws.onmessage = (msg) => { log.textContent = msg.data + "\n" + log.textContent; };
  ws.onclose = () => { log.textContent = "closed\n" + log.textContent; };
</script>
</body>
</html>
"#;
