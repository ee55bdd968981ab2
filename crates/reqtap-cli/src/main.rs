//! 🚀 reqtap-cli: the front door, the bouncer, the maitre d' of reqtap.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! 📦 Loads config, sets up logging, serves a tiny axum app with the telemetry layer
//! wrapped around it, and prints the damage report on Ctrl-C. Like a manager. 🦆

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use clap::Parser;
use comfy_table::{Table, presets::UTF8_FULL};
use reqtap::{StatsSnapshot, Supervisor};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// 📡 Serve HTTP, record every request, ship the records to a sink.
#[derive(Debug, Parser)]
#[command(name = "reqtap", version, about)]
struct Args {
    /// 🔧 TOML config file. Skipped (env vars only) if it doesn't exist.
    #[arg(short, long, default_value = "reqtap.toml")]
    config: PathBuf,

    /// 🚪 Address the demo server listens on.
    #[arg(short, long, default_value = "127.0.0.1:3000")]
    listen: SocketAddr,
}

/// 🚀 main(): where it all begins. The "I pressed F5 and held my breath" moment.
#[tokio::main]
async fn main() -> Result<()> {
    // 📡 Set up tracing, because println! debugging is a lifestyle choice we're trying to move past
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if let Err(err) = run(args).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion of sadness, one tear-jerking layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("Address already in use") || cause_str.contains("address in use") {
                the_vibes_are_giving_connection_issues = true;
            }
        }
        if the_vibes_are_giving_connection_issues {
            error!("🔧 hint: something else is already listening there. Try `--listen 127.0.0.1:0` or go find the squatter with `lsof -i`.");
        }
        // 🗑️ Exit with prejudice. Process exitus maximus.
        std::process::exit(1);
    }

    // ✅ If we got here, everything worked. Pop the champagne. 🍾
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    // 🔒 Validate the config file exists before we get too emotionally attached
    let config_file = args.config.as_path();
    let config_file = match config_file.try_exists().with_context(|| {
        format!(
            "💀 Couldn't check whether the configuration file exists. Maybe a permissions thing, maybe a cwd thing. Was checking here: '{}'",
            config_file.display()
        )
    })? {
        true => Some(config_file),
        false => {
            warn!(
                "🔧 no config file at '{}', going with REQTAP_* environment variables only",
                config_file.display()
            );
            None
        }
    };

    let app_config = reqtap::load_config(config_file)
        .context("💀 In reqtap-cli, we couldn't load the configuration. Check the file and the REQTAP_* env vars")?;

    let supervisor = Supervisor::start(&app_config)?;

    let app = Router::new()
        .route("/", get(|| async { "📡 reqtap is listening. Everything you say will be written down." }))
        .route("/health", get(|| async { "ok" }))
        .layer(supervisor.layer());

    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("💀 couldn't bind {}", args.listen))?;
    info!("🚪 listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("💀 the HTTP server fell over")?;

    info!("🧹 server stopped, draining telemetry");
    let stats = supervisor.shutdown().await;
    println!("{}", stats_table(&stats));
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // -- no signal handler means no graceful exit. keep serving until killed.
        error!("💀 couldn't install the Ctrl-C handler: {e}");
        std::future::pending::<()>().await;
    }
    info!("🛑 Ctrl-C received, shutting down");
}

fn stats_table(stats: &StatsSnapshot) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["📊 counter", "value"]);
    for (name, value) in [
        ("enqueued", stats.enqueued),
        ("dropped", stats.dropped),
        ("written", stats.written),
        ("write failures", stats.write_failures),
        ("connect failures", stats.connect_failures),
        ("reconnects", stats.reconnects),
        ("lost at shutdown", stats.in_flight()),
    ] {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_the_defaults_need_no_arguments() {
        let args = Args::try_parse_from(["reqtap"]).expect("💀 defaults should parse");
        assert_eq!(args.config, PathBuf::from("reqtap.toml"));
        assert_eq!(args.listen, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn the_one_where_the_table_shows_every_counter() {
        let rendered = stats_table(&StatsSnapshot {
            enqueued: 10,
            dropped: 3,
            written: 9,
            write_failures: 1,
            ..StatsSnapshot::default()
        })
        .to_string();
        assert!(rendered.contains("dropped"));
        assert!(rendered.contains("lost at shutdown"));
    }
}
