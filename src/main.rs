// src/main.rs

//! The main entry point for the linerelay server and its terminal client.

use anyhow::Result;
use linerelay::client::{self, RelayClient};
use linerelay::config::{Config, DEFAULT_PORT};
use linerelay::core::protocol::DEFAULT_MAX_LINE_LENGTH;
use linerelay::server;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    // Collect command-line arguments to decide the execution mode.
    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("linerelay version {VERSION}");
        return Ok(());
    }

    if let Some(target) = flag_value(&args, "--connect") {
        // --- Client Mode ---
        let user = flag_value(&args, "--user").unwrap_or(client::DEFAULT_USER);
        let max_line_length = match flag_value(&args, "--max-line-length") {
            Some(n) => n.parse::<usize>()?,
            None => DEFAULT_MAX_LINE_LENGTH,
        };
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".to_string()))
            .compact()
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .init();
        return run_client(target, user, max_line_length).await;
    }

    // --- Server Mode ---

    // The config path can be provided via --config; otherwise "config.toml"
    // is used if present, and built-in defaults if not.
    let explicit_config = flag_value(&args, "--config");
    let config_path = explicit_config.unwrap_or("config.toml");
    let mut config = match Config::load(config_path, explicit_config.is_some()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e:#}");
            std::process::exit(1);
        }
    };

    // Override port if provided as `--port N` or as a bare positional argument.
    let port_arg = if args.iter().any(|arg| arg == "--port") {
        match flag_value(&args, "--port") {
            Some(p) => Some(p),
            None => {
                eprintln!("--port flag requires a value");
                std::process::exit(1);
            }
        }
    } else {
        args.get(1).map(String::as_str).filter(|a| !a.starts_with("--"))
    };
    if let Some(port_str) = port_arg {
        match port_str.parse::<u16>() {
            Ok(port) if port != 0 => config.port = port,
            _ => {
                eprintln!("Invalid port number: {port_str}");
                std::process::exit(1);
            }
        }
    }

    // Setup logging with reloading capabilities.
    // Get initial log level from env var or config.
    let initial_log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());

    // Create a reloadable filter layer.
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));

    // Initialize the global subscriber with the reload and formatting layers.
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    let reload_handle = Arc::new(reload_handle);

    if let Err(e) = server::run(config, reload_handle).await {
        error!("Server runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

/// Returns the argument following `flag`, if any.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}

/// Reads lines from stdin and sends each as a chat message; prints every
/// line the relay delivers.
async fn run_client(target: &str, user: &str, max_line_length: usize) -> Result<()> {
    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>()?),
        None => (target, DEFAULT_PORT),
    };
    let host = if host.is_empty() { client::DEFAULT_HOST } else { host };

    let print = |line: String| println!("{line}");
    let mut relay =
        RelayClient::connect_with_max_line_length(host, port, user, max_line_length, print).await?;
    info!("Connected to {}:{} as {}.", host, port, user);
    relay.announce().await?;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(text) = stdin.next_line().await? {
        relay.say(&text).await?;
    }
    relay.close().await?;
    Ok(())
}
