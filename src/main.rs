//! bioledger command line client
//!
//! Read-side tooling for the research-record contracts: probe the node,
//! inspect or wait for transactions, call view functions, list samples and
//! dump a wallet's stored history. Writes need a wallet signer and go through
//! the library API.

// Compiler warning configuration
#![deny(unused_imports)]
#![deny(unused_mut)]
#![deny(unused_variables)]
#![warn(unused_must_use)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bioledger::config::Config;
use bioledger::contracts::{module_spec, SampleProvenance};
use bioledger::encoding::normalize_address;
use bioledger::gateway::{HttpLedgerGateway, LedgerGateway};
use bioledger::metrics::metrics;
use bioledger::poller::ConfirmationPoller;
use bioledger::session::WalletSession;
use bioledger::store::{SessionStore, SledStore};
use bioledger::submitter::TransactionRequest;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", env = "BIOLEDGER_CONFIG")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics after the command finishes
    #[arg(long)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check that the ledger node answers
    Probe,
    /// Look a transaction up once
    Status { hash: String },
    /// Poll a transaction until it is committed or the timeout elapses
    Wait {
        hash: String,
        /// Override the configured timeout (milliseconds)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Call a view function of one of the contract modules
    View {
        module: String,
        function: String,
        /// Arguments as JSON values; anything that is not JSON is sent as a string
        args: Vec<String>,
    },
    /// List registered samples
    Samples,
    /// Print the stored transaction history of a wallet
    History { address: String },
    /// Probe the node periodically until Ctrl+C
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.json_logs)?;
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    let gateway: Arc<dyn LedgerGateway> = Arc::new(
        HttpLedgerGateway::new(&config.ledger.node_url, config.request_timeout())
            .context("Failed to create ledger gateway")?,
    );
    info!(node = %config.ledger.node_url, network = %config.ledger.network, "Ledger gateway ready");

    match args.command {
        Command::Probe => {
            let reachable = gateway.is_network_reachable().await;
            println!(
                "{} ({}): {}",
                config.ledger.network,
                config.ledger.node_url,
                if reachable { "reachable" } else { "unreachable" }
            );
            if !reachable {
                bail!("ledger node is unreachable");
            }
        }
        Command::Status { hash } => {
            let poller = ConfirmationPoller::new(gateway, config.session_options().poll_interval);
            print_json(&poller.check_transaction(&hash).await)?;
        }
        Command::Wait { hash, timeout_ms } => {
            let options = config.session_options();
            let timeout = timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(options.confirmation_timeout);
            let poller = ConfirmationPoller::new(gateway, options.poll_interval);

            let cancel = CancellationToken::new();
            let on_ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    on_ctrl_c.cancel();
                }
            });

            print_json(&poller.wait_for(&hash, timeout, &cancel).await)?;
        }
        Command::View {
            module,
            function,
            args: raw_args,
        } => {
            let spec = module_spec(&module)
                .with_context(|| format!("unknown contract module '{}'", module))?;
            let request =
                TransactionRequest::new(&config.ledger.contract_address, spec.module, function)
                    .with_arguments(raw_args.iter().map(|a| parse_view_arg(a)).collect());
            let values = gateway.view(&request).await?;
            print_json(&values)?;
        }
        Command::Samples => {
            let store = open_store(&config)?;
            let session = Arc::new(WalletSession::new(
                config.session_options(),
                gateway,
                None,
                store,
            ));
            let samples = SampleProvenance::new(session, &config.ledger.contract_address);
            print_json(&samples.get_all_samples().await)?;
        }
        Command::History { address } => {
            let address = normalize_address(&address)?;
            let store = open_store(&config)?;
            print_json(&store.history(&address)?)?;
        }
        Command::Watch => run_watch_loop(gateway, &config).await?,
    }

    if args.metrics {
        if config.monitoring.enable_metrics {
            println!("{}", metrics().render()?);
        } else {
            warn!("Metrics are disabled in the configuration");
        }
    }

    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "bioledger=debug,info"
    } else {
        "bioledger=info,warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        warn!("Config file '{}' not found, using defaults", path);
        let mut config = Config::default();
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }
}

fn open_store(config: &Config) -> Result<Arc<dyn SessionStore>> {
    let store = SledStore::open(&config.storage.path)
        .with_context(|| format!("Failed to open store at {}", config.storage.path))?;
    Ok(Arc::new(store))
}

/// JSON if it parses, a plain string otherwise
fn parse_view_arg(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Periodic node probe
async fn run_watch_loop(gateway: Arc<dyn LedgerGateway>, config: &Config) -> Result<()> {
    info!("Watching {} every {}s", config.ledger.node_url, config.session.liveness_interval_secs);

    let mut ticker =
        tokio::time::interval(Duration::from_secs(config.session.liveness_interval_secs));
    let mut last = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reachable = gateway.is_network_reachable().await;
                if last != Some(reachable) {
                    if reachable {
                        info!("Ledger node reachable");
                    } else {
                        warn!("Ledger node unreachable");
                    }
                    last = Some(reachable);
                }
            }

            // Graceful shutdown signal
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                break;
            }
        }
    }

    Ok(())
}
