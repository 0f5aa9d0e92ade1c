//! syswatch - kernel counter exporter binary
//!
//! Reads the collection configuration, then samples `/proc` on one task while
//! serving the results over HTTP on another.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use syswatch::{
    start_web_server, CollectorConfig, ConfigSource, ConfigVector, MetricKind, MetricStore,
    MetricsCollector, RateMode, StoreSnapshot, WebConfig, DEFAULT_CONFIG_ACK_FIFO,
    DEFAULT_CONFIG_FIFO, DEFAULT_INTERVAL_SECS, DEFAULT_PROC_ROOT, DEFAULT_WEB_PORT,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "syswatch")]
#[command(about = "Kernel counter exporter for Prometheus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Samples CPU, memory, disk and network counters from /proc and serves them as Prometheus metrics")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    collect: CollectArgs,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample and serve metrics (default)
    Serve(ServeArgs),

    /// Poll twice, one interval apart, print the store and exit
    Snapshot(SnapshotArgs),

    /// List metric kinds in configuration-vector order
    Kinds,
}

#[derive(Args, Clone)]
struct CollectArgs {
    /// Metric kinds to enable (comma separated); skips the configuration FIFO
    #[arg(short, long, value_delimiter = ',', global = true)]
    metrics: Vec<MetricKind>,

    /// Enable every metric kind; skips the configuration FIFO
    #[arg(long, global = true, conflicts_with = "metrics")]
    all: bool,

    /// Poll interval in seconds, used with --metrics/--all
    #[arg(short, long, default_value_t = DEFAULT_INTERVAL_SECS, global = true)]
    interval: u64,

    /// FIFO the configuration vector is read from
    #[arg(long, default_value = DEFAULT_CONFIG_FIFO, global = true)]
    config_fifo: PathBuf,

    /// FIFO the configuration vector is echoed to
    #[arg(long, default_value = DEFAULT_CONFIG_ACK_FIFO, global = true)]
    ack_fifo: PathBuf,

    /// Directory kernel pseudo-files are read from
    #[arg(long, default_value = DEFAULT_PROC_ROOT, global = true)]
    proc_root: PathBuf,

    /// Interface name prefix for network metrics (default: first non-loopback)
    #[arg(long, global = true)]
    net_interface: Option<String>,

    /// How per-second rates are normalized
    #[arg(long, value_enum, default_value_t = RateMode::Nominal, global = true)]
    rate_mode: RateMode,
}

#[derive(Args)]
struct ServeArgs {
    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Add permissive CORS headers
    #[arg(long)]
    cors: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_WEB_PORT,
            cors: false,
        }
    }
}

#[derive(Args)]
struct SnapshotArgs {
    /// Output format: json or pretty
    #[arg(short, long, default_value = "pretty")]
    format: String,
}

impl CollectArgs {
    fn config_source(&self) -> anyhow::Result<ConfigSource> {
        if self.all {
            return Ok(ConfigSource::Inline(ConfigVector::all(self.interval)?));
        }
        if !self.metrics.is_empty() {
            return Ok(ConfigSource::Inline(ConfigVector::from_kinds(
                &self.metrics,
                self.interval,
            )?));
        }
        Ok(ConfigSource::Channel {
            config: self.config_fifo.clone(),
            ack: self.ack_fifo.clone(),
        })
    }

    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::default()
            .with_proc_root(&self.proc_root)
            .with_net_interface(self.net_interface.clone())
            .with_rate_mode(self.rate_mode)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli.collect, args).await,
        Some(Commands::Snapshot(args)) => snapshot_command(&cli.collect, args).await,
        Some(Commands::Kinds) => {
            kinds_command();
            Ok(())
        }
        None => serve_command(&cli.collect, &ServeArgs::default()).await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

/// Resolve the configuration vector off the async runtime; FIFO opens block.
async fn resolve_config(source: ConfigSource) -> anyhow::Result<ConfigVector> {
    let vector = tokio::task::spawn_blocking(move || source.resolve())
        .await
        .context("configuration task panicked")?
        .context("failed to obtain configuration vector")?;
    Ok(vector)
}

async fn serve_command(collect: &CollectArgs, args: &ServeArgs) -> anyhow::Result<()> {
    info!("Starting syswatch...");

    let vector = resolve_config(collect.config_source()?).await?;
    if vector.enabled_kinds().is_empty() {
        warn!("No metric kinds enabled; the store will stay at its defaults");
    }

    let store = Arc::new(MetricStore::new());
    let cancel = CancellationToken::new();

    let collector = MetricsCollector::from_config(vector, &collect.collector_config(), store.clone());
    let collector_task = tokio::spawn(collector.run(cancel.clone()));

    let web_config = WebConfig::new(&args.host, args.port).with_cors(args.cors);
    info!("Web server configuration:");
    info!("  - Bind address: {}", web_config);
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Proc root: {}", collect.proc_root.display());

    tokio::spawn(cancel_on_signal(tokio::signal::ctrl_c(), cancel.clone()));

    let served = start_web_server(web_config, store, vector, cancel.clone()).await;
    // a server failure must stop the collector too
    cancel.cancel();

    let collected = collector_task.await.context("collector task panicked")?;
    served?;
    collected?;
    Ok(())
}

/// Cancel `token` once `signal` fires. If the signal cannot be listened for,
/// keep running; only an explicit shutdown or a server failure stops us.
async fn cancel_on_signal(
    signal: impl std::future::Future<Output = std::io::Result<()>>,
    token: CancellationToken,
) {
    match signal.await {
        Ok(()) => {
            info!("Shutdown requested");
            token.cancel();
        }
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}

async fn snapshot_command(collect: &CollectArgs, args: &SnapshotArgs) -> anyhow::Result<()> {
    let vector = resolve_config(collect.config_source()?).await?;
    let store = Arc::new(MetricStore::new());
    let mut collector =
        MetricsCollector::from_config(vector, &collect.collector_config(), store.clone());

    // the first poll only establishes baselines for rate metrics
    collector.poll_once()?;
    tokio::time::sleep(vector.interval()).await;
    collector.poll_once()?;

    let snapshot = store.read_all()?;
    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        "pretty" => print_pretty_snapshot(&snapshot, &vector),
        other => anyhow::bail!("Unsupported format: {other}. Use 'json' or 'pretty'"),
    }
    Ok(())
}

fn kinds_command() {
    for kind in MetricKind::ALL {
        println!(
            "{:>2}  {:<15} {:<28} {:?}",
            kind.index(),
            kind.short_name(),
            kind.metric_name(),
            kind.metric_type()
        );
    }
    println!("{:>2}  poll interval (seconds)", MetricKind::COUNT);
}

fn print_pretty_snapshot(snapshot: &StoreSnapshot, vector: &ConfigVector) {
    println!(
        "System Snapshot ({})",
        chrono::DateTime::from_timestamp_millis(snapshot.timestamp as i64)
            .unwrap_or_default()
            .format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("==========================================");
    for sample in &snapshot.metrics {
        let state = if vector.is_enabled(sample.kind) {
            ""
        } else {
            " (disabled)"
        };
        println!("  {:<28} {:>14.3}{}", sample.name, sample.value, state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["syswatch", "serve", "--port", "9090"]).unwrap();
        match cli.command {
            Some(Commands::Serve(args)) => assert_eq!(args.port, 9090),
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_default_values() {
        let cli = Cli::try_parse_from(["syswatch"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.collect.interval, DEFAULT_INTERVAL_SECS);
        assert_eq!(cli.collect.rate_mode, RateMode::Nominal);
        assert_eq!(
            cli.collect.config_source().unwrap(),
            ConfigSource::Channel {
                config: PathBuf::from(DEFAULT_CONFIG_FIFO),
                ack: PathBuf::from(DEFAULT_CONFIG_ACK_FIFO),
            }
        );
    }

    #[test]
    fn test_metrics_flag_builds_inline_vector() {
        let cli =
            Cli::try_parse_from(["syswatch", "--metrics", "cpu,net-rx-packets", "-i", "3"]).unwrap();
        let ConfigSource::Inline(vector) = cli.collect.config_source().unwrap() else {
            panic!("expected inline configuration");
        };
        assert_eq!(
            vector.enabled_kinds(),
            vec![MetricKind::CpuUsage, MetricKind::NetReceivedPackets]
        );
        assert_eq!(vector.interval_secs(), 3);
    }

    #[test]
    fn test_rate_mode_and_interface_flags() {
        let cli = Cli::try_parse_from([
            "syswatch",
            "snapshot",
            "--rate-mode",
            "measured",
            "--net-interface",
            "enp",
        ])
        .unwrap();
        assert_eq!(cli.collect.rate_mode, RateMode::Measured);
        assert_eq!(cli.collect.net_interface.as_deref(), Some("enp"));
        assert!(Cli::try_parse_from(["syswatch", "--rate-basis", "measured"]).is_err());
    }

    #[tokio::test]
    async fn test_signal_cancels_token() {
        let token = CancellationToken::new();
        cancel_on_signal(async { Ok(()) }, token.clone()).await;
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_signal_listener_failure_keeps_running() {
        let token = CancellationToken::new();
        let failed = async { Err(std::io::Error::new(std::io::ErrorKind::Other, "no handler")) };
        cancel_on_signal(failed, token.clone()).await;
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let cli = Cli::try_parse_from(["syswatch", "--all", "--interval", "0"]).unwrap();
        assert!(cli.collect.config_source().is_err());
    }
}
