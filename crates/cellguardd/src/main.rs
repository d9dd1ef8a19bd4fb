//! cellguardd — the cellguard watchdog daemon.
//!
//! Polls a cellular router over its local HTTP control endpoint, and
//! when the 5G radio stays down past the grace window, logs in and
//! reboots the router. Status is shown on a terminal dashboard, or
//! logged when running headless.
//!
//! # Usage
//!
//! ```text
//! cellguardd run --host 192.168.0.1 --username admin --password-hash <md5>
//! cellguardd run --headless --config /etc/cellguard.toml
//! cellguardd probe
//! cellguardd print-config
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cellguard_core::{ChannelSink, EventSink, NullSink, WatchdogConfig};
use cellguard_dashboard::{run_dashboard, run_headless};
use cellguard_gateway::{HyperTransport, RequestExecutor, build_monitor_payload, evaluate};
use cellguard_recovery::Watchdog;

const DEFAULT_CONFIG: &str = "cellguard.toml";

#[derive(Parser)]
#[command(name = "cellguardd", about = "Cellular router watchdog", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Watch the router and recover it when 5G drops.
    Run {
        #[command(flatten)]
        args: ConfigArgs,

        /// Log to stdout instead of drawing the dashboard.
        #[arg(long)]
        headless: bool,

        /// Write tracing output here while the dashboard owns the terminal.
        #[arg(long)]
        log_file: Option<PathBuf>,
    },
    /// Send one status poll and print the evaluated signal state as JSON.
    Probe {
        #[command(flatten)]
        args: ConfigArgs,
    },
    /// Print the effective configuration (credentials omitted).
    PrintConfig {
        #[command(flatten)]
        args: ConfigArgs,
    },
}

#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CELLGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Router address, overrides `IP`.
    #[arg(long)]
    host: Option<String>,

    /// Admin user name, overrides `UNICOM_USER`.
    #[arg(long)]
    username: Option<String>,

    /// Hashed admin password, overrides `PASSWORD_HASH`.
    #[arg(long)]
    password_hash: Option<String>,

    /// Debug-level logging, same as `DEBUG=Yes`.
    #[arg(long, short)]
    verbose: bool,
}

/// Where tracing output goes.
enum LogOutput {
    Stdout,
    File(PathBuf),
    Discard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            args,
            headless,
            log_file,
        } => {
            let config = load_config(&args)?;
            let output = match (headless, log_file) {
                (true, _) => LogOutput::Stdout,
                (false, Some(path)) => LogOutput::File(path),
                (false, None) => LogOutput::Discard,
            };
            init_tracing(config.device.verbose, output)?;
            run(config, headless).await
        }
        Command::Probe { args } => {
            let config = load_config(&args)?;
            init_tracing(config.device.verbose, LogOutput::Stdout)?;
            probe(&config).await
        }
        Command::PrintConfig { args } => {
            let config = load_config(&args)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

/// File (or defaults), then environment, then command line.
fn load_config(args: &ConfigArgs) -> anyhow::Result<WatchdogConfig> {
    let mut config = match &args.config {
        Some(path) => WatchdogConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            WatchdogConfig::from_file(Path::new(DEFAULT_CONFIG))
                .with_context(|| format!("loading {DEFAULT_CONFIG}"))?
        }
        None => WatchdogConfig::default(),
    };

    config.apply_env(|key| std::env::var(key).ok());

    if let Some(host) = &args.host {
        config.device.host = host.clone();
    }
    if let Some(username) = &args.username {
        config.device.username = username.clone();
    }
    if let Some(hash) = &args.password_hash {
        config.device.password_hash = hash.clone();
    }
    if args.verbose {
        config.device.verbose = true;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn init_tracing(verbose: bool, output: LogOutput) -> anyhow::Result<()> {
    let default = if verbose {
        "info,cellguard=debug"
    } else {
        "info,cellguard=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match output {
        LogOutput::Stdout => builder.init(),
        LogOutput::File(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        LogOutput::Discard => builder.with_writer(std::io::sink).init(),
    }
    Ok(())
}

fn build_executor(
    config: &WatchdogConfig,
    sink: Arc<dyn EventSink>,
) -> anyhow::Result<RequestExecutor> {
    let transport = HyperTransport::new(&config.device.endpoint(), config.device.connect_timeout)
        .context("building router transport")?;
    Ok(RequestExecutor::new(
        Arc::new(transport),
        config.retry.clone(),
        sink,
    ))
}

async fn run(config: WatchdogConfig, headless: bool) -> anyhow::Result<()> {
    let credentials = config.device.credentials();
    if credentials.username.is_empty() || credentials.password_hash.is_empty() {
        warn!("router credentials not set, recovery logins will be rejected");
    }

    let (sink, events) =
        ChannelSink::channel(config.dashboard.event_buffer, config.device.verbose);
    let sink: Arc<dyn EventSink> = Arc::new(sink);
    let executor = build_executor(&config, sink.clone())?;
    let watchdog = Watchdog::new(executor, config.recovery.clone(), credentials, sink);

    info!(
        endpoint = %config.device.endpoint(),
        grace = ?config.recovery.grace_period,
        byte_tolerance = config.recovery.byte_tolerance,
        trigger = ?config.recovery.trigger,
        "starting cellguard"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let shutdown_tx = Arc::new(shutdown_tx);

    let watchdog_handle = tokio::spawn(watchdog.run(shutdown_rx.clone()));

    let signal_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("shutdown signal received");
        let _ = signal_tx.send(true);
    });

    let frontend = if headless {
        run_headless(events, shutdown_rx.clone()).await;
        Ok(())
    } else {
        run_dashboard(
            events,
            config.dashboard.clone(),
            shutdown_tx.clone(),
            shutdown_rx.clone(),
        )
        .await
        .context("terminal dashboard failed")
    };

    let _ = shutdown_tx.send(true);
    watchdog_handle.await.context("watchdog task panicked")?;
    info!("cellguard stopped");
    frontend
}

async fn probe(config: &WatchdogConfig) -> anyhow::Result<()> {
    let executor = build_executor(config, Arc::new(NullSink))?;
    let envelope = executor
        .execute(&build_monitor_payload())
        .await
        .context("status poll failed")?;
    let signal = evaluate(&envelope)
        .map_err(|reason| anyhow::anyhow!("status reply unusable: {reason}"))?;
    println!("{}", serde_json::to_string_pretty(&signal)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "cellguardd",
            "run",
            "--host",
            "10.0.0.1",
            "--username",
            "admin",
            "--headless",
            "-v",
        ])
        .unwrap();
        match cli.command {
            Command::Run { args, headless, log_file } => {
                assert_eq!(args.host.as_deref(), Some("10.0.0.1"));
                assert_eq!(args.username.as_deref(), Some("admin"));
                assert!(args.verbose);
                assert!(headless);
                assert!(log_file.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn cli_parses_probe_and_print_config() {
        assert!(matches!(
            Cli::try_parse_from(["cellguardd", "probe"]).unwrap().command,
            Command::Probe { .. }
        ));
        assert!(matches!(
            Cli::try_parse_from(["cellguardd", "print-config", "--host", "h"])
                .unwrap()
                .command,
            Command::PrintConfig { .. }
        ));
    }

    #[test]
    fn cli_flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellguard.toml");
        std::fs::write(
            &path,
            "[device]\nhost = \"192.168.8.1\"\n\n[recovery]\ngrace_period = \"30s\"\n",
        )
        .unwrap();

        let args = ConfigArgs {
            config: Some(path),
            host: Some("10.1.1.1".into()),
            username: None,
            password_hash: Some("abc".into()),
            verbose: true,
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.device.host, "10.1.1.1");
        assert_eq!(config.device.password_hash, "abc");
        assert_eq!(config.recovery.grace_period.as_secs(), 30);
        assert!(config.device.verbose);
    }

    #[test]
    fn empty_host_is_rejected() {
        let args = ConfigArgs {
            config: None,
            host: Some("  ".into()),
            username: None,
            password_hash: None,
            verbose: false,
        };
        assert!(load_config(&args).is_err());
    }
}
