use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use mt_cli::cli::{self, Cli, Command, ConfigCommand};
use mt_domain::config::{Config, LoggingConfig};
use mt_hooks::{IngestLogLayer, Telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, config_path) = cli::load_config()?;

    match cli.command {
        Command::Config(cmd) => run_config(cmd, &config, &config_path),
        command => run_with_telemetry(config, command, &config_path).await,
    }
}

fn run_config(cmd: ConfigCommand, config: &Config, config_path: &str) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Validate => {
            if !cli::config::validate(config, config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        ConfigCommand::Show => cli::config::show(config),
    }
}

/// Boot the SDK, run one API command, and flush everything on the way out,
/// including when interrupted with Ctrl-C.
async fn run_with_telemetry(
    config: Config,
    command: Command,
    config_path: &str,
) -> anyhow::Result<()> {
    let log_rx = init_tracing(&config);
    let telemetry = Telemetry::start(config, log_rx).await?;

    let result = tokio::select! {
        res = dispatch(&telemetry, command, config_path) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("received SIGINT, flushing before exit");
            Ok(())
        }
    };

    let report = telemetry.shutdown().await;
    if report.records.retained > 0 || report.logs.is_some_and(|l| l.retained > 0) {
        tracing::warn!(?report, "some telemetry could not be delivered");
    }
    result
}

async fn dispatch(telemetry: &Telemetry, command: Command, config_path: &str) -> anyhow::Result<()> {
    let client = telemetry.client();
    let namespace = telemetry.config().sessions.namespace.clone();

    match command {
        Command::Ping => {
            if client.test_connection().await {
                println!("Connection OK ({})", client.base_url());
                Ok(())
            } else {
                anyhow::bail!("connection test against {} failed", client.base_url())
            }
        }
        Command::Session {
            user,
            force_new,
            namespace,
        } => cli::session::resolve(telemetry, &user, namespace, force_new).await,
        Command::UploadRecords { file } => cli::upload::records(client, &file).await,
        Command::UploadLogs { file, namespace } => {
            cli::upload::logs(client, &file, &namespace).await
        }
        Command::QueryRecords(args) => {
            cli::query::records(&**client, args.into_query(&namespace)).await
        }
        Command::QueryLogs(args) => {
            cli::query::logs(&**client, args.into_query(&namespace)).await
        }
        Command::Config(cmd) => run_config(cmd, telemetry.config(), config_path),
    }
}

/// Initialize stderr tracing.  `RUST_LOG` overrides `logging.filter`.
///
/// When `logging.forward_logs` is on, an [`IngestLogLayer`] is added and the
/// receiving end of its channel is returned for the telemetry runtime.
fn init_tracing(cfg: &Config) -> Option<tokio::sync::mpsc::UnboundedReceiver<mt_domain::records::LogEntry>> {
    let logging: &LoggingConfig = &cfg.logging;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    let (forward, rx) = if logging.forward_logs {
        let (layer, rx) = IngestLogLayer::new(logging, cfg.sessions.namespace.clone());
        (Some(layer), Some(rx))
    } else {
        (None, None)
    };

    let registry = tracing_subscriber::registry().with(env_filter).with(forward);
    if logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
    rx
}
