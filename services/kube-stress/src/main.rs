//! kube-stress CLI.
//!
//! Generates list load against a Kubernetes API server:
//! - Fixed request rate over a pool of independent clients
//! - Stops after a fixed duration or on SIGINT/SIGTERM
//! - Optional CSV output of per-request latencies

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use stress_common::ResultSink;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn, Level};
use tracing_subscriber::filter::{EnvFilter, LevelFilter};

use kube_stress::{
    termination_signals, CancellationController, ClientPool, CsvSink, Dispatcher, Kubeconfig,
    ListConfig, OutputFormat, ResultsReport, RunReport,
};

#[derive(Parser)]
#[command(name = "kube-stress")]
#[command(about = "Load testing tool for Kubernetes API servers", long_about = None)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Log level: trace, debug, info, warn, error (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args, Debug)]
struct ConnectionArgs {
    /// Path to the kubeconfig file (default: $HOME/.kube/config)
    #[arg(long, global = true, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    #[arg(long, global = true)]
    context: Option<String>,

    /// API server URL to use directly, skipping the kubeconfig
    #[arg(long, global = true)]
    server: Option<String>,

    /// Bearer token, overrides the one from the kubeconfig
    #[arg(long, global = true, env = "KUBE_STRESS_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue list calls at a fixed rate for a fixed duration
    List(ListArgs),
}

#[derive(Args, Debug)]
struct ListArgs {
    /// Scenario YAML file; flags given here override its values
    #[arg(short, long)]
    scenario: Option<PathBuf>,

    /// Namespace to list from, empty for all namespaces [default: kube-stress]
    #[arg(long)]
    namespace: Option<String>,

    /// Object type to list [default: configmaps]
    #[arg(long)]
    object_type: Option<String>,

    /// Page size of each list call, 0 for no pagination [default: 0]
    #[arg(long)]
    page_size: Option<u32>,

    /// Number of clients to issue list calls from [default: 10]
    #[arg(long)]
    num_clients: Option<usize>,

    /// List calls per second [default: 2]
    #[arg(long)]
    qps: Option<f64>,

    /// How long to issue list calls for, e.g. 5m or 90s [default: 5m]
    #[arg(long, value_parser = humantime::parse_duration)]
    total_duration: Option<Duration>,

    /// Deadline of a single list call [default: 60s]
    #[arg(long, value_parser = humantime::parse_duration)]
    request_timeout: Option<Duration>,

    /// CSV file to write the latency of every successful call to
    #[arg(long)]
    csv_output_filepath: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Log)]
    output: OutputFormat,
}

impl ListArgs {
    /// Scenario file (or defaults) with the given flags applied on top.
    fn to_config(&self) -> Result<ListConfig> {
        let mut config = match &self.scenario {
            Some(path) => ListConfig::from_file(path)
                .with_context(|| format!("failed to load scenario {}", path.display()))?,
            None => ListConfig::default(),
        };

        if let Some(namespace) = &self.namespace {
            config.namespace = namespace.clone();
        }
        if let Some(object_type) = &self.object_type {
            config.object_type = object_type.clone();
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if let Some(num_clients) = self.num_clients {
            config.num_clients = num_clients;
        }
        if let Some(qps) = self.qps {
            config.qps = qps;
        }
        if let Some(total_duration) = self.total_duration {
            config.total_duration = total_duration;
        }
        if let Some(request_timeout) = self.request_timeout {
            config.request_timeout = request_timeout;
        }
        if let Some(path) = &self.csv_output_filepath {
            config.csv_output_filepath = Some(path.clone());
        }

        Ok(config)
    }
}

impl ConnectionArgs {
    fn resolve(&self) -> Result<Kubeconfig> {
        let mut kubeconfig = match &self.server {
            Some(server) => Kubeconfig::for_server(server.clone(), None),
            None => {
                let path = match &self.kubeconfig {
                    Some(path) => path.clone(),
                    None => Kubeconfig::default_path()?,
                };
                Kubeconfig::from_file_with_context(&path, self.context.as_deref())
                    .with_context(|| format!("failed to load kubeconfig {}", path.display()))?
            }
        };

        if let Some(token) = &self.token {
            kubeconfig.token = Some(token.clone());
        }
        Ok(kubeconfig)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format)?;

    match cli.command {
        Commands::List(args) => run_list(&cli.connection, &args).await,
    }
}

fn init_tracing(log_level: &str, format: LogFormat) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))
}

async fn run_list(connection: &ConnectionArgs, args: &ListArgs) -> Result<()> {
    let config = args.to_config()?;
    config.validate().context("invalid list configuration")?;
    let dispatch_config = config.dispatch_config()?;

    let kubeconfig = connection.resolve()?;
    let pool = ClientPool::from_kubeconfig(&kubeconfig, config.num_clients)
        .context("failed to create API clients")?;

    let mut dispatcher = Dispatcher::new(dispatch_config);
    let sink = match &config.csv_output_filepath {
        Some(path) => {
            let sink = Arc::new(
                CsvSink::create(path)
                    .with_context(|| format!("failed to create {}", path.display()))?,
            );
            dispatcher = dispatcher.with_sink(sink.clone());
            Some(sink)
        }
        None => None,
    };

    let ctx = CancellationToken::new();
    let signals = termination_signals().context("failed to install signal handlers")?;
    let controller = CancellationController::attach(ctx.clone(), signals);

    info!(
        server = %kubeconfig.server,
        namespace = %config.namespace,
        object_type = %config.object_type,
        page_size = config.page_size,
        num_clients = pool.count(),
        qps = config.qps,
        total_duration = ?config.total_duration,
        "Listing objects"
    );

    let start = Instant::now();
    let summary = dispatcher.run(&ctx, &pool).await;
    let elapsed = start.elapsed();
    let cancelled = ctx.is_cancelled();
    controller.shutdown().await;

    if let Some(sink) = &sink {
        if let Err(e) = sink.flush() {
            warn!(error = %e, path = %sink.path().display(), "Failed to flush CSV output");
        }
    }

    info!("{}", summary);

    let report = RunReport::new(&config, summary, elapsed, cancelled);
    match args.output {
        OutputFormat::Log => {}
        OutputFormat::Table => println!("{}", ResultsReport::format_table(&report)),
        OutputFormat::Json => println!("{}", ResultsReport::format_json(&report)?),
    }

    Ok(())
}
