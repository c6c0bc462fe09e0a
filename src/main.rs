use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use resource_counter::aws::{ClientRegistry, HttpTransport, JsonProtocolClient, ServiceClient};
use resource_counter::config::{self, Settings};
use resource_counter::metrics::{CloudWatchPublisher, LogPublisher, MetricPublisher};
use resource_counter::Orchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Count cloud resources and publish the counts as metrics
#[derive(Parser, Debug)]
#[command(name = "resource-counter", version, about, long_about = None)]
struct Args {
    /// Services document describing what to count
    #[arg(short, long, default_value = config::DEFAULT_SERVICES_FILE)]
    services: PathBuf,

    /// Region substituted into the endpoint template
    #[arg(short, long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Endpoint template; `{service}` and `{region}` are substituted
    #[arg(long, env = "RESOURCE_COUNTER_ENDPOINT", default_value = config::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Bearer token forwarded with every request
    #[arg(long, env = "RESOURCE_COUNTER_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    /// Number of resources fetched at the same time
    #[arg(long, default_value_t = 1)]
    concurrency: usize,

    /// Log the metrics instead of publishing them
    #[arg(long)]
    dry_run: bool,

    /// Log level (falls back to LOG_LEVEL, then info)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// LOG_LEVEL as accepted by the Lambda runtime; anything else means info
    fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").unwrap_or_default().to_uppercase().as_str() {
            "CRITICAL" | "ERROR" => LogLevel::Error,
            "WARNING" | "WARN" => LogLevel::Warn,
            "DEBUG" => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }
}

fn setup_logging(args: &Args) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let level = args.log_level.unwrap_or_else(LogLevel::from_env);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter()));

    let guard = match &args.log_file {
        Some(log_path) => {
            if let Some(parent) = log_path.parent() {
                let _ = std::fs::create_dir_all(parent);
            }

            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file);

            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
            None
        }
    };

    tracing::info!("resource-counter started with log level: {:?}", level);
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(&args)?;

    let settings = Settings {
        region: args.region.clone(),
        endpoint: args.endpoint.clone(),
        token: args.token.clone(),
        timeout: Duration::from_secs(args.timeout_secs),
        concurrency: args.concurrency,
        dry_run: args.dry_run,
    };

    // Step 1: Load the services document
    let configs = config::load_services(&args.services)?;
    tracing::info!("Loaded {} resource configurations", configs.len());

    // Step 2: One client per service
    let transport = HttpTransport::new(settings.timeout, settings.token.clone())?;
    let clients = ClientRegistry::build(configs.iter().map(|c| c.client.as_str()), |service| {
        let endpoint = settings.endpoint_for(service)?;
        Ok(Arc::new(JsonProtocolClient::for_service(transport.clone(), endpoint, service))
            as Arc<dyn ServiceClient>)
    })?;

    // Step 3: Count and publish
    let publisher: Box<dyn MetricPublisher> = if settings.dry_run {
        Box::new(LogPublisher)
    } else {
        Box::new(CloudWatchPublisher::new(transport, settings.endpoint_for("monitoring")?))
    };

    let metrics = Orchestrator::new(&clients, publisher.as_ref())
        .with_concurrency(settings.concurrency)
        .run(&configs)
        .await;

    println!("{}", serde_json::to_string_pretty(&metrics)?);

    Ok(())
}
