use clap::{Parser, ValueEnum};
use pkg_api::server::{ServerConfig, start_server};
use pkg_constants::lease::DEFAULT_SWEEP_INTERVAL_SECS;
use pkg_constants::network::DEFAULT_API_PORT;
use pkg_constants::paths::{DEFAULT_SERVER_CONFIG, DEFAULT_SERVER_DATA_DIR};
use pkg_types::config::{ServerConfigFile, load_config_file};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "leasehold-server", about = "leasehold lease server")]
struct Cli {
    /// Path to YAML config file
    #[arg(long, short, default_value = DEFAULT_SERVER_CONFIG)]
    config: String,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Directory for SlateDB state storage
    #[arg(long)]
    data_dir: Option<String>,

    /// Seconds between expiry sweeps
    #[arg(long)]
    sweep_interval_secs: Option<u64>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config file (returns defaults if file not found)
    let file_cfg: ServerConfigFile = load_config_file(&cli.config)?;

    let log_format = match cli.log_format {
        Some(f) => f,
        None => match file_cfg.log_format.as_deref() {
            Some("json") => LogFormat::Json,
            Some("text") | None => LogFormat::Text,
            Some(other) => anyhow::bail!("unknown log-format '{}' in {}", other, cli.config),
        },
    };
    init_logging(log_format);
    info!("Config file: {}", cli.config);

    // Merge: CLI args > config file > defaults
    let port = cli.port.or(file_cfg.port).unwrap_or(DEFAULT_API_PORT);
    let data_dir = cli
        .data_dir
        .or(file_cfg.data_dir)
        .unwrap_or_else(|| DEFAULT_SERVER_DATA_DIR.to_string());
    let sweep_secs = cli
        .sweep_interval_secs
        .or(file_cfg.sweep_interval_secs)
        .unwrap_or(DEFAULT_SWEEP_INTERVAL_SECS);
    anyhow::ensure!(sweep_secs > 0, "sweep interval must be at least 1 second");

    info!("Starting leasehold-server");
    info!("  Port:           {}", port);
    info!("  Data dir:       {}", data_dir);
    info!("  Sweep interval: {}s", sweep_secs);

    let config = ServerConfig {
        addr: SocketAddr::from(([0, 0, 0, 0], port)),
        data_dir,
        sweep_interval: Duration::from_secs(sweep_secs),
    };

    start_server(config).await?;

    Ok(())
}
