use anyhow::Context;
use clap::Parser;
use mdb_changer::logging::log_error;
use mdb_changer::{connect, init_logger, log_info, start_controller, ControllerConfig, MdbError};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "mdb-changer")]
#[command(about = "Coin changer controller for MDB bus adapters")]
struct Cli {
    /// Serial port of the bus adapter
    #[arg(short, long)]
    port: Option<String>,
    /// Log every adapter exchange
    #[arg(short, long)]
    verbose: bool,
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(long)]
    baudrate: Option<u32>,
    /// Response timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Credit needed for one token
    #[arg(long)]
    token_cost: Option<i64>,
}

fn load_config(cli: &Cli) -> anyhow::Result<ControllerConfig> {
    let mut config = match &cli.config {
        Some(path) => ControllerConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ControllerConfig::default(),
    };

    if let Some(baudrate) = cli.baudrate {
        config.serial.baudrate = baudrate;
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config.serial.timeout_ms = timeout_ms;
    }
    if let Some(cost) = cli.token_cost {
        config.token.cost = cost;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn run(port: &str, config: &ControllerConfig) -> Result<(), MdbError> {
    let transport = connect(port, &config.serial_config()).await?;
    let mut controller = start_controller(transport, config).await?;

    controller
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::warn!("Ctrl-C handler unavailable: {e}");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let Some(port) = cli.port.as_deref() else {
        log_error("No serial port given, use -p <port>");
        return ExitCode::from(1);
    };

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            log_error(&format!("{e:#}"));
            return ExitCode::from(1);
        }
    };

    match run(port, &config).await {
        Ok(()) => {
            log_info("Controller stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log_error(&format!("Fatal: {e}"));
            ExitCode::from(2)
        }
    }
}
