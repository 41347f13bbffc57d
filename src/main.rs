use anyhow::Context;
use clap::{Parser, Subcommand};
use ctlab_rs::calibration::{self, DCG2_CALIBRATION_REGISTERS};
use ctlab_rs::{
    init_logger, log_info, log_warn, Ctlab, DeviceSlot, EngineConfig, RetryPolicy, SerialConfig,
    SerialTransport,
};
use std::path::PathBuf;
use std::time::Duration;

const CALIBRATION_PAUSE: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "ctlab-cli")]
#[command(about = "CLI tool for the c't-Lab instrument bus")]
struct Cli {
    #[arg(short, long, global = true, default_value = "/dev/ttyUSB0")]
    port: String,
    #[arg(short, long, global = true, default_value = "38400")]
    baudrate: u32,
    /// Give up after this many attempts per command (default: retry forever)
    #[arg(long, global = true)]
    max_attempts: Option<u32>,
    /// Fail a command when no answer line arrives within this time
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan bus indices 0..=8 and list the modules found
    Scan,
    /// Send a command and print the answer line
    Query { device: u8, command: String },
    /// Send a command and require an [OK] status
    Send { device: u8, command: String },
    /// Send a query and print the numeric value
    Read { device: u8, command: String },
    /// Dump calibration registers to a JSON file
    Download {
        #[arg(short, long, default_value = "dcg2")]
        slot: DeviceSlot,
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Write calibration registers from a JSON file
    Upload {
        #[arg(short, long, default_value = "dcg2")]
        slot: DeviceSlot,
        #[arg(short, long)]
        file: PathBuf,
    },
}

fn engine_config(cli: &Cli) -> EngineConfig {
    let mut retry = RetryPolicy::unbounded();
    if let Some(attempts) = cli.max_attempts {
        retry = retry.with_max_attempts(attempts);
    }
    let mut config = EngineConfig::default().with_retry(retry);
    if let Some(ms) = cli.timeout_ms {
        config = config.with_response_timeout(Duration::from_millis(ms));
    }
    config
}

fn open(cli: &Cli) -> anyhow::Result<Ctlab<SerialTransport>> {
    let serial = SerialConfig {
        baudrate: cli.baudrate,
        ..SerialConfig::default()
    };
    Ctlab::open_with_config(&cli.port, serial, engine_config(cli))
        .with_context(|| format!("failed to open {}", cli.port))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let cli = Cli::parse();
    let mut lab = open(&cli)?;

    match &cli.command {
        Commands::Scan => {
            let records = lab.discover(true).await.context("bus scan failed")?;
            for (slot, index) in lab.directory().assigned() {
                log_info(&format!("{slot:>5} -> index {index}"));
            }
            if records.is_empty() {
                log_warn("No devices answered");
            }
        }
        Commands::Query { device, command } => {
            let answer = lab.send_command_result_as_text(*device, command).await?;
            println!("{answer}");
        }
        Commands::Send { device, command } => {
            lab.send_command(*device, command).await?;
            log_info("OK");
        }
        Commands::Read { device, command } => {
            let value = lab.read_value(*device, command).await?;
            println!("{value}");
        }
        Commands::Download { slot, file } => {
            lab.discover(false).await.context("bus scan failed")?;
            let snapshot = calibration::download(
                &mut lab,
                *slot,
                DCG2_CALIBRATION_REGISTERS,
                CALIBRATION_PAUSE,
            )
            .await
            .context("calibration download failed")?;
            snapshot
                .save(file)
                .with_context(|| format!("failed to write {}", file.display()))?;
            log_info(&format!("Saved {} sections to {}", snapshot.len(), file.display()));
        }
        Commands::Upload { slot, file } => {
            let snapshot = calibration::CalibrationSnapshot::load(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            lab.discover(false).await.context("bus scan failed")?;
            let written = calibration::upload(&mut lab, *slot, &snapshot, CALIBRATION_PAUSE)
                .await
                .context("calibration upload failed")?;
            log_info(&format!("Wrote {written} registers"));
        }
    }

    Ok(())
}
