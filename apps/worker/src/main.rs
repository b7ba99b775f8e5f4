use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;

use uppe_worker::alerts::{LogMessenger, Messenger, TwilioCredentials, TwilioMessenger};
use uppe_worker::clock::SystemClock;
use uppe_worker::config::{AlertProvider, Config, LogFormatConfig};
use uppe_worker::database::FileCheckStore;
use uppe_worker::logs::FileLogStore;
use uppe_worker::monitoring::HttpProber;
use uppe_worker::service::{Collaborators, WorkerService};

#[derive(Debug, Parser)]
#[command(version, about = "Periodic HTTP/HTTPS health-check worker")]
struct Cli {
    /// Config file, defaults to $XDG_CONFIG_HOME/uppe-worker/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Run a single check cycle and log rotation, then exit
    #[arg(long)]
    once: bool,
}

fn messenger(config: &Config) -> Result<Arc<dyn Messenger>> {
    match config.alerts.provider {
        AlertProvider::Log => Ok(Arc::new(LogMessenger)),
        AlertProvider::Twilio => {
            let twilio = config
                .alerts
                .twilio
                .as_ref()
                .ok_or_else(|| anyhow!("alerts.provider is twilio but [alerts.twilio] is missing"))?;

            Ok(Arc::new(TwilioMessenger::new(TwilioCredentials {
                account_sid: twilio.account_sid.clone(),
                auth_token: twilio.auth_token.clone(),
                from_phone: twilio.from_phone.clone(),
                api_base: twilio.api_base.clone(),
            })))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_ref())?;

    let level: LevelFilter = config
        .logging
        .level
        .parse()
        .with_context(|| format!("invalid log level {:?}", config.logging.level))?;
    let format = config.logging.format.map(|format| match format {
        LogFormatConfig::Compact => logger::LogFormat::Compact,
        LogFormatConfig::Json => logger::LogFormat::Json,
    });
    logger::init_with(level, format);

    if cli.print_config {
        print!("{config}");
        return Ok(());
    }

    let service = WorkerService::new(
        &config.worker,
        Collaborators {
            store: Arc::new(FileCheckStore::new(&config.storage.data_dir)),
            logs: Arc::new(FileLogStore::new(&config.storage.logs_dir)),
            messenger: messenger(&config)?,
            prober: Arc::new(HttpProber::new()?),
            clock: Arc::new(SystemClock),
        },
    );

    if cli.once {
        let (cycle, rotation) = service.run_once().await;
        info!(
            "Single run finished: {} checks launched, {} logs rotated",
            cycle.map(|report| report.launched).unwrap_or_default(),
            rotation.rotated.len()
        );
        return Ok(());
    }

    let handle = service.start();
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    handle.stop().await;

    Ok(())
}
