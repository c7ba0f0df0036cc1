// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;
mod monitor;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};

use sdrx_app::{init_logging, ConfigFile};
use sdrx_core::{
    AudioFilterBw, Command, CommandCatalog, ComplexPooledBuf, DynResult, MailboxRegistry,
    ModulationType, StageOutcome, ThreadRegistry, CMD_MAILBOX,
};
use sdrx_rx::{
    AudioIfc, BaseBandRx, FileAudio, IfSourceStage, NullAudio, SpectrumFrame, SpectrumMonitor,
    RX_MAILBOX, SPECTRUM_MAILBOX,
};

use config::{AudioSink, ServerConfig};
use monitor::CommandMonitor;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - software defined receiver");

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// Initial demodulation mode (LSB, USB, CW_U, CW_L, AM, WBFM, NBFM)
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,
    /// Initial audio filter (BW_100, BW_500, BW_2000, BW_6000, BW_PASS, BW_WSPR)
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,
    /// Stop automatically after this many seconds
    #[arg(short = 'd', long = "duration", value_name = "SECS")]
    duration: Option<u64>,
}

fn parse_mode(name: &str) -> DynResult<ModulationType> {
    ModulationType::ALL
        .into_iter()
        .find(|m| m.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("Unknown mode '{}'", name).into())
}

fn parse_filter(name: &str) -> DynResult<AudioFilterBw> {
    AudioFilterBw::ALL
        .into_iter()
        .find(|f| f.as_str().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("Unknown audio filter '{}'", name).into())
}

fn open_audio(cfg: &ServerConfig) -> DynResult<Box<dyn AudioIfc>> {
    let rate = cfg.rx.audio_sample_rate;
    let audio: Box<dyn AudioIfc> = match cfg.audio.sink {
        AudioSink::Null => Box::new(NullAudio::new(
            rate,
            cfg.audio.device_buffers * cfg.rx.audio_buffer_size,
        )),
        AudioSink::File => {
            let path = cfg
                .audio
                .path
                .as_deref()
                .ok_or("[audio].path must be set for the file sink")?;
            info!("Writing audio to {}", path.display());
            Box::new(FileAudio::create(path, rate)?)
        }
    };
    Ok(audio)
}

/// Create the mailboxes and register every stage. Consumers are added
/// before the source so they are subscribed when samples start flowing.
fn build_pipeline(cfg: &ServerConfig, mailboxes: &MailboxRegistry) -> DynResult<ThreadRegistry> {
    mailboxes.create::<ComplexPooledBuf>(RX_MAILBOX)?;
    if cfg.spectrum.enabled {
        mailboxes.create::<SpectrumFrame>(SPECTRUM_MAILBOX)?;
    }

    let mut registry = ThreadRegistry::new();
    registry.add(Box::new(CommandMonitor::new()));
    registry.add(Box::new(BaseBandRx::new(cfg.rx.clone(), open_audio(cfg)?)?));
    if cfg.spectrum.enabled {
        registry.add(Box::new(SpectrumMonitor::new(
            cfg.rx.rf_sample_rate,
            cfg.spectrum.clone(),
        )?));
    }
    let source = cfg.source.open(cfg.rx.rf_sample_rate)?;
    registry.add(Box::new(IfSourceStage::new(
        source,
        cfg.rx.rf_sample_rate,
        cfg.rx.rf_buffer_size,
    )?));
    Ok(registry)
}

async fn wait_for_stop(duration: Option<u64>) -> DynResult<()> {
    match duration {
        Some(secs) => {
            tokio::select! {
                res = signal::ctrl_c() => {
                    res?;
                    info!("Ctrl+C received, shutting down");
                }
                _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                    info!("Run time of {} s elapsed, shutting down", secs);
                }
            }
        }
        None => {
            signal::ctrl_c().await?;
            info!("Ctrl+C received, shutting down");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_combined_toml()?);
        return Ok(());
    }

    // Validated on load; the mode and filter overrides cannot break it.
    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    if let Some(ref mode) = cli.mode {
        cfg.rx.mode = parse_mode(mode)?;
    }
    if let Some(ref filter) = cli.filter {
        cfg.rx.filter = parse_filter(filter)?;
    }

    init_logging(cfg.general.log_level.as_deref());

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }
    info!(
        "Starting sdrx-server (rf: {} Hz x {}, audio: {} Hz x {}, mode: {}, filter: {})",
        cfg.rx.rf_sample_rate,
        cfg.rx.rf_buffer_size,
        cfg.rx.audio_sample_rate,
        cfg.rx.audio_buffer_size,
        cfg.rx.mode,
        cfg.rx.filter
    );

    // Reject bad startup commands before any thread is running.
    let catalog = CommandCatalog::new();
    let startup: Vec<Command> = cfg
        .startup_commands
        .iter()
        .map(|line| {
            catalog
                .parse(line)
                .map_err(|e| format!("startup command '{}': {}", line, e))
        })
        .collect::<Result<_, _>>()?;

    let mailboxes = MailboxRegistry::new();
    let cmd = mailboxes.create::<Command>(CMD_MAILBOX)?;
    let mut registry = build_pipeline(&cfg, &mailboxes)?;
    registry.subscribe_all(&mailboxes)?;
    registry.start_all()?;
    info!("Running stages: {}", registry.names().join(", "));

    for c in startup {
        info!("startup: {}", c);
        cmd.put(c);
    }

    wait_for_stop(cli.duration).await?;

    // Joining blocks until every stage has seen STOP.
    let outcomes = tokio::task::spawn_blocking(move || registry.shutdown(&cmd)).await?;
    let mut failed = 0;
    for (name, outcome) in outcomes {
        match outcome {
            StageOutcome::Completed => info!("{} stopped", name),
            StageOutcome::Failed(reason) => {
                failed += 1;
                warn!("{} failed: {}", name, reason);
            }
            StageOutcome::Panicked(reason) => {
                failed += 1;
                error!("{} panicked: {}", name, reason);
            }
        }
    }
    if failed > 0 {
        return Err(format!("{} stage(s) ended abnormally", failed).into());
    }
    Ok(())
}
