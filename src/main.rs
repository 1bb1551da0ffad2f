//! Command-line front end: sends one string through the engine.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use keysend::platform::Platform;
use keysend::{AppConfig, RecordingPlatform, SendMode, SendOptions, SendRawMode, Sender};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "keysend", about = "Synthesize keyboard and mouse input", version)]
struct Cli {
    /// Text in the send mini-language
    text: String,

    /// Path to the config file
    #[arg(long, value_name = "PATH", default_value = "Config.toml")]
    config: PathBuf,

    /// Send mode (Event, Input, Play, InputThenPlay)
    #[arg(long)]
    mode: Option<SendMode>,

    /// Treat ^+!# literally
    #[arg(long, conflicts_with = "text_mode")]
    raw: bool,

    /// Treat everything literally
    #[arg(long = "text", id = "text_mode")]
    text_mode: bool,

    /// Record events instead of injecting them, then print them
    #[arg(long)]
    dry_run: bool,

    /// Log level for this crate (error|warn|info|debug|trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(format!("keysend={}", level.to_ascii_lowercase())),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keysend=info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn send<P: Platform>(sender: &mut Sender<P>, cli: &Cli) -> Result<()> {
    let raw = if cli.text_mode {
        SendRawMode::RawText
    } else if cli.raw {
        SendRawMode::Raw
    } else {
        SendRawMode::NotRaw
    };
    sender
        .send_with(
            &cli.text,
            SendOptions {
                raw,
                mode: cli.mode,
                target: None,
            },
        )
        .context("send failed")
}

fn dry_run(config: &AppConfig, cli: &Cli) -> Result<()> {
    let mut sender = Sender::from_config(RecordingPlatform::new(), config)?;
    send(&mut sender, cli)?;
    for event in sender.platform().events() {
        println!("{}", event);
    }
    Ok(())
}

#[cfg(windows)]
fn live(config: &AppConfig, cli: &Cli) -> Result<()> {
    use keysend::platform::{Win32Platform, hook::KeyboardHook};
    use windows::Win32::Media::timeBeginPeriod;

    // Request 1ms timer resolution for precise key delays
    unsafe { timeBeginPeriod(1) };
    KeyboardHook::spawn()?;

    let mut sender = Sender::from_config(Win32Platform::new(), config)?;
    send(&mut sender, cli)
}

#[cfg(not(windows))]
fn live(config: &AppConfig, cli: &Cli) -> Result<()> {
    info!("no input backend on this platform; recording instead");
    dry_run(config, cli)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    // Load config or create default if not exists
    let config = AppConfig::load_or_create(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    info!(mode = %config.send_mode, level = config.send_level, "configuration loaded");

    if cli.dry_run {
        dry_run(&config, &cli)
    } else {
        live(&config, &cli)
    }
}
