mod config;
mod engine;
mod error;
mod platform;
mod store;
mod variables;

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};

use config::ConfigManager;
use engine::ExpansionEngine;
use platform::{KeyboardMonitor, LinuxBackend, YdotoolOutput};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let args = parse_args()?;
    if args.help {
        print_usage();
        return Ok(());
    }

    log::info!("Starting qsnip expansion service");

    check_prerequisites().await?;

    let (config_manager, mut reload_rx) =
        ConfigManager::new(args.config).context("Failed to initialize configuration")?;
    let settings = config_manager.settings()?;
    log::info!("Using snippets from {}", config_manager.path().display());

    let backend = LinuxBackend::new(
        KeyboardMonitor::new(settings.layout.clone()),
        YdotoolOutput::new(settings.keystroke_delay_ms, settings.ydotool_socket.clone()),
    );
    let config_manager = Arc::new(config_manager);
    let engine = Arc::new(ExpansionEngine::new(config_manager.clone(), Arc::new(backend))?);

    engine
        .start()
        .context("Could not listen to the keyboard. Is the user in the 'input' group?")?;
    let mut enabled = settings.enabled;
    if !enabled {
        engine.pause();
    }

    let mut pause_signal = signal(SignalKind::user_defined1())?;
    let mut resume_signal = signal(SignalKind::user_defined2())?;
    let mut refresh_signal = signal(SignalKind::hangup())?;
    let mut term_signal = signal(SignalKind::terminate())?;

    loop {
        tokio::select! {
            Some(()) = reload_rx.recv() => reload(&engine, &config_manager, &mut enabled),
            _ = refresh_signal.recv() => refresh(&engine),
            _ = pause_signal.recv() => {
                engine.pause();
                log::info!("Engine state: {:?}", engine.state());
            }
            _ = resume_signal.recv() => {
                engine.resume();
                log::info!("Expansion active: {}", engine.is_active());
            }
            _ = term_signal.recv() => break,
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    log::info!("Shutting down");
    engine.stop();
    Ok(())
}

fn refresh(engine: &ExpansionEngine) {
    if let Err(e) = engine.refresh() {
        log::error!("Failed to reload snippets, keeping the previous set: {}", e);
    }
}

/// Apply a changed config file: snippets always, `enabled` when it flipped
///
/// Layout, keystroke delay and socket are read once at startup.
fn reload(engine: &ExpansionEngine, config: &ConfigManager, enabled: &mut bool) {
    refresh(engine);

    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to reload settings: {:#}", e);
            return;
        }
    };

    if settings.enabled != *enabled {
        *enabled = settings.enabled;
        if settings.enabled {
            engine.resume();
        } else {
            engine.pause();
        }
    }
}

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    help: bool,
}

fn parse_args() -> Result<Args> {
    let mut parsed = Args::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => parsed.help = true,
            "-c" | "--config" => {
                let path = args.next().context("--config needs a path")?;
                parsed.config = Some(PathBuf::from(path));
            }
            other => anyhow::bail!("Unknown argument: {other} (see --help)"),
        }
    }

    Ok(parsed)
}

/// Check that all prerequisites are met
async fn check_prerequisites() -> Result<()> {
    YdotoolOutput::check_availability()
        .await
        .context("ydotool is required to send expansions")?;

    check_input_group()?;
    Ok(())
}

/// Check if user is in the input group
fn check_input_group() -> Result<()> {
    let groups_output = Command::new("groups")
        .output()
        .context("Failed to check user groups")?;

    let groups = String::from_utf8_lossy(&groups_output.stdout);

    if !groups.split_whitespace().any(|g| g == "input") {
        log::warn!(
            "User may not be in 'input' group. If keyboard monitoring fails, run:\n\
             sudo usermod -aG input $USER\n\
             Then log out and back in."
        );
    }

    Ok(())
}

fn print_usage() {
    eprintln!(
        r#"qsnip - snippet expansion service

USAGE:
    qsnip [OPTIONS]

OPTIONS:
    -h, --help           Show this help message
    -c, --config PATH    Snippet file (default: ~/.config/qsnip/snippets.yaml)

CONTROL:
    SIGUSR1   pause expansion
    SIGUSR2   resume expansion
    SIGHUP    reload snippets

    Saving the snippet file reloads snippets and applies `enabled`.
    layout, keystroke_delay_ms and ydotool_socket need a restart.

PLACEHOLDERS:
    {{date}} {{date_long}} {{time}} {{time_ampm}} {{datetime}}
    {{weekday}} {{month}} {{year}} {{greeting}} {{location}}

NESTING:
    {{/trigger}} inlines another snippet (up to 5 levels deep)
"#
    );
}
