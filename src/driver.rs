//! Command-line replay driver: feeds a navigation script through a tracker.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::{io::Read, path::PathBuf, time::Duration};

use crate::{
    environment::HostEnvironment,
    log_warn,
    settings::{SettingsStore, TrackerSettings},
    tracker::{HostEvents, TrackerRegistry, Visibility},
    utils::logging,
};

#[derive(Debug, Parser)]
#[command(
    name = "portal-tracker",
    version,
    about = "Replay a navigation script through the portal page visit tracker"
)]
pub struct Cli {
    /// JSON settings file; defaults apply when omitted or missing
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Portal API base url, overrides settings and environment
    #[arg(long)]
    pub api_url: Option<String>,

    /// Bearer token for the analytics endpoint
    #[arg(long)]
    pub token: Option<String>,

    /// Write --token into the settings file
    #[arg(long, requires_all = ["token", "config"])]
    pub save_token: bool,

    /// Initial user agent of the simulated host
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Script to replay; read from stdin when omitted
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// How long to wait for unload-time sends before exiting
    #[arg(long, default_value_t = 2000)]
    pub drain_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    Visit(String),
    Title(String),
    Referrer(String),
    Agent(String),
    Hide,
    Show,
    Unload,
    Wait(Duration),
    Destroy,
}

/// Parse one script line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> Result<Option<ScriptCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map(|(verb, rest)| (verb, rest.trim()))
        .unwrap_or((line, ""));

    let command = match (verb, rest) {
        ("visit", "") => bail!("visit needs a path"),
        ("visit", path) => ScriptCommand::Visit(path.to_string()),
        ("title", text) => ScriptCommand::Title(text.to_string()),
        ("referrer", url) => ScriptCommand::Referrer(url.to_string()),
        ("agent", ua) => ScriptCommand::Agent(ua.to_string()),
        ("hide", "") => ScriptCommand::Hide,
        ("show", "") => ScriptCommand::Show,
        ("unload", "") => ScriptCommand::Unload,
        ("destroy", "") => ScriptCommand::Destroy,
        ("wait", ms) => {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("wait expects milliseconds, got '{ms}'"))?;
            ScriptCommand::Wait(Duration::from_millis(ms))
        }
        (verb, _) => bail!("unknown command '{verb}'"),
    };
    Ok(Some(command))
}

/// Replay `script` against `registry`. Returns the number of commands run.
pub async fn run_script(registry: &TrackerRegistry, script: &str) -> Result<usize> {
    let mut executed = 0;
    for (index, line) in script.lines().enumerate() {
        let command = parse_line(line).with_context(|| format!("script line {}", index + 1))?;
        let Some(command) = command else {
            continue;
        };
        apply(registry, command).await;
        executed += 1;
    }
    Ok(executed)
}

async fn apply(registry: &TrackerRegistry, command: ScriptCommand) {
    let env = registry.env();
    match command {
        ScriptCommand::Visit(target) => registry.track_page(&target, None).await,
        ScriptCommand::Title(text) => env.set_title(text),
        ScriptCommand::Referrer(url) => env.set_referrer(url),
        ScriptCommand::Agent(ua) => env.set_user_agent(ua),
        ScriptCommand::Hide => registry.init().await.set_visibility(Visibility::Hidden).await,
        ScriptCommand::Show => registry.init().await.set_visibility(Visibility::Visible).await,
        ScriptCommand::Unload => registry.init().await.unload().await,
        ScriptCommand::Wait(duration) => tokio::time::sleep(duration).await,
        ScriptCommand::Destroy => registry.destroy().await,
    }
}

fn load_settings(cli: &Cli) -> Result<TrackerSettings> {
    let mut settings = match &cli.config {
        Some(path) => {
            let store = SettingsStore::new(path.clone())?;
            if cli.save_token {
                store.update_auth_token(cli.token.clone())?;
            }
            store.effective()
        }
        None => {
            let mut settings = TrackerSettings::default();
            settings.apply_env_overrides();
            settings
        }
    };

    if let Some(url) = &cli.api_url {
        settings.api_base_url = url.clone();
    }
    if let Some(token) = &cli.token {
        settings.auth_token = Some(token.clone());
    }
    Ok(settings)
}

fn read_script(cli: &Cli) -> Result<String> {
    match &cli.script {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display())),
        None => {
            let mut script = String::new();
            std::io::stdin()
                .read_to_string(&mut script)
                .context("Failed to read script from stdin")?;
            Ok(script)
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;

    let level = if settings.verbose_logs {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
    logging::set_enabled(settings.verbose_logs);

    log::info!("portal-tracker replaying against {}", settings.api_base_url);

    let script = read_script(&cli)?;
    let env = HostEnvironment::new(cli.user_agent.clone());
    let registry = TrackerRegistry::from_settings(&settings, env, HostEvents::default())?;

    let executed = run_script(&registry, &script).await?;
    registry.destroy().await;

    let grace = Duration::from_millis(cli.drain_ms);
    if !registry.dispatcher().drain(grace).await {
        log_warn!(
            "{} unload-time sends still pending after {}ms",
            registry.dispatcher().pending_keepalive(),
            cli.drain_ms
        );
    }
    log::info!("replayed {executed} commands");
    Ok(())
}
