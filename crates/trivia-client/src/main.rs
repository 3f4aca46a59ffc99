//! # trivia
//!
//! Terminal client for a real-time multiplayer trivia game. Wires settings,
//! logging, credentials, the Socket.IO transport, and the game API into one
//! session, then drives it from stdin.

#![deny(unsafe_code)]

mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use trivia_api::{
    CredentialStore, Credentials, FileCredentialStore, GameApi, HttpGameApi,
    MemoryCredentialStore,
};
use trivia_core::{GameCode, SessionIdentity};
use trivia_session::{DriverConfig, SessionConfig, SessionHandle, spawn_session};
use trivia_settings::{TriviaSettings, load_settings, load_settings_from_path, trivia_dir};
use trivia_transport::{ConnectOptions, SocketClient, Transport};

use crate::console::{HELP, Intent, parse_intent, render};

/// Real-time multiplayer trivia client.
#[derive(Parser, Debug)]
#[command(name = "trivia", about = "Real-time multiplayer trivia client")]
struct Cli {
    /// Settings file (defaults to `~/.trivia/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Log level (overridden by `RUST_LOG`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or join a game and play it.
    Play(PlayArgs),
    /// Print a fresh game code.
    NewCode,
}

#[derive(Args, Debug)]
struct PlayArgs {
    /// Game code to join, or to create when hosting.
    #[arg(long)]
    code: Option<String>,

    /// Create the game as host.
    #[arg(long)]
    host: bool,

    /// Topic id (host only).
    #[arg(long, requires = "host")]
    topic: Option<String>,

    /// Category id (host only).
    #[arg(long, requires = "host")]
    category: Option<String>,

    /// Display name (defaults to the stored username).
    #[arg(long)]
    name: Option<String>,

    /// Bearer token (defaults to the stored token).
    #[arg(long, env = "TRIVIA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Store the token and name in `~/.trivia/credentials.json`.
    #[arg(long)]
    remember: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => load_settings_from_path(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => load_settings().context("Failed to load settings")?,
    };

    let level = cli.log_level.as_deref().unwrap_or(&settings.logging.level);
    if settings.logging.json {
        trivia_core::logging::init_json_subscriber(level);
    } else {
        trivia_core::logging::init_subscriber(level);
    }

    match cli.command {
        Command::NewCode => {
            println!("{}", GameCode::generate());
            Ok(())
        }
        Command::Play(args) => play(args, &settings).await,
    }
}

// ─── Play ────────────────────────────────────────────────────────────────────

async fn play(args: PlayArgs, settings: &TriviaSettings) -> Result<()> {
    let store = FileCredentialStore::in_dir(&trivia_dir());
    let (token, name) = resolve_credentials(&args, &store)?;
    let identity = build_identity(&args, &name)?;
    info!(game_code = %identity.game_code, host = identity.is_host, "starting session");

    let credentials: Arc<dyn CredentialStore> =
        Arc::new(MemoryCredentialStore::with_token(token.clone()));
    let api: Arc<dyn GameApi> = Arc::new(HttpGameApi::new(
        settings.server.api_base_url.clone(),
        settings.server.request_timeout(),
        credentials,
    ));
    let transport: Arc<dyn Transport> = Arc::new(SocketClient::connect(
        &settings.server.socket_url,
        connect_options(settings),
    ));

    let handle = spawn_session(identity, token, driver_config(settings), transport, api);
    run_console(&handle).await?;

    let last = handle.join().await;
    info!(phase = %last.phase, score = last.score, "session closed");
    Ok(())
}

fn resolve_credentials(args: &PlayArgs, store: &dyn CredentialStore) -> Result<(String, String)> {
    let token = args
        .token
        .clone()
        .or_else(|| store.token())
        .context("No auth token: pass --token or set TRIVIA_TOKEN")?;
    let name = args
        .name
        .clone()
        .or_else(|| store.username())
        .filter(|n| !n.trim().is_empty())
        .context("No display name: pass --name")?;

    if args.remember {
        store
            .save(Credentials::new(token.clone(), name.clone()))
            .context("Failed to store credentials")?;
    }
    Ok((token, name))
}

fn build_identity(args: &PlayArgs, name: &str) -> Result<SessionIdentity> {
    let code = match args.code.as_deref() {
        Some(raw) => {
            GameCode::parse(raw).with_context(|| format!("Invalid game code: {raw:?}"))?
        }
        None if args.host => GameCode::generate(),
        None => bail!("--code is required to join a game"),
    };

    if args.host {
        let topic = args
            .topic
            .clone()
            .context("--topic is required when hosting")?;
        let category = args.category.clone().unwrap_or_default();
        Ok(SessionIdentity::host(code, name, topic, category))
    } else {
        Ok(SessionIdentity::guest(code, name))
    }
}

fn connect_options(settings: &TriviaSettings) -> ConnectOptions {
    let transport = &settings.transport;
    ConnectOptions {
        reconnect: transport.reconnect,
        secure: transport.secure,
        reconnect_policy: transport.reconnect_policy(),
        connect_timeout: transport.connect_timeout(),
        event_buffer: transport.event_buffer_capacity,
    }
}

fn driver_config(settings: &TriviaSettings) -> DriverConfig {
    DriverConfig {
        session: SessionConfig {
            countdown_seconds: settings.game.countdown_seconds,
            correct_answer_points: settings.game.correct_answer_points,
            rejoin_on_reconnect: settings.game.rejoin_on_reconnect,
        },
        tick_interval: settings.game.tick_interval(),
        ranking: settings.ranking.poll_policy(),
        payload_encoding: settings.transport.payload_encoding,
    }
}

/// Relay stdin to the session and print every snapshot change until the
/// session task exits.
async fn run_console(handle: &SessionHandle) -> Result<()> {
    let mut snapshots = handle.subscribe();
    let mut shown = snapshots.borrow_and_update().clone();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("{HELP}");
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = snapshots.borrow_and_update().clone();
                for line in render(&shown, &next) {
                    println!("{line}");
                }
                shown = next;
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("Failed to read stdin")? {
                    Some(line) => match parse_intent(&line, &shown) {
                        Ok(Intent::Start) => handle.start(),
                        Ok(Intent::Select(option)) => handle.select(option),
                        Ok(Intent::Leave) => handle.leave(),
                        Ok(Intent::Retry) => handle.retry_submission(),
                        Ok(Intent::Help) => println!("{HELP}"),
                        Err(message) => println!("{message}"),
                    },
                    None => {
                        stdin_open = false;
                        handle.leave();
                    }
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(error) = result {
                    warn!(%error, "failed to listen for ctrl-c");
                }
                handle.leave();
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &[&str]) -> PlayArgs {
        let mut argv = vec!["trivia", "play"];
        argv.extend_from_slice(cmd);
        match Cli::parse_from(argv).command {
            Command::Play(args) => args,
            Command::NewCode => unreachable!(),
        }
    }

    #[test]
    fn guest_needs_a_code() {
        let err = build_identity(&args(&["--name", "Ada"]), "Ada").unwrap_err();
        assert!(err.to_string().contains("--code"));
    }

    #[test]
    fn guest_code_is_normalized() {
        let identity = build_identity(&args(&["--code", " htesxe "]), "Ada").unwrap();
        assert_eq!(identity.game_code.as_str(), "HTESXE");
        assert!(!identity.is_host);
        assert!(identity.topic_id.is_empty());
    }

    #[test]
    fn host_generates_code_and_needs_topic() {
        let identity =
            build_identity(&args(&["--host", "--topic", "1", "--category", "2"]), "Olajide")
                .unwrap();
        assert!(identity.is_host);
        assert_eq!(identity.topic_id, "1");
        assert_eq!(identity.category_id, "2");
        assert_eq!(identity.game_code.as_str().len(), 6);

        assert!(build_identity(&args(&["--host"]), "Olajide").is_err());
    }

    #[test]
    fn topic_requires_host() {
        let parsed = Cli::try_parse_from(["trivia", "play", "--topic", "1"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn credentials_fall_back_to_store_and_remember() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCredentialStore::in_dir(dir.path());

        assert!(resolve_credentials(&args(&["--name", "Ada"]), &store).is_err());

        let (token, name) =
            resolve_credentials(&args(&["--token", "tok", "--name", "Ada", "--remember"]), &store)
                .unwrap();
        assert_eq!((token.as_str(), name.as_str()), ("tok", "Ada"));

        let (token, name) = resolve_credentials(&args(&[]), &store).unwrap();
        assert_eq!((token.as_str(), name.as_str()), ("tok", "Ada"));
    }

    #[test]
    fn settings_flow_into_session_config() {
        let mut settings = TriviaSettings::default();
        settings.game.countdown_seconds = 9;
        settings.ranking.max_attempts = 3;
        settings.transport.reconnect = false;

        let config = driver_config(&settings);
        assert_eq!(config.session.countdown_seconds, 9);
        assert_eq!(config.ranking.max_attempts, 3);
        assert!(!connect_options(&settings).reconnect);
    }
}
