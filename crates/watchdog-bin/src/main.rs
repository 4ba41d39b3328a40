use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use watchdog_lib::config::Settings;
use watchdog_lib::modal::{ModalActions, ModalView, WarningModal};
use watchdog_lib::page::Navigator;
use watchdog_lib::SessionContext;

/// Run the session watchdog against a helpdesk backend from a terminal
#[derive(Debug, Parser)]
#[command(name = "helpdesk-watchdog", version)]
struct Args {
    /// TOML file to load instead of ./watchdog.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the backend origin
    #[arg(long)]
    base_url: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,

    /// Page the terminal pretends to be on
    #[arg(long, default_value = "/p/chamados")]
    path: String,
}

/// Prints where the browser would go
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, target: &str) {
        println!("-> navigating to {target}");
    }
}

/// Overlay drawn on stdout; its buttons are the `continue` and `logout` commands
#[derive(Default)]
struct TerminalModal {
    buttons: Mutex<Option<ModalActions>>,
}

impl TerminalModal {
    fn click(&self, press: impl FnOnce(&ModalActions)) {
        match self.buttons.lock().as_ref() {
            Some(buttons) => press(buttons),
            None => println!("no warning is showing"),
        }
    }
}

impl ModalView for TerminalModal {
    fn render(&self, modal: &WarningModal, actions: ModalActions) {
        *self.buttons.lock() = Some(actions);
        println!();
        println!("+-- {} --+", modal.title);
        println!("| {}", modal.message);
        println!(
            "| [continue] {}   [logout] {}",
            WarningModal::CONTINUE_LABEL,
            WarningModal::LOGOUT_LABEL
        );
        println!();
    }

    fn remove(&self, id: Uuid) {
        *self.buttons.lock() = None;
        tracing::debug!(%id, "overlay removed");
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = match &args.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load().context("loading watchdog settings")?,
    };
    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
        settings.validate()?;
    }
    init_tracing(&settings.log_level, args.json_logs);

    let Some(ctx) = SessionContext::for_page(settings, Arc::new(TerminalNavigator), &args.path)? else {
        println!("{} is a public page, nothing to watch", args.path);
        return Ok(());
    };

    match ctx.backend.current_user().await {
        Ok(user) => match (user.username, user.role) {
            (Some(name), Some(role)) => println!("signed in as {name} ({role})"),
            _ => println!("no user on this session"),
        },
        Err(e) => warn!(error = %e, "could not fetch the current user"),
    }

    let modal = Arc::new(TerminalModal::default());
    let handle = ctx.start_watchdog(modal.clone());
    let tracker = handle.activity_tracker();
    info!(base_url = %ctx.settings.base_url, path = %args.path, "watching session");
    println!("type DOM events (click, keypress, ...), continue, logout, get <path>, status or quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            _ = ctx.page.torn_down() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        match line.split_once(' ').unwrap_or((line, "")) {
            ("", _) => {}
            ("quit", _) => break,
            ("continue", _) => modal.click(ModalActions::continue_session),
            ("logout", _) => modal.click(ModalActions::logout_now),
            ("status", _) => {
                let status = handle.status();
                let left = status
                    .logout_at
                    .map(|at| at.saturating_duration_since(Instant::now()).as_secs());
                println!(
                    "state={:?} warning_shown={} logout_in_secs={:?}",
                    status.state, status.warning_shown, left
                );
            }
            ("get", path) => match ctx.client.get(path.trim()).await {
                Ok(response) => println!("{} {}", response.status(), response.text()),
                Err(e) => println!("request failed: {e}"),
            },
            (event, _) => {
                if !tracker.record_dom_event(event) {
                    println!("unknown command {event}");
                }
            }
        }
    }

    if ctx.page.is_torn_down() {
        handle.join().await;
        println!("page left: {}", ctx.page.location().unwrap_or_default());
    } else {
        handle.stop().await;
    }
    Ok(())
}
