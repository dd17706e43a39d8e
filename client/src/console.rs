//! Stdin console standing in for the panel's buttons.

use std::io::BufRead;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::PollingClient;
use crate::page::HeadlessPage;

pub const HELP: &str = "commands: submit <text> | stop | release | back | status | quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Submit(String),
    Stop,
    Release,
    Back,
    Status,
    Help,
    Quit,
}

/// Parse one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "submit" => Command::Submit(rest.to_string()),
        "stop" | "skip" => Command::Stop,
        "release" => Command::Release,
        "back" => Command::Back,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(Some(command))
}

/// Why the console stopped reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleExit {
    Quit,
    Released,
    /// Stdin reached end of input or failed; polling carries on.
    Closed,
}

/// Forward stdin lines from a plain thread.
///
/// A blocking stdin read cannot be cancelled, so it stays off the runtime's
/// blocking pool; otherwise runtime shutdown would wait for the next line.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to read console input");
                    break;
                }
            }
        }
        debug!("Stdin reader finished");
    });
    rx
}

/// Run commands from `lines` until `quit`, end of input, or release.
pub async fn run_console(
    client: Arc<PollingClient>,
    page: Arc<HeadlessPage>,
    mut lines: mpsc::Receiver<String>,
) -> ConsoleExit {
    info!("{}", HELP);

    loop {
        let Some(line) = lines.recv().await else {
            info!("Console input closed");
            return ConsoleExit::Closed;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("{}; {}", e, HELP);
                continue;
            }
        };

        match command {
            Command::Submit(text) => {
                page.set_input(&text);
                client.submit_text().await;
            }
            Command::Stop => client.request_stop().await,
            Command::Release => {
                client.release_id().await;
                return ConsoleExit::Released;
            }
            Command::Back => client.handle_back_navigation(),
            Command::Status => {
                let state = page.snapshot();
                info!(
                    card = client.card_number(),
                    ready = client.health().is_ready(),
                    poll_failures = client.health().consecutive_failures(),
                    stop_visible = state.stop_visible,
                    votes_required = %state.votes_required_text,
                    response = %state.response_message,
                    reloads = state.reloads,
                    "Panel status"
                );
            }
            Command::Help => info!("{}", HELP),
            Command::Quit => return ConsoleExit::Quit,
        }
    }
}
