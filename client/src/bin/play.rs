//! Terminal client - joins a room and plays tic-tac-toe against another client.
//!
//! Usage:
//!   cargo run --release --bin tictactoe-play -- --room <ROOM>
//!
//! Options:
//!   -u, --url         Server URL (default: http://localhost:5000)
//!   -r, --room        Room to join
//!       --poll-ms     Poll interval in milliseconds (default: 1000)
//!       --timeout-ms  Per-request timeout in milliseconds (default: 5000)
//!       --log-level   Log level (default: info)
//!   -c, --config      YAML file supplying any of the above

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::str::FromStr;
use tictactoe_client::{
    render, view::WAITING_STATUS, Client, ClientConfig, Controller, Error, Submission,
    TerminalView,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn, Level};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play tic-tac-toe in a shared room")]
struct Args {
    #[arg(short, long)]
    url: Option<String>,

    #[arg(short, long)]
    room: Option<String>,

    #[arg(long)]
    poll_ms: Option<u64>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    log_level: Option<String>,

    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Loads the config file, if any, then applies command-line overrides.
fn resolve_config(args: &Args) -> Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(url) = &args.url {
        config.base_url = url.clone();
    }
    if let Some(room) = &args.room {
        config.room = Some(room.clone());
    }
    if let Some(poll_ms) = args.poll_ms {
        config.poll_interval_ms = poll_ms;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.request_timeout_ms = timeout_ms;
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
    config.validate()?;
    Ok(config)
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Move(usize),
    Quit,
    Unknown,
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
        return Command::Quit;
    }
    match line.parse::<usize>() {
        Ok(cell @ 1..=9) => Command::Move(cell - 1),
        _ => Command::Unknown,
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = resolve_config(&args)?;
    let level = Level::from_str(&config.log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let room = config
        .room
        .clone()
        .context("a room is required (--room or config file)")?;
    let client = Client::with_timeout(&config.base_url, config.request_timeout())?;
    info!(url = %config.base_url, room, "connecting");

    let mut controller = Controller::join(client, &room, config.poll_interval())
        .await
        .context("failed to join room")?;
    let mut view = TerminalView::new(std::io::stdout(), controller.session().player);
    view.announce();
    view.status(WAITING_STATUS);
    controller.start_polling();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            events = controller.next_events() => {
                let Some(events) = events else {
                    break;
                };
                render(&mut view, &events);
                if !controller.session().active {
                    break;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    info!("stdin closed; leaving room");
                    break;
                };
                match parse_command(&line) {
                    Command::Quit => break,
                    Command::Unknown => view.status("Enter a cell number 1-9, or q to quit."),
                    Command::Move(index) => match controller.submit_move(index).await {
                        Ok(Submission::Sent) => {}
                        Ok(Submission::Skipped(reason)) => view.status(&format!("Can't move: {reason}.")),
                        Err(Error::MoveRejected(message)) => view.status(&format!("Move rejected: {message}.")),
                        Err(err) if err.is_transient() => {
                            warn!(error = %err, "move failed");
                            view.status("Move failed; try again.");
                        }
                        Err(err) => return Err(err).context("move failed"),
                    },
                }
            }
        }
    }

    controller.stop_polling();
    Ok(())
}
