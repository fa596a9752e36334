
use std::io::Write;

use clap::{Args, Parser, Subcommand};
use client::{
    ClientConfig, ConfigError, ConnectionState, HandleError, Point, SessionDriver, SessionEvent, SessionHandle,
    SessionIdentity, TerminalWidget,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("session error: {0}")]
    Session(#[from] HandleError),
    #[error("terminal creation failed: {0}")]
    CreateFailed(String),
    #[error("gave up after {0} reconnect attempts")]
    GaveUp(u32),
    #[error("session ended")]
    SessionEnded,
    #[error("stdin read failed: {0}")]
    Stdin(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "shellsync", about = "Attach a local terminal to a shared shell session")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open one terminal in a session and pipe stdin/stdout through it.
    Attach(AttachArgs),
}

#[derive(Args, Debug)]
struct AttachArgs {
    session_id: String,

    /// Participant id. A random UUID is used when omitted.
    #[arg(long, env = "SHELLSYNC_CLIENT_ID")]
    client_id: Option<String>,

    /// Base websocket endpoint, e.g. `ws://localhost:8080/ws`.
    #[arg(long, env = "SHELLSYNC_WS_URL")]
    server_url: Option<String>,
}

/// Writes PTY output straight to stdout.
struct StdoutWidget;

impl TerminalWidget for StdoutWidget {
    fn write(&mut self, text: &str) {
        let mut out = std::io::stdout().lock();
        if let Err(error) = out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
            warn!(%error, "stdout write failed");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Attach(args) => run_attach(args).await,
    }
}

async fn run_attach(args: AttachArgs) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.server_url {
        config = config.with_server_url(url)?;
    }
    let identity = match args.client_id {
        Some(client_id) => SessionIdentity::new(args.session_id, client_id),
        None => SessionIdentity::generated(args.session_id),
    };
    info!(session_id = %identity.session_id, client_id = %identity.client_id, "attaching");

    let (driver, handle, mut events) = SessionDriver::new(config);
    let driver = tokio::spawn(driver.run());
    handle.connect(identity)?;

    let result = attach_terminal(&handle, &mut events).await;

    if handle.teardown().is_err() {
        info!("session already stopped");
    }
    if let Err(error) = driver.await {
        warn!(%error, "session driver task failed");
    }
    result
}

async fn attach_terminal(handle: &SessionHandle, events: &mut UnboundedReceiver<SessionEvent>) -> Result<(), CliError> {
    wait_until_open(events).await?;

    let terminal = handle.create_terminal_with(Point::ORIGIN, Box::new(StdoutWidget)).await?;
    wait_until_ready(events, &terminal).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    info!("stdin closed; detaching");
                    return Ok(());
                };
                if !handle.send_input(&terminal, &format!("{line}\n")).await? {
                    warn!("terminal not ready; input dropped");
                }
            }
            event = events.recv() => match event {
                Some(SessionEvent::GaveUp { attempts }) => return Err(CliError::GaveUp(attempts)),
                Some(event) => report(&event),
                None => return Err(CliError::SessionEnded),
            },
        }
    }
}

async fn wait_until_open(events: &mut UnboundedReceiver<SessionEvent>) -> Result<(), CliError> {
    loop {
        match events.recv().await {
            Some(SessionEvent::Connection(ConnectionState::Open)) => return Ok(()),
            Some(SessionEvent::GaveUp { attempts }) => return Err(CliError::GaveUp(attempts)),
            Some(event) => report(&event),
            None => return Err(CliError::SessionEnded),
        }
    }
}

async fn wait_until_ready(events: &mut UnboundedReceiver<SessionEvent>, terminal: &str) -> Result<(), CliError> {
    loop {
        match events.recv().await {
            Some(SessionEvent::TerminalReady { provisional_id, authoritative_id }) if provisional_id == terminal => {
                eprintln!("terminal ready: {authoritative_id}");
                return Ok(());
            }
            Some(SessionEvent::TerminalFailed { provisional_id, message }) if provisional_id == terminal => {
                return Err(CliError::CreateFailed(message));
            }
            Some(SessionEvent::GaveUp { attempts }) => return Err(CliError::GaveUp(attempts)),
            Some(event) => report(&event),
            None => return Err(CliError::SessionEnded),
        }
    }
}

fn report(event: &SessionEvent) {
    eprintln!("{}", describe(event));
}

fn describe(event: &SessionEvent) -> String {
    match event {
        SessionEvent::Connection(state) => format!("connection: {state}"),
        SessionEvent::Reconnecting { attempt, delay } => {
            format!("connection lost; retry {attempt} in {}ms", delay.as_millis())
        }
        SessionEvent::GaveUp { attempts } => format!("giving up after {attempts} attempts"),
        SessionEvent::TerminalReady { authoritative_id, .. } => format!("terminal ready: {authoritative_id}"),
        SessionEvent::TerminalFailed { provisional_id, message } => format!("terminal {provisional_id} failed: {message}"),
    }
}
