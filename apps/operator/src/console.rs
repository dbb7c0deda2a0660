//! Line-oriented terminal front end.
//!
//! Reads commands from stdin and prints core events as timestamped lines.

use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use shutterlink_core::{
    CaptureStatus, ConnectionState, CoreEvent, CoreSnapshot, LogLevel, OperatorHandle,
    TransferOutcome, generate_folder_name,
};

const HELP: &str = "\
commands:
  start [name]   start a capture (blank name = timestamp)
  stop           stop capturing and download the images
  name           suggest a new folder name
  reconnect      reconnect to the relay now
  status         show connection, capture and transfer state
  quit           exit";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start(String),
    Stop,
    Name,
    Reconnect,
    Status,
    Help,
    Quit,
}

/// Parses one input line. Returns `None` for blank lines and
/// `Some(Err(_))` for unknown commands.
pub fn parse_command(line: &str) -> Option<Result<ConsoleCommand, String>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let cmd = match word.to_ascii_lowercase().as_str() {
        "start" => ConsoleCommand::Start(rest.to_string()),
        "stop" => ConsoleCommand::Stop,
        "name" => ConsoleCommand::Name,
        "reconnect" => ConsoleCommand::Reconnect,
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => return Some(Err(format!("unknown command '{other}', type 'help'"))),
    };
    Some(Ok(cmd))
}

fn stamp(message: &str) -> String {
    format!("[{}] {message}", Local::now().format("%H:%M:%S"))
}

fn describe_connection(state: &ConnectionState) -> String {
    match state {
        ConnectionState::Connecting => "Connecting".into(),
        ConnectionState::Connected => "Connected".into(),
        ConnectionState::Registered => "Connected (registered)".into(),
        ConnectionState::Reconnecting { attempt } => format!("Reconnecting (attempt {attempt})"),
        ConnectionState::Disconnected => "Disconnected".into(),
    }
}

fn describe_capture(status: &CaptureStatus) -> String {
    let actions = match (status.can_start(), status.can_stop()) {
        (true, _) => "start available",
        (_, true) => "stop available",
        _ => "waiting for device",
    };
    format!("Capture {status} ({actions})")
}

/// Renders an event as a console line, or `None` for events shown only
/// through other lines.
pub fn format_event(event: &CoreEvent) -> Option<String> {
    match event {
        CoreEvent::Connection(state) => Some(format!("Status: {}", describe_connection(state))),
        CoreEvent::Capture(status) => Some(describe_capture(status)),
        // Chunk lines already carry throttled progress.
        CoreEvent::Progress(_) => None,
        CoreEvent::Log(line) => Some(match line.level {
            LogLevel::Info => line.message.clone(),
            level => format!("{level}: {}", line.message),
        }),
        CoreEvent::TransferFinished(TransferOutcome::Saved(summary)) => Some(format!(
            "Download complete: {} files in {}",
            summary.entry_count,
            summary.extract_dir.display()
        )),
        CoreEvent::TransferFinished(TransferOutcome::Failed {
            folder_name,
            error,
            archive_path,
        }) => Some(match archive_path {
            Some(path) => format!(
                "Download of '{folder_name}' failed: {error} (archive kept at {})",
                path.display()
            ),
            None => format!("Download of '{folder_name}' failed: {error}"),
        }),
    }
}

fn format_snapshot(snap: &CoreSnapshot) -> String {
    let mut out = format!(
        "connection: {}\ncapture:    {}\nprogress:   {:.1}%",
        describe_connection(&snap.connection),
        snap.capture,
        snap.progress
    );
    if let Some(t) = &snap.transfer {
        out.push_str(&format!(
            "\ntransfer:   '{}' {} / {} bytes",
            t.folder_name, t.received, t.declared
        ));
    }
    if let Some(folder) = &snap.materializing {
        out.push_str(&format!("\nsaving:     '{folder}'"));
    }
    out
}

/// Runs the console until `quit`, end of input or Ctrl-C.
pub async fn run(
    handle: OperatorHandle,
    mut events: mpsc::Receiver<CoreEvent>,
) -> anyhow::Result<()> {
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if let Some(line) = format_event(&event) {
                println!("{}", stamp(&line));
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };

        let cmd = match parse_command(&line) {
            None => continue,
            Some(Err(msg)) => {
                println!("{msg}");
                continue;
            }
            Some(Ok(cmd)) => cmd,
        };

        match cmd {
            ConsoleCommand::Start(name) => {
                if let Err(e) = handle.start_capture(name).await {
                    println!("{}", stamp(&format!("Start refused: {e}")));
                }
            }
            ConsoleCommand::Stop => {
                if let Err(e) = handle.stop_capture().await {
                    println!("{}", stamp(&format!("Stop refused: {e}")));
                }
            }
            ConsoleCommand::Name => println!("{}", generate_folder_name()),
            ConsoleCommand::Reconnect => handle.reconnect().await?,
            ConsoleCommand::Status => println!("{}", format_snapshot(&handle.snapshot().await?)),
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::Quit => break,
        }
    }

    // The core may already be gone if it failed; the printer ends with it.
    let _ = handle.shutdown().await;
    let _ = printer.await;
    Ok(())
}
