//! Interactive and single-message front ends over a [`Session`].

use std::io::{self, Write};
use std::path::PathBuf;

use quill_agent::{Reply, Session, TurnError};
use quill_core::DisplaySink;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::history::InputHistory;

const HELP: &str = "\
  Commands:
    /help      Show this help
    /history   Show recent inputs
    /quit      Exit (also /exit, :q, Ctrl+D)

  Ctrl+C cancels a running reply; at the prompt it exits.";

/// What one line of user input asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum Input {
    Quit,
    Help,
    History,
    Message(String),
    Blank,
}

pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    match trimmed {
        "" => Input::Blank,
        "/quit" | "/exit" | ":q" => Input::Quit,
        "/help" => Input::Help,
        "/history" => Input::History,
        _ => Input::Message(trimmed.to_string()),
    }
}

/// Read stdin lines on a background task.
///
/// The channel closes on EOF; a read error is logged and also closes it.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(32);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read failed");
                    break;
                }
            }
        }
    });
    rx
}

fn prompt() {
    print!("  You > ");
    let _ = io::stdout().flush();
}

/// Run one message, letting Ctrl-C cancel it.
async fn run_turn(
    session: &Session,
    text: &str,
    sink: &dyn DisplaySink,
) -> Result<Reply, TurnError> {
    let cancel = CancellationToken::new();
    let turn = session.submit(text, sink, &cancel);
    tokio::pin!(turn);

    loop {
        tokio::select! {
            result = &mut turn => return result,
            _ = tokio::signal::ctrl_c(), if !cancel.is_cancelled() => {
                debug!("Ctrl-C during turn, cancelling");
                cancel.cancel();
            }
        }
    }
}

/// Print the parts of an outcome that were not already streamed.
fn report(result: &Result<Reply, TurnError>) {
    match result {
        Ok(reply) => {
            println!();
            for fault in &reply.faults {
                eprintln!("  [Warning] {}", fault.to_error());
            }
            if reply.cancelled {
                eprintln!("  [Cancelled]");
            }
        }
        Err(err) => {
            if err.has_partial() {
                println!();
            }
            eprintln!("  Error: {}", err.source);
        }
    }
}

/// `quill -m MESSAGE`: one turn, then exit. A failed turn is a failed process.
pub async fn run_once(
    session: &Session,
    message: &str,
    sink: &dyn DisplaySink,
) -> anyhow::Result<()> {
    match run_turn(session, message, sink).await {
        Err(err) => {
            if err.has_partial() {
                println!();
            }
            Err(err.source.into())
        }
        ok => {
            report(&ok);
            Ok(())
        }
    }
}

/// The interactive loop.
pub async fn run_interactive(
    session: &Session,
    sink: &dyn DisplaySink,
    mut history: InputHistory,
    history_path: PathBuf,
) -> anyhow::Result<()> {
    let mut lines = spawn_stdin_reader();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        };

        match parse_input(&line) {
            Input::Blank => continue,
            Input::Quit => break,
            Input::Help => println!("{HELP}\n"),
            Input::History => {
                let recent = history.recent(20);
                let first = history.entries().len() - recent.len() + 1;
                for (n, entry) in (first..).zip(recent) {
                    println!("  {n:>4}  {}", entry.replace('\n', " ⏎ "));
                }
                println!();
            }
            Input::Message(text) => {
                history.push(&text);
                println!();
                let result = run_turn(session, &text, sink).await;
                report(&result);
                println!();
            }
        }
    }

    if let Err(e) = history.save(&history_path) {
        warn!(path = %history_path.display(), error = %e, "Could not save input history");
    }
    println!();
    println!("  Goodbye!");
    Ok(())
}
