use std::io::IsTerminal;
use std::str::FromStr;

use log::{error, info, warn, Level};
use rustyline::error::ReadlineError;
use tokio::sync::mpsc::Sender;

use crate::logging;

#[derive(Debug, PartialEq)]
pub enum Command {
    Quit,
    Level(Level),
    Usage(&'static str),
    Nothing,
    Unknown(String),
}

pub fn parse(line: &str) -> Command {
    let command: Vec<_> = line.trim().splitn(2, ' ').collect();
    match command[0] {
        "exit" | "quit" => Command::Quit,
        "log" | "level" => {
            if command.len() == 2 {
                match Level::from_str(command[1].trim()) {
                    Ok(level) => Command::Level(level),
                    Err(_) => Command::Usage("invalid log level"),
                }
            } else {
                Command::Usage("usage: log <trace|debug|info|warn|error>")
            }
        }
        "" => Command::Nothing,
        x => Command::Unknown(x.to_string()),
    }
}

/// Reads operator commands from stdin on a plain thread.
///
/// Does nothing when stdin is not a terminal, so running under a service manager only
/// reacts to signals.
pub fn spawn(quit_tx: Sender<()>) {
    if !std::io::stdin().is_terminal() {
        return;
    }

    std::thread::spawn(move || {
        let mut editor = match rustyline::DefaultEditor::new() {
            Ok(e) => e,
            Err(e) => {
                error!("error creating line editor: {:#?}", e);
                return;
            }
        };

        loop {
            let line = match editor.readline("> ") {
                Ok(l) => l,
                Err(ReadlineError::Interrupted) => {
                    quit_tx.blocking_send(()).ok();
                    return;
                }
                Err(ReadlineError::Eof) => return,
                Err(e) => {
                    error!("error reading input: {:#?}", e);
                    continue;
                }
            };

            match parse(&line) {
                Command::Quit => {
                    quit_tx.blocking_send(()).ok();
                    return;
                }
                Command::Level(level) => {
                    *logging::LOG_LEVEL.write() = level;
                    info!("log level set to {}", level);
                }
                Command::Usage(msg) => info!("{}", msg),
                Command::Nothing => {}
                Command::Unknown(x) => warn!("unknown command: {}", x),
            }
        }
    });
}
