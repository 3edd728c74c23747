//! Line-oriented terminal front end.
//!
//! Positions shown to the user are 1-based and refer to the latest snapshot.

use chrono::Local;
use std::cell::RefCell;
use std::io::{BufRead, Write};

use crate::core::features::{ClipboardFeature, ConfirmationCapability};
use crate::shared::error::{AppError, AppResult};
use crate::shared::types::ClipboardHistoryItem;

const PREVIEW_GRAPHEMES: usize = 60;

const HELP: &str = "\
Commands:
  list              show the clipboard history (newest first)
  search <query>    show entries containing <query> (case-insensitive)
  copy <n>          put entry <n> back on the clipboard
  delete <n>        remove entry <n>
  clear             remove every entry (asks first)
  pause | resume    stop or restart capturing the clipboard
  help              show this text
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    Search(String),
    Copy(usize),
    Delete(usize),
    Clear,
    Pause,
    Resume,
    Help,
    Quit,
    Invalid(String),
}

impl Command {
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "list" | "ls" => Command::List,
            "search" | "find" => Command::Search(rest.to_string()),
            "copy" => parse_position(rest).map_or_else(Command::Invalid, Command::Copy),
            "delete" | "rm" => parse_position(rest).map_or_else(Command::Invalid, Command::Delete),
            "clear" => Command::Clear,
            "pause" => Command::Pause,
            "resume" => Command::Resume,
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => Command::Invalid(format!("Unknown command: {} (try 'help')", other)),
        };
        Some(command)
    }
}

/// 1-based position from the user to a 0-based index
fn parse_position(arg: &str) -> Result<usize, String> {
    match arg.parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("Expected an entry number, got {:?}", arg)),
    }
}

pub struct Console<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output.into_inner()
    }

    fn read_line(&self) -> AppResult<Option<String>> {
        let mut line = String::new();
        let read = self.input.borrow_mut().read_line(&mut line)?;
        Ok(if read == 0 { None } else { Some(line) })
    }

    fn say(&self, text: &str) -> AppResult<()> {
        let mut out = self.output.borrow_mut();
        writeln!(out, "{}", text)?;
        out.flush()?;
        Ok(())
    }

    /// Read commands until `quit` or end of input
    pub fn run(&self, feature: &ClipboardFeature) -> AppResult<()> {
        self.say(HELP)?;
        loop {
            {
                let mut out = self.output.borrow_mut();
                write!(out, "> ")?;
                out.flush()?;
            }
            let Some(line) = self.read_line()? else {
                break;
            };
            match Command::parse(&line) {
                None => continue,
                Some(Command::Quit) => break,
                Some(command) => self.execute(feature, command)?,
            }
        }
        Ok(())
    }

    pub fn execute(&self, feature: &ClipboardFeature, command: Command) -> AppResult<()> {
        match command {
            Command::List => {
                let entries = feature.snapshot().entries;
                if entries.is_empty() {
                    return self.say("History is empty.");
                }
                for (index, item) in entries.iter().enumerate() {
                    self.say(&format_entry(index, item))?;
                }
                Ok(())
            }
            Command::Search(query) => {
                let entries = feature.snapshot().entries;
                let matches = crate::core::clipboard::filter::apply(&query, &entries);
                if matches.is_empty() {
                    return self.say("No matches.");
                }
                for item in &matches {
                    // Content is unique, so it identifies the position in the snapshot
                    let index = entries
                        .iter()
                        .position(|e| e.content == item.content)
                        .unwrap_or_default();
                    self.say(&format_entry(index, item))?;
                }
                Ok(())
            }
            Command::Copy(index) => match feature.copy(index) {
                Ok(item) => self.say(&format!("Copied: {}", item.preview(PREVIEW_GRAPHEMES))),
                Err(e) => self.report(e),
            },
            Command::Delete(index) => match feature.delete(index) {
                Ok(item) => self.say(&format!("Deleted: {}", item.preview(PREVIEW_GRAPHEMES))),
                Err(e) => self.report(e),
            },
            Command::Clear => {
                if feature.clear_all(self) {
                    self.say("History cleared.")
                } else {
                    self.say("Cancelled.")
                }
            }
            Command::Pause => {
                feature.pause();
                self.say("Monitoring paused.")
            }
            Command::Resume => {
                feature.resume();
                self.say("Monitoring resumed.")
            }
            Command::Help => self.say(HELP),
            Command::Quit => Ok(()),
            Command::Invalid(msg) => self.say(&msg),
        }
    }

    fn report(&self, err: AppError) -> AppResult<()> {
        match err {
            AppError::OutOfRange { len, .. } => {
                self.say(&format!("No such entry (history has {} entries).", len))
            }
            other => self.say(&format!("Error: {}", other)),
        }
    }
}

impl<R: BufRead, W: Write> ConfirmationCapability for Console<R, W> {
    fn ask(&self, prompt: &str) -> bool {
        let asked = {
            let mut out = self.output.borrow_mut();
            write!(out, "{} [y/N] ", prompt).and_then(|_| out.flush())
        };
        if let Err(e) = asked {
            tracing::warn!(error = %e, "Failed to write confirmation prompt");
            return false;
        }

        match self.read_line() {
            Ok(Some(answer)) => matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read confirmation");
                false
            }
        }
    }
}

fn format_entry(index: usize, item: &ClipboardHistoryItem) -> String {
    format!(
        "{:>3}. [{}] {}",
        index + 1,
        item.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        item.preview(PREVIEW_GRAPHEMES)
    )
}
