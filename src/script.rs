//! Action scripts for the `run` command.
//!
//! One action per line; blank lines and `#` comments are skipped.
//! Arguments are separated by whitespace; double quotes group text with
//! spaces and accept `\"`, `\\`, `\n`, `\t` and `\b` escapes.
//!
//! ```text
//! # log on to CICS
//! wait-field
//! fill 20 10 "USER01"
//! enter
//! expect 1 2 "READY"
//! ```

use crate::client::{Client, ScreenFormat};
use std::io::Write;
use thiserror::Error;
use tracing::info;

/// Errors while parsing or running a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("line {line}: {action} failed: {reason}")]
    Failed {
        line: usize,
        action: String,
        reason: String,
    },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// One script action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Enter,
    Pf(u8),
    Pa(u8),
    Tab,
    BackTab,
    Home,
    BackSpace,
    Clear,
    Delete,
    DeleteField,
    DeleteWord,
    Erase,
    Up,
    Down,
    Left,
    Right,
    Move { row: u16, col: u16 },
    FirstField,
    Text(String),
    Keys(String),
    WaitField,
    WaitUnlock,
    WaitOutput,
    /// Print the text at a position.
    Read { row: u16, col: u16, length: u16 },
    /// Fail unless the text is at the position.
    Expect { row: u16, col: u16, text: String },
    /// Replace the field at a position and check it.
    Fill { row: u16, col: u16, text: String },
    Save { file: String, format: ScreenFormat },
    Print,
    /// Print the emulator status as JSON.
    Status,
}

impl Step {
    /// Parse one line. `Ok(None)` for blank lines and comments.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let args = split_args(line)?;
        let Some((action, args)) = args.split_first() else {
            return Ok(None);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let step = match (action.as_str(), args.as_slice()) {
            ("enter", []) => Self::Enter,
            ("pf", [n]) => Self::Pf(number(n)?),
            ("pa", [n]) => Self::Pa(number(n)?),
            ("tab", []) => Self::Tab,
            ("backtab", []) => Self::BackTab,
            ("home", []) => Self::Home,
            ("backspace", []) => Self::BackSpace,
            ("clear", []) => Self::Clear,
            ("delete", []) => Self::Delete,
            ("delete-field", []) => Self::DeleteField,
            ("delete-word", []) => Self::DeleteWord,
            ("erase", []) => Self::Erase,
            ("up", []) => Self::Up,
            ("down", []) => Self::Down,
            ("left", []) => Self::Left,
            ("right", []) => Self::Right,
            ("move", [row, col]) => Self::Move {
                row: number(row)?,
                col: number(col)?,
            },
            ("first-field", []) => Self::FirstField,
            ("text", [text]) => Self::Text((*text).to_string()),
            ("keys", [keys]) => Self::Keys((*keys).to_string()),
            ("wait-field", []) => Self::WaitField,
            ("wait-unlock", []) => Self::WaitUnlock,
            ("wait-output", []) => Self::WaitOutput,
            ("read", [row, col, length]) => Self::Read {
                row: number(row)?,
                col: number(col)?,
                length: number(length)?,
            },
            ("expect", [row, col, text]) => Self::Expect {
                row: number(row)?,
                col: number(col)?,
                text: (*text).to_string(),
            },
            ("fill", [row, col, text]) => Self::Fill {
                row: number(row)?,
                col: number(col)?,
                text: (*text).to_string(),
            },
            ("save", [file]) => Self::Save {
                file: (*file).to_string(),
                format: ScreenFormat::default(),
            },
            ("save", [file, format]) => Self::Save {
                file: (*file).to_string(),
                format: format.parse().map_err(|e| format!("{e}"))?,
            },
            ("print", []) => Self::Print,
            ("status", []) => Self::Status,
            (action, args) => {
                return Err(format!(
                    "unknown action or wrong arguments: {action} ({} given)",
                    args.len()
                ));
            }
        };
        Ok(Some(step))
    }

    /// Run against a connected client. Returns `false` on failure; the
    /// client's `last_error` holds the cause if there is one.
    pub fn apply<W: Write>(&self, client: &mut Client, out: &mut W) -> Result<bool, ScriptError> {
        let ok = match self {
            Self::Enter => client.send_enter(),
            Self::Pf(n) => client.send_pf(*n),
            Self::Pa(n) => client.send_pa(*n),
            Self::Tab => client.send_tab(),
            Self::BackTab => client.send_back_tab(),
            Self::Home => client.send_home(),
            Self::BackSpace => client.send_back_space(),
            Self::Clear => client.clear_screen(),
            Self::Delete => client.del_char(),
            Self::DeleteField => client.del_field(),
            Self::DeleteWord => client.del_word(),
            Self::Erase => client.erase_char(),
            Self::Up => client.move_cursor_up(),
            Self::Down => client.move_cursor_down(),
            Self::Left => client.move_cursor_left(),
            Self::Right => client.move_cursor_right(),
            Self::Move { row, col } => client.move_to(*row, *col),
            Self::FirstField => client.move_to_first_input_field(),
            Self::Text(text) => client.send_text(text),
            Self::Keys(keys) => client.send_keys(keys),
            Self::WaitField => client.wait_for_field(),
            Self::WaitUnlock => client.wait_for_unlock(),
            Self::WaitOutput => client.wait_for_output(),
            Self::Read { row, col, length } => {
                match client.read_text_at_position(*row, *col, *length) {
                    Some(text) => {
                        writeln!(out, "{text}")?;
                        true
                    }
                    None => false,
                }
            }
            Self::Expect { row, col, text } => client.contains_text_at_position(*row, *col, text),
            Self::Fill { row, col, text } => client.try_send_text_to_field(text, *row, *col),
            Self::Save { file, format } => client.save_screen(file, *format),
            Self::Print => client.print_screen_to(out),
            Self::Status => match client.connection_status() {
                Some(status) => {
                    let json = serde_json::to_string(&status)
                        .map_err(|e| ScriptError::Output(e.into()))?;
                    writeln!(out, "{json}")?;
                    true
                }
                None => false,
            },
        };
        Ok(ok)
    }
}

/// A parsed script: steps with their 1-based line numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    steps: Vec<(usize, Step)>,
}

impl Script {
    /// Parse a whole script, stopping at the first bad line.
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut steps = Vec::new();
        for (index, line) in text.lines().enumerate() {
            let line_no = index + 1;
            if let Some(step) =
                Step::parse(line).map_err(|message| ScriptError::Parse { line: line_no, message })?
            {
                steps.push((line_no, step));
            }
        }
        Ok(Self { steps })
    }

    #[must_use]
    pub fn steps(&self) -> &[(usize, Step)] {
        &self.steps
    }

    /// Run every step in order, stopping at the first failure.
    pub fn run<W: Write>(&self, client: &mut Client, out: &mut W) -> Result<(), ScriptError> {
        for (line, step) in &self.steps {
            info!(line, ?step, "running script step");
            if !step.apply(client, out)? {
                let reason = client
                    .last_error()
                    .map_or_else(|| "screen text did not match".to_string(), ToString::to_string);
                return Err(ScriptError::Failed {
                    line: *line,
                    action: format!("{step:?}"),
                    reason,
                });
            }
        }
        out.flush()?;
        Ok(())
    }
}

/// Split a line into arguments, honouring double quotes and `#` comments.
pub fn split_args(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut chars = line.chars();
    let mut current = String::new();
    let mut in_arg = false;

    while let Some(c) = chars.next() {
        match c {
            '#' if !in_arg => break,
            c if c.is_whitespace() => {
                if in_arg {
                    args.push(std::mem::take(&mut current));
                    in_arg = false;
                }
            }
            '"' => {
                in_arg = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => current.push(match chars.next() {
                            Some('n') => '\n',
                            Some('t') => '\t',
                            Some('b') => '\u{8}',
                            Some(c @ ('"' | '\\')) => c,
                            Some(other) => return Err(format!("unknown escape \\{other}")),
                            None => return Err("unterminated escape".to_string()),
                        }),
                        Some(c) => current.push(c),
                        None => return Err("unterminated quote".to_string()),
                    }
                }
            }
            c => {
                in_arg = true;
                current.push(c);
            }
        }
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

fn number<T: std::str::FromStr>(arg: &str) -> Result<T, String> {
    arg.parse().map_err(|_| format!("'{arg}' is not a valid number"))
}
