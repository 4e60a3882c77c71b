//! Request/response channel over the emulator's script streams.
//!
//! One command line goes out, then lines are read back until a terminator:
//!
//! ```text
//! > Ascii(0,0,5)
//! < data: READY
//! < U F U C(localhost) I 2 24 80 0 5 0x0 0.000
//! < ok
//! ```

use crate::codec::{Charset, EncodeError};
use crate::status::StatusMessage;
use std::io::{BufRead, Write};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors on the command channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to send command: {0}")]
    Send(#[source] std::io::Error),

    #[error("failed to receive reply: {0}")]
    Receive(#[source] std::io::Error),

    #[error("command cannot be encoded: {0}")]
    Encode(#[from] EncodeError),

    #[error("emulator closed its output before the reply was complete")]
    Closed,
}

/// Line grammar of replies.
///
/// The defaults match the s3270 script protocol; older or patched emulator
/// builds may differ, so every marker can be replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseGrammar {
    /// Prefix of payload lines. One space after it is also stripped.
    pub data_prefix: String,
    /// Terminator of a successful reply.
    pub ok: String,
    /// Prefix of the terminator of a failed reply.
    pub error: String,
}

impl Default for ResponseGrammar {
    fn default() -> Self {
        Self {
            data_prefix: "data:".to_string(),
            ok: "ok".to_string(),
            error: "error".to_string(),
        }
    }
}

/// Terminal outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    /// The terminator line, e.g. `error` or `error(Wait)`.
    Error(String),
}

/// A complete reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub data: Vec<String>,
    pub status: Option<StatusMessage>,
    pub outcome: Outcome,
}

impl Reply {
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self.outcome, Outcome::Ok)
    }

    /// Human-readable failure detail: the data lines if any, otherwise the terminator.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Ok => None,
            Outcome::Error(line) if self.data.is_empty() => Some(line.clone()),
            Outcome::Error(_) => Some(self.data.join("\n")),
        }
    }
}

/// Synchronous command channel. `&mut self` keeps one command in flight.
pub struct CommandChannel<W, R> {
    writer: W,
    reader: R,
    charset: Charset,
    grammar: ResponseGrammar,
    line: Vec<u8>,
}

impl<W: Write, R: BufRead> CommandChannel<W, R> {
    pub fn new(writer: W, reader: R, charset: Charset, grammar: ResponseGrammar) -> Self {
        Self {
            writer,
            reader,
            charset,
            grammar,
            line: Vec::with_capacity(256),
        }
    }

    /// Send a command and read its complete reply.
    pub fn execute(&mut self, command: &str) -> Result<Reply, ChannelError> {
        self.send(command)?;
        self.receive()
    }

    /// Send a command without reading a reply.
    pub fn send(&mut self, command: &str) -> Result<(), ChannelError> {
        let mut bytes = self.charset.encode(command)?;
        bytes.push(b'\n');
        debug!(command, "sending command");
        self.writer.write_all(&bytes).map_err(ChannelError::Send)?;
        self.writer.flush().map_err(ChannelError::Send)
    }

    /// Read lines until the reply terminator.
    pub fn receive(&mut self) -> Result<Reply, ChannelError> {
        let mut data = Vec::new();
        let mut status_line: Option<String> = None;

        loop {
            self.line.clear();
            let n = self
                .reader
                .read_until(b'\n', &mut self.line)
                .map_err(ChannelError::Receive)?;
            if n == 0 {
                return Err(ChannelError::Closed);
            }
            let line = self.charset.decode_line(&self.line);
            trace!(%line, "received line");

            if let Some(payload) = line.strip_prefix(self.grammar.data_prefix.as_str()) {
                data.push(payload.strip_prefix(' ').unwrap_or(payload).to_string());
            } else if line == self.grammar.ok {
                return Ok(self.finish(data, status_line, Outcome::Ok));
            } else if line.starts_with(self.grammar.error.as_str()) {
                return Ok(self.finish(data, status_line, Outcome::Error(line)));
            } else {
                status_line = Some(line);
            }
        }
    }

    fn finish(&self, data: Vec<String>, status_line: Option<String>, outcome: Outcome) -> Reply {
        let status = status_line.as_deref().and_then(StatusMessage::parse);
        debug!(
            data_lines = data.len(),
            status = status_line.as_deref().unwrap_or(""),
            ?outcome,
            "reply complete"
        );
        Reply {
            data,
            status,
            outcome,
        }
    }

    pub const fn charset(&self) -> Charset {
        self.charset
    }

    /// Give back the underlying streams.
    pub fn into_inner(self) -> (W, R) {
        (self.writer, self.reader)
    }
}
