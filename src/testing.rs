//! Scripted stand-in for the emulator.
//!
//! Lets client code be exercised without `s3270`: replies are queued up
//! front and every command the client writes is recorded.
//!
//! ```ignore
//! let emulator = ScriptedEmulator::new().ok().data(["READY"]);
//! let mut client = emulator.client(Config::default());
//!
//! assert!(client.connect());
//! assert_eq!(client.read_text_at_position(1, 1, 5).as_deref(), Some("READY"));
//! assert_eq!(emulator.sent(), ["Connect(B:localhost)", "Ascii(0,0,5)"]);
//! ```

use crate::client::Client;
use crate::config::Config;
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex, PoisonError};

/// Status line of a connected 24x80 session with the cursor at home.
pub const CONNECTED_STATUS: &str = "U F U C(localhost) I 2 24 80 0 0 0x0 0.000";

/// Queued replies plus a log of the commands written.
#[derive(Debug, Clone)]
pub struct ScriptedEmulator {
    replies: Vec<u8>,
    status: String,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl Default for ScriptedEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEmulator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Vec::new(),
            status: CONNECTED_STATUS.to_string(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Status line used by the replies queued after this call.
    #[must_use]
    pub fn status(mut self, line: &str) -> Self {
        self.status = line.to_string();
        self
    }

    /// Queue a successful reply without data.
    #[must_use]
    pub fn ok(self) -> Self {
        self.data::<[&str; 0], &str>([])
    }

    /// Queue a successful reply carrying `lines` as data.
    #[must_use]
    pub fn data<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.push_line(&format!("data: {}", line.as_ref()));
        }
        let status = self.status.clone();
        self.push_line(&status);
        self.push_line("ok");
        self
    }

    /// Queue a failed reply with `detail` as its data line.
    #[must_use]
    pub fn error(mut self, detail: &str) -> Self {
        self.push_line(&format!("data: {detail}"));
        let status = self.status.clone();
        self.push_line(&status);
        self.push_line("error");
        self
    }

    /// Queue raw bytes, e.g. a truncated or malformed reply.
    #[must_use]
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.replies.extend_from_slice(bytes);
        self
    }

    /// Streams for [`ClientBuilder::attach`](crate::ClientBuilder::attach).
    #[must_use]
    pub fn transport(&self) -> (RecordingWriter, Cursor<Vec<u8>>) {
        (
            RecordingWriter(Arc::clone(&self.sent)),
            Cursor::new(self.replies.clone()),
        )
    }

    /// A client attached to this emulator.
    #[must_use]
    pub fn client(&self, config: Config) -> Client {
        let (writer, reader) = self.transport();
        Client::attached(config, writer, reader)
    }

    /// Commands written so far, one per line.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        let sent = self.sent.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&sent)
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn push_line(&mut self, line: &str) {
        self.replies.extend_from_slice(line.as_bytes());
        self.replies.push(b'\n');
    }
}

/// Writer half of a [`ScriptedEmulator`] transport.
#[derive(Debug, Clone)]
pub struct RecordingWriter(Arc<Mutex<Vec<u8>>>);

impl Write for RecordingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("recording buffer poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_are_framed() {
        let emulator = ScriptedEmulator::new()
            .ok()
            .status("L U U N N 2 24 80 0 0 0x0 -")
            .data(["a", "b"])
            .error("refused");
        let (_, reader) = emulator.transport();
        let text = String::from_utf8(reader.into_inner()).unwrap();
        assert_eq!(
            text,
            format!(
                "{CONNECTED_STATUS}\nok\n\
                 data: a\ndata: b\nL U U N N 2 24 80 0 0 0x0 -\nok\n\
                 data: refused\nL U U N N 2 24 80 0 0 0x0 -\nerror\n"
            )
        );
    }

    #[test]
    fn test_sent_is_shared_between_clones() {
        let emulator = ScriptedEmulator::new();
        let (mut writer, _) = emulator.clone().transport();
        writer.write_all(b"Enter\nTab\n").unwrap();
        assert_eq!(emulator.sent(), ["Enter", "Tab"]);
    }
}
