//! The 3270 client.
//!
//! Every host action is one round trip on the emulator's script channel.
//! Actions report success as `bool` (or `Option` for reads); the cause of
//! the most recent failure is kept in [`Client::last_error`] and logged.
//!
//! The client is `Send` but not internally locked: share it between
//! threads behind a `Mutex`.

use crate::channel::{ChannelError, CommandChannel, Reply, ResponseGrammar};
use crate::codec::quote;
use crate::config::{Config, Geometry};
use crate::launcher::{DEFAULT_EMULATOR, EmulatorCommand, EmulatorProcess, LaunchError, Spawned};
use crate::logging::LogConfig;
use crate::status::StatusMessage;
use std::fmt;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::dispatcher::DefaultGuard;
use tracing::{Dispatch, debug, error, info, warn};

/// Default bound for `Wait` actions.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// How long the emulator gets to exit after `Quit` before it is signalled.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Errors behind a failed client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("emulator exited: {0}")]
    EmulatorExited(String),

    #[error("emulator is not running; call connect first")]
    NotRunning,

    #[error("{0}")]
    Validation(String),

    #[error("{command} failed: {message}")]
    Command { command: String, message: String },

    #[error("unexpected reply to {command}: {detail}")]
    UnexpectedReply { command: String, detail: String },

    #[error("failed to open log file: {0}")]
    Log(#[source] std::io::Error),

    #[error("failed to write screen: {0}")]
    Output(#[source] std::io::Error),
}

/// File format of a saved screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScreenFormat {
    #[default]
    Html,
    Rtf,
    /// Plain text.
    Text,
}

impl FromStr for ScreenFormat {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "html" => Ok(Self::Html),
            "rtf" => Ok(Self::Rtf),
            "txt" | "text" => Ok(Self::Text),
            other => Err(ClientError::Validation(format!(
                "screen format '{other}' is invalid, expected html, rtf or txt"
            ))),
        }
    }
}

impl fmt::Display for ScreenFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Html => "html",
            Self::Rtf => "rtf",
            Self::Text => "txt",
        })
    }
}

/// Host conditions the emulator can wait for. Rows and columns are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one modifiable field on the screen.
    InputField,
    InputFieldAt { row: u16, col: u16 },
    InputFieldAtOffset(u32),
    CursorAt { row: u16, col: u16 },
    CursorAtOffset(u32),
    StringAt { row: u16, col: u16, text: String },
    StringAtOffset { offset: u32, text: String },
    /// Keyboard unlocked.
    Unlock,
    /// Host modified the screen.
    Output,
    Mode3270,
    NvtMode,
    Disconnect,
    /// Just let the timeout elapse.
    Seconds,
}

impl WaitCondition {
    /// The screen position the condition refers to, if any.
    const fn position(&self) -> Option<(u16, u16)> {
        match self {
            Self::InputFieldAt { row, col }
            | Self::CursorAt { row, col }
            | Self::StringAt { row, col, .. } => Some((*row, *col)),
            _ => None,
        }
    }

    fn directive(&self, timeout: Duration) -> String {
        // The emulator takes whole seconds; never shorten the bound.
        let secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        match self {
            Self::InputField => format!("Wait({secs}, inputField)"),
            Self::InputFieldAt { row, col } => format!("Wait({secs}, inputFieldAt, {row}, {col})"),
            Self::InputFieldAtOffset(offset) => format!("Wait({secs}, inputFieldAt, {offset})"),
            Self::CursorAt { row, col } => format!("Wait({secs}, cursorAt, {row}, {col})"),
            Self::CursorAtOffset(offset) => format!("Wait({secs}, cursorAt, {offset})"),
            Self::StringAt { row, col, text } => {
                format!("Wait({secs}, stringAt, {row}, {col}, {})", quote(text))
            }
            Self::StringAtOffset { offset, text } => {
                format!("Wait({secs}, stringAt, {offset}, {})", quote(text))
            }
            Self::Unlock => format!("Wait({secs}, unlock)"),
            Self::Output => format!("Wait({secs}, output)"),
            Self::Mode3270 => format!("Wait({secs}, 3270mode)"),
            Self::NvtMode => format!("Wait({secs}, nvtmode)"),
            Self::Disconnect => format!("Wait({secs}, disconnect)"),
            Self::Seconds => format!("Wait({secs}, seconds)"),
        }
    }
}

type Writer = Box<dyn Write + Send>;
type Reader = Box<dyn BufRead + Send>;

/// The live script channel and, when we launched it, the emulator process.
struct Session {
    channel: CommandChannel<Writer, Reader>,
    process: Option<EmulatorProcess>,
}

impl Session {
    /// Ask the emulator to quit, close its streams and reap it.
    /// Returns its stderr output, if any.
    fn close(self, grace: Duration) -> Option<String> {
        let Self {
            mut channel,
            process,
        } = self;
        if let Err(e) = channel.send("Quit") {
            debug!("Quit not delivered: {}", e);
        }
        drop(channel.into_inner());

        let mut process = process?;
        match process.terminate(grace) {
            Ok(code) => debug!(code, "emulator stopped"),
            Err(e) => warn!("failed to stop emulator: {}", e),
        }
        process.stderr_output()
    }
}

/// Builder for [`Client`].
pub struct ClientBuilder {
    config: Arc<Config>,
    emulator: PathBuf,
    timeout: Duration,
    grammar: ResponseGrammar,
    logging: Option<LogConfig>,
}

impl ClientBuilder {
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        Self {
            config: config.into(),
            emulator: PathBuf::from(DEFAULT_EMULATOR),
            timeout: DEFAULT_TIMEOUT,
            grammar: ResponseGrammar::default(),
            logging: None,
        }
    }

    /// Emulator executable; a bare name is looked up on `PATH`.
    #[must_use]
    pub fn emulator(mut self, path: impl Into<PathBuf>) -> Self {
        self.emulator = path.into();
        self
    }

    /// Bound for `Wait` actions.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn grammar(mut self, grammar: ResponseGrammar) -> Self {
        self.grammar = grammar;
        self
    }

    /// Log this client's operations to a file of its own.
    #[must_use]
    pub fn logging(mut self, logging: LogConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build a client that launches the emulator on `connect`.
    pub fn build(self) -> Result<Client, ClientError> {
        let dispatch = self.dispatch()?;
        let command = EmulatorCommand::new(self.emulator.clone(), &self.config);
        Ok(self.assemble(Some(command), None, dispatch))
    }

    /// Build a client on already-open script streams, e.g. an emulator's
    /// script port or a scripted test double.
    pub fn attach<W, R>(self, writer: W, reader: R) -> Result<Client, ClientError>
    where
        W: Write + Send + 'static,
        R: BufRead + Send + 'static,
    {
        let dispatch = self.dispatch()?;
        let session = self.open_session(Box::new(writer), Box::new(reader), None);
        Ok(self.assemble(None, Some(session), dispatch))
    }

    fn dispatch(&self) -> Result<Option<Dispatch>, ClientError> {
        self.logging
            .as_ref()
            .map(LogConfig::dispatch)
            .transpose()
            .map_err(ClientError::Log)
    }

    fn open_session(
        &self,
        writer: Writer,
        reader: Reader,
        process: Option<EmulatorProcess>,
    ) -> Session {
        Session {
            channel: CommandChannel::new(
                writer,
                reader,
                self.config.code_page.charset(),
                self.grammar.clone(),
            ),
            process,
        }
    }

    fn assemble(
        self,
        command: Option<EmulatorCommand>,
        session: Option<Session>,
        dispatch: Option<Dispatch>,
    ) -> Client {
        Client {
            config: self.config,
            command,
            grammar: self.grammar,
            timeout: self.timeout,
            dispatch,
            session,
            connected: false,
            last_status: None,
            last_error: None,
        }
    }
}

/// A 3270 session driven through the emulator.
pub struct Client {
    config: Arc<Config>,
    /// `None` for attached clients, which cannot relaunch.
    command: Option<EmulatorCommand>,
    grammar: ResponseGrammar,
    timeout: Duration,
    dispatch: Option<Dispatch>,
    session: Option<Session>,
    connected: bool,
    last_status: Option<StatusMessage>,
    last_error: Option<ClientError>,
}

impl Client {
    /// Client with default emulator, timeout and grammar, logging through
    /// whatever subscriber the application installed.
    pub fn new(config: impl Into<Arc<Config>>) -> Self {
        let builder = ClientBuilder::new(config);
        let command = EmulatorCommand::new(DEFAULT_EMULATOR, &builder.config);
        builder.assemble(Some(command), None, None)
    }

    /// Client on already-open script streams, without its own log file.
    pub fn attached<W, R>(config: impl Into<Arc<Config>>, writer: W, reader: R) -> Self
    where
        W: Write + Send + 'static,
        R: BufRead + Send + 'static,
    {
        let builder = ClientBuilder::new(config);
        let session = builder.open_session(Box::new(writer), Box::new(reader), None);
        builder.assemble(None, Some(session), None)
    }

    pub fn builder(config: impl Into<Arc<Config>>) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Status line of the most recent reply.
    #[must_use]
    pub const fn status(&self) -> Option<&StatusMessage> {
        self.last_status.as_ref()
    }

    /// Why the most recent operation failed; `None` if it succeeded.
    #[must_use]
    pub const fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Screen geometry as last reported by the emulator, else the model's.
    #[must_use]
    pub fn geometry(&self) -> Geometry {
        match &self.last_status {
            Some(status) if status.rows > 0 && status.cols > 0 => Geometry {
                rows: status.rows,
                cols: status.cols,
            },
            _ => self.config.geometry(),
        }
    }

    // Session lifecycle

    /// Launch the emulator if needed and connect to the configured host.
    pub fn connect(&mut self) -> bool {
        let _log = self.log_scope();
        self.last_error = None;
        if let Err(e) = self.ensure_session() {
            return self.fail(e);
        }

        let host = &self.config.host;
        let target = match &self.config.lu_name {
            Some(lu) => {
                info!("Connect to host [{}] with LUName: [{}]", host, lu);
                format!("{lu}@{host}")
            }
            None => {
                info!("Connect to host [{}] with no LUName", host);
                host.clone()
            }
        };
        let mode = if self.config.enable_tls { 'L' } else { 'B' };

        self.connected = self.run(&format!("Connect({mode}:{target})"));
        if !self.connected {
            self.teardown();
        }
        self.connected
    }

    /// Disconnect from the host and stop the emulator.
    pub fn disconnect(&mut self) -> bool {
        let _log = self.log_scope();
        info!("Disconnect from host ({})", self.config.host);
        let ok = self.reset_and_run("Disconnect");
        self.teardown();
        ok
    }

    /// Quit the emulator. Best effort; always reports success.
    pub fn end_session(&mut self) -> bool {
        let _log = self.log_scope();
        info!("Ending the session");
        self.last_error = None;
        self.teardown();
        true
    }

    /// Local connection flag; no round trip.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Ask the emulator for its current status. Also refreshes the local
    /// connection flag when the host dropped the session.
    pub fn connection_status(&mut self) -> Option<StatusMessage> {
        let _log = self.log_scope();
        self.last_error = None;
        let status = match self.exchange("NoOpCommand") {
            Ok(reply) => reply.status,
            Err(e) => {
                self.fail(e);
                return None;
            }
        };
        if let Some(status) = &status
            && !status.is_connected()
        {
            self.connected = false;
        }
        status
    }

    // Keys

    pub fn send_enter(&mut self) -> bool {
        self.action("Sending Enter key", "Enter")
    }

    /// Send a Program Function key, `n` in 1..=24.
    pub fn send_pf(&mut self, n: u8) -> bool {
        let _log = self.log_scope();
        if !(1..=24).contains(&n) {
            return self.invalid(format!("Specified PF key ({n}) out of the range 1..24"));
        }
        info!("Sending PF key {} to remote host", n);
        self.reset_and_run(&format!("PF({n})"))
    }

    /// Send a Program Attention key, `n` in 1..=3.
    pub fn send_pa(&mut self, n: u8) -> bool {
        let _log = self.log_scope();
        if !(1..=3).contains(&n) {
            return self.invalid(format!("Specified PA key ({n}) out of the range 1..3"));
        }
        info!("Sending PA key {} to remote host", n);
        self.reset_and_run(&format!("PA({n})"))
    }

    pub fn send_tab(&mut self) -> bool {
        self.action("Sending tab to remote host", "Tab")
    }

    pub fn send_back_tab(&mut self) -> bool {
        self.action("Sending back tab to remote host", "BackTab")
    }

    pub fn send_home(&mut self) -> bool {
        self.action("Sending Home key to remote host", "Home")
    }

    pub fn send_back_space(&mut self) -> bool {
        self.action("Sending back space to remote host", "BackSpace")
    }

    /// Press keys one by one. `\n`, `\t` and `\b` map to Enter, Tab and
    /// BackSpace. Stops at the first failure.
    pub fn send_keys(&mut self, keys: &str) -> bool {
        let _log = self.log_scope();
        info!("Sending keys [{}] to remote host", keys.escape_debug());
        self.last_error = None;
        for key in keys.chars() {
            let command = match key {
                '\n' => "Enter".to_string(),
                '\t' => "Tab".to_string(),
                '\u{8}' => "BackSpace".to_string(),
                c if c.is_ascii_alphanumeric() => format!("Key({c})"),
                c => format!("Key(U+{:04X})", u32::from(c)),
            };
            if !self.run(&command) {
                return false;
            }
        }
        true
    }

    /// Type text at the cursor.
    pub fn send_text(&mut self, text: &str) -> bool {
        let _log = self.log_scope();
        if text.chars().any(char::is_control) {
            return self.invalid(format!(
                "text [{}] contains control characters",
                text.escape_debug()
            ));
        }
        info!("Send the following text: [{}]", text);
        self.reset_and_run(&format!("String({})", quote(text)))
    }

    // Editing

    pub fn clear_screen(&mut self) -> bool {
        self.action("Clear screen", "Clear")
    }

    pub fn del_char(&mut self) -> bool {
        self.action("Deleting char", "Delete")
    }

    pub fn del_field(&mut self) -> bool {
        self.action("Deleting field", "DeleteField")
    }

    pub fn del_word(&mut self) -> bool {
        self.action("Deleting word", "DeleteWord")
    }

    pub fn erase_char(&mut self) -> bool {
        self.action("Erase character", "Erase")
    }

    // Cursor

    pub fn move_cursor_up(&mut self) -> bool {
        self.action("Move cursor Up", "Up")
    }

    pub fn move_cursor_down(&mut self) -> bool {
        self.action("Move cursor Down", "Down")
    }

    pub fn move_cursor_left(&mut self) -> bool {
        self.action("Move cursor left", "Left")
    }

    pub fn move_cursor_right(&mut self) -> bool {
        self.action("Move cursor right", "Right")
    }

    /// Move the cursor to a 1-based position.
    pub fn move_to(&mut self, row: u16, col: u16) -> bool {
        let _log = self.log_scope();
        if let Err(e) = self.check_area(row, col, 1, 1) {
            return self.fail(e);
        }
        info!("Move cursor to the position ({},{})", row, col);
        self.reset_and_run(&format!("MoveCursor({}, {})", row - 1, col - 1))
    }

    pub fn move_to_first_input_field(&mut self) -> bool {
        self.action("Move cursor to the first input field", "Home")
    }

    // Reading

    /// Read `length` characters starting at a 1-based position. A zero
    /// length reads nothing and needs no round trip.
    pub fn read_text_at_position(&mut self, row: u16, col: u16, length: u16) -> Option<String> {
        let _log = self.log_scope();
        self.last_error = None;
        if let Err(e) = self.check_area(row, col, 1, 1) {
            self.fail(e);
            return None;
        }
        if length == 0 {
            return Some(String::new());
        }
        info!("Reading at position ({},{})", row, col);
        self.query(&format!("Ascii({},{},{})", row - 1, col - 1, length))
            .map(|data| data.join("\n"))
    }

    /// Whether the screen shows exactly `expected` at a 1-based position.
    pub fn contains_text_at_position(&mut self, row: u16, col: u16, expected: &str) -> bool {
        let Ok(length) = u16::try_from(expected.chars().count()) else {
            return self.invalid("expected text is longer than a screen".to_string());
        };
        self.read_text_at_position(row, col, length)
            .is_some_and(|text| text == expected)
    }

    /// Read a rectangle, one string per row.
    pub fn read_text_area(&mut self, row: u16, col: u16, rows: u16, cols: u16) -> Option<Vec<String>> {
        let _log = self.log_scope();
        self.last_error = None;
        if let Err(e) = self.check_area(row, col, rows, cols) {
            self.fail(e);
            return None;
        }
        info!(
            "Reading area at ({},{}) with rows: {} and cols: {}",
            row, col, rows, cols
        );
        let command = format!("Ascii({},{},{},{})", row - 1, col - 1, rows, cols);
        let data = self.query(&command)?;
        let lines: Vec<String> = data
            .join("\n")
            .split('\n')
            .map(|line| line.chars().take(usize::from(cols)).collect())
            .collect();
        if lines.len() != usize::from(rows) {
            self.fail(ClientError::UnexpectedReply {
                command,
                detail: format!("expected {rows} rows, got {}", lines.len()),
            });
            return None;
        }
        Some(lines)
    }

    /// The whole screen as text, rows separated by newlines.
    pub fn get_screen(&mut self) -> Option<String> {
        let _log = self.log_scope();
        info!("Getting the screen content in text format");
        self.last_error = None;
        self.query("PrintText(string)").map(|data| data.join("\n"))
    }

    /// Print the screen to stdout between two lines of `*`.
    pub fn print_screen(&mut self) -> bool {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        self.print_screen_to(&mut out)
    }

    /// Write the screen between two lines of `*` as wide as the screen.
    pub fn print_screen_to<W: Write>(&mut self, out: &mut W) -> bool {
        let Some(screen) = self.get_screen() else {
            return false;
        };
        let _log = self.log_scope();
        let frame = "*".repeat(usize::from(self.geometry().cols));
        match writeln!(out, "{frame}\n{screen}\n{frame}").and_then(|()| out.flush()) {
            Ok(()) => true,
            Err(e) => self.fail(ClientError::Output(e)),
        }
    }

    /// Save the screen under the screens directory, appending to an
    /// existing file.
    pub fn save_screen(&mut self, file_name: &str, format: ScreenFormat) -> bool {
        let _log = self.log_scope();
        if file_name.is_empty() {
            return self.invalid("screen file name is empty".to_string());
        }
        let path = self
            .config
            .screens_dir
            .as_ref()
            .map_or_else(|| PathBuf::from(file_name), |dir| dir.join(file_name));
        let target = quote(&path.to_string_lossy());
        info!("Save an '{}' screen to file [{}]", format, path.display());
        let command = match format {
            ScreenFormat::Html => format!("PrintText(html,append,file,{target})"),
            ScreenFormat::Rtf => format!("PrintText(rtf,append,file,{target})"),
            ScreenFormat::Text => format!("PrintText(append,file,{target})"),
        };
        self.reset_and_run(&command)
    }

    // Waiting

    /// Block until the emulator reports `condition` or the timeout expires.
    pub fn wait_for(&mut self, condition: &WaitCondition) -> bool {
        let _log = self.log_scope();
        if let Some((row, col)) = condition.position()
            && let Err(e) = self.check_area(row, col, 1, 1)
        {
            return self.fail(e);
        }
        debug!(?condition, timeout = ?self.timeout, "waiting");
        self.reset_and_run(&condition.directive(self.timeout))
    }

    /// Wait until the host creates at least one modifiable field.
    pub fn wait_for_field(&mut self) -> bool {
        self.wait_for(&WaitCondition::InputField)
    }

    pub fn wait_for_field_at(&mut self, row: u16, col: u16) -> bool {
        self.wait_for(&WaitCondition::InputFieldAt { row, col })
    }

    pub fn wait_for_cursor_at(&mut self, row: u16, col: u16) -> bool {
        self.wait_for(&WaitCondition::CursorAt { row, col })
    }

    pub fn wait_for_string_at(&mut self, row: u16, col: u16, text: &str) -> bool {
        self.wait_for(&WaitCondition::StringAt {
            row,
            col,
            text: text.to_string(),
        })
    }

    pub fn wait_for_unlock(&mut self) -> bool {
        self.wait_for(&WaitCondition::Unlock)
    }

    pub fn wait_for_output(&mut self) -> bool {
        self.wait_for(&WaitCondition::Output)
    }

    pub fn wait_for_3270_mode(&mut self) -> bool {
        self.wait_for(&WaitCondition::Mode3270)
    }

    pub fn wait_for_disconnect(&mut self) -> bool {
        self.wait_for(&WaitCondition::Disconnect)
    }

    // Composite

    /// Replace the field at a position with `text` and check it took.
    pub fn try_send_text_to_field(&mut self, text: &str, row: u16, col: u16) -> bool {
        self.move_to(row, col)
            && self.del_field()
            && self.send_text(text)
            && self.contains_text_at_position(row, col, text)
    }

    // Internals

    fn log_scope(&self) -> Option<DefaultGuard> {
        self.dispatch.as_ref().map(tracing::dispatcher::set_default)
    }

    fn action(&mut self, message: &str, command: &str) -> bool {
        let _log = self.log_scope();
        info!("{}", message);
        self.reset_and_run(command)
    }

    fn reset_and_run(&mut self, command: &str) -> bool {
        self.last_error = None;
        self.run(command)
    }

    fn run(&mut self, command: &str) -> bool {
        match self.round_trip(command) {
            Ok(_) => true,
            Err(e) => self.fail(e),
        }
    }

    fn query(&mut self, command: &str) -> Option<Vec<String>> {
        match self.round_trip(command) {
            Ok(data) => Some(data),
            Err(e) => {
                self.fail(e);
                None
            }
        }
    }

    fn round_trip(&mut self, command: &str) -> Result<Vec<String>, ClientError> {
        let reply = self.exchange(command)?;
        match reply.error_message() {
            None => Ok(reply.data),
            Some(message) => Err(ClientError::Command {
                command: command.to_string(),
                message,
            }),
        }
    }

    /// One command and its reply, whatever the outcome. A broken channel
    /// ends the session.
    fn exchange(&mut self, command: &str) -> Result<Reply, ClientError> {
        let session = self.session.as_mut().ok_or(ClientError::NotRunning)?;
        match session.channel.execute(command) {
            Ok(reply) => {
                if let Some(status) = &reply.status {
                    self.last_status = Some(status.clone());
                }
                Ok(reply)
            }
            Err(ChannelError::Encode(e)) => Err(ChannelError::Encode(e).into()),
            Err(e) => {
                error!("channel failed during {}: {}", command, e);
                match self.teardown() {
                    Some(stderr) => Err(ClientError::EmulatorExited(stderr)),
                    None => Err(e.into()),
                }
            }
        }
    }

    fn ensure_session(&mut self) -> Result<(), ClientError> {
        if self.session.is_some() {
            return Ok(());
        }
        let command = self.command.as_ref().ok_or(ClientError::NotRunning)?;
        let Spawned {
            process,
            stdin,
            stdout,
        } = command.spawn()?;
        self.session = Some(Session {
            channel: CommandChannel::new(
                Box::new(stdin),
                Box::new(BufReader::new(stdout)),
                self.config.code_page.charset(),
                self.grammar.clone(),
            ),
            process: Some(process),
        });
        Ok(())
    }

    fn teardown(&mut self) -> Option<String> {
        self.connected = false;
        let stderr = self.session.take()?.close(EXIT_GRACE);
        if let Some(stderr) = &stderr {
            warn!("emulator stderr: {}", stderr);
        }
        stderr
    }

    fn check_area(&self, row: u16, col: u16, rows: u16, cols: u16) -> Result<(), ClientError> {
        let geometry = self.geometry();
        let fits = |start: u16, len: u16, max: u16| {
            start >= 1 && len >= 1 && u32::from(start) + u32::from(len) - 1 <= u32::from(max)
        };
        if fits(row, rows, geometry.rows) && fits(col, cols, geometry.cols) {
            Ok(())
        } else {
            Err(ClientError::Validation(format!(
                "area at ({row},{col}) of {rows}x{cols} is outside the {}x{} screen",
                geometry.rows, geometry.cols
            )))
        }
    }

    fn invalid(&mut self, message: String) -> bool {
        self.fail(ClientError::Validation(message))
    }

    fn fail(&mut self, error: ClientError) -> bool {
        match &error {
            ClientError::Validation(_) | ClientError::Command { .. } => warn!("{}", error),
            _ => error!("{}", error),
        }
        self.last_error = Some(error);
        false
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if self.session.is_some() {
            let _log = self.log_scope();
            self.teardown();
        }
    }
}
