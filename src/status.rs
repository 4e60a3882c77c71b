//! The emulator's status line.
//!
//! Every reply carries a line of 12 blank-separated fields describing the
//! terminal after the command ran, for example:
//!
//! ```text
//! U F U C(localhost) I 2 24 80 8 2 0x0 0.000
//! ```

use serde::Serialize;
use std::time::Duration;

/// Keyboard lock state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyboardState {
    Unlocked,
    /// Waiting for the host, or not connected.
    Locked,
    /// Locked because of an operator error.
    OperatorError,
    Unknown,
}

/// Whether the host formatted the screen into fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenFormatting {
    Formatted,
    Unformatted,
    Unknown,
}

/// Protection of the field under the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProtection {
    Protected,
    Unprotected,
    Unknown,
}

/// Host connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connected { host: String },
    NotConnected,
}

/// Emulator mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmulatorMode {
    /// 3270 mode.
    Tn3270,
    NvtLine,
    NvtCharacter,
    /// Connected but not yet negotiated.
    Unnegotiated,
    NotConnected,
    Unknown,
}

/// A parsed status line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusMessage {
    pub keyboard: KeyboardState,
    pub screen: ScreenFormatting,
    pub field: FieldProtection,
    pub connection: ConnectionState,
    pub emulator: EmulatorMode,
    /// Model number, 2 to 5.
    pub model: u8,
    pub rows: u16,
    pub cols: u16,
    /// Cursor position (row, col), 1-based.
    pub cursor: (u16, u16),
    /// X window id; always `0x0` for s3270.
    pub window_id: String,
    /// Host response time of the command, if it waited for the host.
    pub exec_time: Option<Duration>,
}

impl StatusMessage {
    /// Parse a status line. Returns `None` unless it has exactly 12 fields
    /// with numeric model, geometry and cursor.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split(' ').collect();
        let [keyboard, screen, field, connection, emulator, model, rows, cols, row, col, window, time] =
            fields.as_slice()
        else {
            return None;
        };

        let connection = if let Some(host) = connection
            .strip_prefix("C(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            ConnectionState::Connected {
                host: host.to_string(),
            }
        } else if *connection == "N" {
            ConnectionState::NotConnected
        } else {
            return None;
        };

        let cursor_row: u16 = row.parse().ok()?;
        let cursor_col: u16 = col.parse().ok()?;

        Some(Self {
            keyboard: match *keyboard {
                "U" => KeyboardState::Unlocked,
                "L" => KeyboardState::Locked,
                "E" => KeyboardState::OperatorError,
                _ => KeyboardState::Unknown,
            },
            screen: match *screen {
                "F" => ScreenFormatting::Formatted,
                "U" => ScreenFormatting::Unformatted,
                _ => ScreenFormatting::Unknown,
            },
            field: match *field {
                "P" => FieldProtection::Protected,
                "U" => FieldProtection::Unprotected,
                _ => FieldProtection::Unknown,
            },
            connection,
            emulator: match *emulator {
                "I" => EmulatorMode::Tn3270,
                "L" => EmulatorMode::NvtLine,
                "C" => EmulatorMode::NvtCharacter,
                "P" => EmulatorMode::Unnegotiated,
                "N" => EmulatorMode::NotConnected,
                _ => EmulatorMode::Unknown,
            },
            model: model.parse().ok()?,
            rows: rows.parse().ok()?,
            cols: cols.parse().ok()?,
            cursor: (cursor_row.checked_add(1)?, cursor_col.checked_add(1)?),
            window_id: (*window).to_string(),
            exec_time: time
                .parse::<f64>()
                .ok()
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok()),
        })
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.connection, ConnectionState::Connected { .. })
    }

    /// Screen definition (rows, cols).
    #[must_use]
    pub const fn screen_definition(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }
}
