//! Client-side character sets for the emulator's script channel.
//!
//! The emulator translates EBCDIC to a single-byte client character set
//! before writing to stdout. Which set depends on the host code page, so
//! every code page supported by [`crate::config::CodePage`] resolves to one
//! of the [`Charset`] tables here.

use serde::Serialize;
use thiserror::Error;

/// A character could not be represented in the client character set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("character {ch:?} at position {position} is not representable in {charset}")]
pub struct EncodeError {
    pub ch: char,
    pub position: usize,
    pub charset: Charset,
}

/// Single-byte character sets the emulator may use for its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Charset {
    /// ISO-8859-1, western European.
    Latin1,
    /// ISO-8859-2, central European.
    Latin2,
    /// ISO-8859-9, Turkish.
    Latin5,
    /// ISO-8859-15, western European with the euro sign.
    Latin9,
}

impl std::fmt::Display for Charset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// ISO-8859-2 code points for bytes 0xA0..=0xFF.
const LATIN2_HIGH: [char; 96] = [
    '\u{00A0}', '\u{0104}', '\u{02D8}', '\u{0141}', '\u{00A4}', '\u{013D}', '\u{015A}', '\u{00A7}',
    '\u{00A8}', '\u{0160}', '\u{015E}', '\u{0164}', '\u{0179}', '\u{00AD}', '\u{017D}', '\u{017B}',
    '\u{00B0}', '\u{0105}', '\u{02DB}', '\u{0142}', '\u{00B4}', '\u{013E}', '\u{015B}', '\u{02C7}',
    '\u{00B8}', '\u{0161}', '\u{015F}', '\u{0165}', '\u{017A}', '\u{02DD}', '\u{017E}', '\u{017C}',
    '\u{0154}', '\u{00C1}', '\u{00C2}', '\u{0102}', '\u{00C4}', '\u{0139}', '\u{0106}', '\u{00C7}',
    '\u{010C}', '\u{00C9}', '\u{0118}', '\u{00CB}', '\u{011A}', '\u{00CD}', '\u{00CE}', '\u{010E}',
    '\u{0110}', '\u{0143}', '\u{0147}', '\u{00D3}', '\u{00D4}', '\u{0150}', '\u{00D6}', '\u{00D7}',
    '\u{0158}', '\u{016E}', '\u{00DA}', '\u{0170}', '\u{00DC}', '\u{00DD}', '\u{0162}', '\u{00DF}',
    '\u{0155}', '\u{00E1}', '\u{00E2}', '\u{0103}', '\u{00E4}', '\u{013A}', '\u{0107}', '\u{00E7}',
    '\u{010D}', '\u{00E9}', '\u{0119}', '\u{00EB}', '\u{011B}', '\u{00ED}', '\u{00EE}', '\u{010F}',
    '\u{0111}', '\u{0144}', '\u{0148}', '\u{00F3}', '\u{00F4}', '\u{0151}', '\u{00F6}', '\u{00F7}',
    '\u{0159}', '\u{016F}', '\u{00FA}', '\u{0171}', '\u{00FC}', '\u{00FD}', '\u{0163}', '\u{02D9}',
];

impl Charset {
    /// Name as understood by the emulator and by iconv.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Latin1 => "iso8859-1",
            Self::Latin2 => "iso8859-2",
            Self::Latin5 => "iso8859-9",
            Self::Latin9 => "iso8859-15",
        }
    }

    /// Map one byte to its character.
    #[must_use]
    pub fn decode_byte(self, byte: u8) -> char {
        if byte < 0xA0 {
            return char::from(byte);
        }
        match self {
            Self::Latin1 => char::from(byte),
            Self::Latin2 => LATIN2_HIGH[usize::from(byte - 0xA0)],
            Self::Latin5 => match byte {
                0xD0 => '\u{011E}',
                0xDD => '\u{0130}',
                0xDE => '\u{015E}',
                0xF0 => '\u{011F}',
                0xFD => '\u{0131}',
                0xFE => '\u{015F}',
                b => char::from(b),
            },
            Self::Latin9 => match byte {
                0xA4 => '\u{20AC}',
                0xA6 => '\u{0160}',
                0xA8 => '\u{0161}',
                0xB4 => '\u{017D}',
                0xB8 => '\u{017E}',
                0xBC => '\u{0152}',
                0xBD => '\u{0153}',
                0xBE => '\u{0178}',
                b => char::from(b),
            },
        }
    }

    /// Map one character back to its byte, if the set contains it.
    #[must_use]
    pub fn encode_char(self, ch: char) -> Option<u8> {
        if let Ok(byte) = u8::try_from(u32::from(ch))
            && byte < 0xA0
        {
            return Some(byte);
        }
        (0xA0..=0xFF).find(|&b| self.decode_byte(b) == ch)
    }

    /// Decode raw emulator output.
    #[must_use]
    pub fn decode(self, bytes: &[u8]) -> String {
        bytes.iter().map(|&b| self.decode_byte(b)).collect()
    }

    /// Encode text for the emulator, failing on the first unrepresentable character.
    pub fn encode(self, text: &str) -> Result<Vec<u8>, EncodeError> {
        text.chars()
            .enumerate()
            .map(|(position, ch)| {
                self.encode_char(ch).ok_or(EncodeError {
                    ch,
                    position,
                    charset: self,
                })
            })
            .collect()
    }

    /// Decode one line read from the emulator, dropping the line terminator
    /// and any trailing carriage returns.
    #[must_use]
    pub fn decode_line(self, raw: &[u8]) -> String {
        let mut end = raw.len();
        if end > 0 && raw[end - 1] == b'\n' {
            end -= 1;
        }
        while end > 0 && raw[end - 1] == b'\r' {
            end -= 1;
        }
        self.decode(&raw[..end])
    }
}

/// Quote a literal argument for an emulator action, e.g. `String("...")`.
#[must_use]
pub fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for ch in text.chars() {
        if matches!(ch, '"' | '\\') {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}
