//! p3270 - 3270 host automation through s3270
//!
//! Drives an IBM 3270 host session by running the `s3270` emulator as a
//! subprocess and talking to it over its script protocol.

// Error documentation is deferred - the errors are self-explanatory from types
#![allow(clippy::missing_errors_doc)]

pub mod channel;
pub mod cli;
pub mod client;
pub mod codec;
pub mod config;
pub mod launcher;
pub mod logging;
pub mod script;
pub mod status;
pub mod testing;

pub use channel::{ChannelError, CommandChannel, Outcome, Reply, ResponseGrammar};
pub use cli::{Cli, Command, default_config_path};
pub use client::{Client, ClientBuilder, ClientError, DEFAULT_TIMEOUT, ScreenFormat, WaitCondition};
pub use codec::{Charset, EncodeError};
pub use config::{CodePage, Config, ConfigBuilder, ConfigError, Geometry, Model};
pub use launcher::{DEFAULT_EMULATOR, EmulatorCommand, EmulatorProcess, LaunchError};
pub use logging::LogConfig;
pub use script::{Script, ScriptError, Step};
pub use status::StatusMessage;
pub use testing::ScriptedEmulator;
