//! Command-line interface for p3270.

use crate::config::{ConfigBuilder, ConfigError};
use crate::launcher::DEFAULT_EMULATOR;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Configuration file looked up when `--config` is not given.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("p3270").join("p3270.cfg"))
}

/// Script a 3270 host session through s3270.
#[derive(Debug, Parser)]
#[command(name = "p3270", version, about)]
pub struct Cli {
    /// Configuration file (key = value lines).
    #[arg(long, env = "P3270_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emulator executable.
    #[arg(long, env = "P3270_EMULATOR", default_value = DEFAULT_EMULATOR)]
    pub emulator: PathBuf,

    /// Host name or address.
    #[arg(long)]
    pub host: Option<String>,

    /// Host port.
    #[arg(long)]
    pub port: Option<u16>,

    /// Terminal model, e.g. 3279-2.
    #[arg(long)]
    pub model: Option<String>,

    /// Logical unit name.
    #[arg(long = "lu")]
    pub lu_name: Option<String>,

    /// Connect over TLS.
    #[arg(long)]
    pub tls: bool,

    /// Accept any host certificate.
    #[arg(long)]
    pub no_verify_cert: bool,

    /// Host code page, e.g. cp037.
    #[arg(long)]
    pub code_page: Option<String>,

    /// Write an emulator trace to this file.
    #[arg(long)]
    pub trace_file: Option<PathBuf>,

    /// Directory for saved screens.
    #[arg(long)]
    pub screens_dir: Option<PathBuf>,

    /// Seconds to wait for host conditions.
    #[arg(long, default_value = "20", value_name = "SECS")]
    pub timeout: u64,

    /// Log client operations to this file [default: <data dir>/p3270/p3270.log]
    #[arg(long, env = "P3270_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Configuration file layer plus command-line overrides.
    pub fn config_builder(&self) -> Result<ConfigBuilder, ConfigError> {
        let mut builder = ConfigBuilder::default();
        let file = self
            .config
            .clone()
            .or_else(|| default_config_path().filter(|path| path.is_file()));
        if let Some(path) = file {
            builder = builder.file(path)?;
        }
        if let Some(host) = &self.host {
            builder = builder.host(host);
        }
        if let Some(port) = self.port {
            builder = builder.port(port);
        }
        if let Some(model) = &self.model {
            builder = builder.model(model);
        }
        if let Some(lu) = &self.lu_name {
            builder = builder.lu_name(lu);
        }
        if self.tls {
            builder = builder.enable_tls(true);
        }
        if self.no_verify_cert {
            builder = builder.verify_cert(false);
        }
        if let Some(code_page) = &self.code_page {
            builder = builder.code_page(code_page);
        }
        if let Some(trace) = &self.trace_file {
            builder = builder.trace_file(trace);
        }
        if let Some(dir) = &self.screens_dir {
            builder = builder.screens_dir(dir);
        }
        Ok(builder)
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the effective configuration.
    Config {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Connect, wait for an input field and print the screen.
    Screen,

    /// Connect, wait for an input field and print text at a position.
    Read {
        /// Row, 1-based.
        row: u16,
        /// Column, 1-based.
        col: u16,
        /// Number of characters.
        length: u16,
    },

    /// Connect and run an action script.
    Run {
        /// Script file; reads stdin when omitted.
        script: Option<PathBuf>,
    },
}
