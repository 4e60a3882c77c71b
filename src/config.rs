//! Session configuration.
//!
//! A [`Config`] is assembled by [`ConfigBuilder`] from three layers, later
//! layers winning: built-in defaults, an optional `key = value` file, and
//! explicit overrides set on the builder.
//!
//! ```text
//! # p3270.cfg
//! hostname   = mainframe.example.com
//! port       = 992
//! model      = 3279-4
//! enableTLS  = yes
//! codePage   = cp1147
//! screensDir = /var/tmp/screens
//! ```

use crate::codec::Charset;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z]+)\s*=(.*)$").unwrap_or_else(|e| panic!("invalid entry regex: {e}"))
});

static MODEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(3278|3279)-([2-5])$").unwrap_or_else(|e| panic!("invalid model regex: {e}"))
});

/// Errors raised while building a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("the model ({0}) is not a valid model, expected 3278-N or 3279-N with N in 2..5")]
    InvalidModel(String),

    #[error("host port ({0}) is out of range 1..65535")]
    InvalidPort(String),

    #[error("the code page ({0}) is not valid")]
    UnknownCodePage(String),

    #[error("the code page {name} {description} is not supported: its output is not a western single-byte set")]
    UnsupportedCodePage {
        name: &'static str,
        description: &'static str,
    },

    #[error("the value of {key} should be yes or no, got {value:?}")]
    InvalidFlag { key: &'static str, value: String },

    #[error("the screens directory ({}) does not exist", .0.display())]
    MissingScreensDir(PathBuf),

    #[error("invalid configuration: {}", join_errors(.0))]
    Multiple(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Screen geometry in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub rows: u16,
    pub cols: u16,
}

/// A 3278/3279 terminal model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Model {
    family: u16,
    number: u8,
}

impl Model {
    /// Screen geometry for the model number.
    #[must_use]
    pub const fn geometry(self) -> Geometry {
        match self.number {
            3 => Geometry { rows: 32, cols: 80 },
            4 => Geometry { rows: 43, cols: 80 },
            5 => Geometry { rows: 27, cols: 132 },
            _ => Geometry { rows: 24, cols: 80 },
        }
    }

    #[must_use]
    pub const fn number(self) -> u8 {
        self.number
    }

    /// Whether this is a color (3279) model.
    #[must_use]
    pub const fn is_color(self) -> bool {
        self.family == 3279
    }
}

impl Default for Model {
    fn default() -> Self {
        Self {
            family: 3279,
            number: 2,
        }
    }
}

impl FromStr for Model {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = MODEL
            .captures(s)
            .ok_or_else(|| ConfigError::InvalidModel(s.to_string()))?;
        let family = caps[1]
            .parse()
            .map_err(|_| ConfigError::InvalidModel(s.to_string()))?;
        let number = caps[2]
            .parse()
            .map_err(|_| ConfigError::InvalidModel(s.to_string()))?;
        Ok(Self { family, number })
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.family, self.number)
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Host code page, passed to the emulator as its `-charset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CodePage {
    name: &'static str,
    description: &'static str,
    charset: Charset,
}

/// Code pages whose emulator output is a western single-byte set.
const CODE_PAGES: &[(&str, &str, Charset)] = &[
    ("cp037", "(cp37, us, us-intl)", Charset::Latin1),
    ("cp273", "(german)", Charset::Latin1),
    ("cp275", "(brazilian)", Charset::Latin1),
    ("cp277", "(norwegian)", Charset::Latin1),
    ("cp278", "(finnish)", Charset::Latin1),
    ("cp280", "(italian)", Charset::Latin1),
    ("cp284", "(spanish)", Charset::Latin1),
    ("cp285", "(uk)", Charset::Latin1),
    ("cp297", "(french)", Charset::Latin1),
    ("cp500", "(belgian)", Charset::Latin1),
    ("cp870", "(polish, slovenian)", Charset::Latin2),
    ("cp871", "(icelandic)", Charset::Latin1),
    ("cp1026", "(turkish)", Charset::Latin5),
    ("cp1047", "", Charset::Latin1),
    ("cp1140", "(us-euro)", Charset::Latin9),
    ("cp1141", "(german-euro)", Charset::Latin9),
    ("cp1142", "(norwegian-euro)", Charset::Latin9),
    ("cp1143", "(finnish-euro)", Charset::Latin9),
    ("cp1144", "(italian-euro)", Charset::Latin9),
    ("cp1145", "(spanish-euro)", Charset::Latin9),
    ("cp1146", "(uk-euro)", Charset::Latin9),
    ("cp1147", "(french-euro)", Charset::Latin9),
    ("cp1148", "(belgian-euro)", Charset::Latin9),
    ("cp1149", "(icelandic-euro)", Charset::Latin9),
    ("apl", "", Charset::Latin1),
    ("bracket", "(oldibm, bracket437)", Charset::Latin1),
];

/// Code pages the emulator knows but whose output we cannot decode.
const UNSUPPORTED_CODE_PAGES: &[(&str, &str)] = &[
    ("cp424", "(hebrew)"),
    ("cp803", "(hebrew-old)"),
    ("cp875", "(greek)"),
    ("cp880", "(russian)"),
    ("cp930", "(cp290, japanese-290, japanese-kana)"),
    ("cp935", "(cp836, simplified-chinese)"),
    ("cp937", "(traditional-chinese)"),
    ("cp939", "(cp1027, japanese-1027, japanese-latin)"),
    ("cp1160", "(thai)"),
    ("cp1388", "(chinese-gb18030)"),
];

impl CodePage {
    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        self.description
    }

    /// Character set of the emulator's output for this code page.
    #[must_use]
    pub const fn charset(self) -> Charset {
        self.charset
    }
}

impl Default for CodePage {
    fn default() -> Self {
        Self {
            name: "cp037",
            description: "(cp37, us, us-intl)",
            charset: Charset::Latin1,
        }
    }
}

impl FromStr for CodePage {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(&(name, description, charset)) = CODE_PAGES.iter().find(|(n, ..)| *n == s) {
            return Ok(Self {
                name,
                description,
                charset,
            });
        }
        if let Some(&(name, description)) = UNSUPPORTED_CODE_PAGES.iter().find(|(n, _)| *n == s)
        {
            return Err(ConfigError::UnsupportedCodePage { name, description });
        }
        Err(ConfigError::UnknownCodePage(s.to_string()))
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Validated, immutable session configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model: Model,
    pub trace_file: Option<PathBuf>,
    pub lu_name: Option<String>,
    pub enable_tls: bool,
    pub verify_cert: bool,
    pub code_page: CodePage,
    pub screens_dir: Option<PathBuf>,
}

impl Config {
    /// Start building a configuration from defaults.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load a configuration file with no overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::builder().file(path)?.build()
    }

    /// Screen geometry of the configured model.
    #[must_use]
    pub const fn geometry(&self) -> Geometry {
        self.model.geometry()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 23,
            model: Model::default(),
            trace_file: None,
            lu_name: None,
            enable_tls: false,
            verify_cert: true,
            code_page: CodePage::default(),
            screens_dir: None,
        }
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Host Name      : {}", self.host)?;
        writeln!(f, "Host Port      : {}", self.port)?;
        writeln!(f, "Terminal Model : {}", self.model)?;
        writeln!(f, "Code Page      : {} {}", self.code_page, self.code_page.description())?;
        writeln!(f, "TLS            : {}", yes_no(self.enable_tls))?;
        writeln!(f, "Verify Cert    : {}", yes_no(self.verify_cert))?;
        if let Some(lu) = &self.lu_name {
            writeln!(f, "LU Name        : {lu}")?;
        }
        if let Some(trace) = &self.trace_file {
            writeln!(f, "Trace File     : {}", trace.display())?;
        }
        if let Some(dir) = &self.screens_dir {
            writeln!(f, "Screens Dir    : {}", dir.display())?;
        }
        Ok(())
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Raw, unvalidated option values. `None` means "not given at this layer".
#[derive(Debug, Clone, Default)]
struct RawOptions {
    host: Option<String>,
    port: Option<String>,
    model: Option<String>,
    trace_file: Option<String>,
    lu_name: Option<String>,
    enable_tls: Option<String>,
    verify_cert: Option<String>,
    code_page: Option<String>,
    screens_dir: Option<String>,
}

impl RawOptions {
    /// Parse `key = value` text. Comments, blank lines, lines without `=`
    /// and unknown keys are skipped.
    fn parse(text: &str) -> Self {
        let mut options = Self::default();
        for line in text.lines() {
            let line = line.replace(['\t', '\r'], "");
            if line.trim_start().starts_with('#') {
                continue;
            }
            let Some(caps) = ENTRY.captures(&line) else {
                continue;
            };
            let value = caps[2].trim().to_string();
            let slot = match &caps[1] {
                "hostname" => &mut options.host,
                "port" => &mut options.port,
                "model" => &mut options.model,
                "traceFile" => &mut options.trace_file,
                "LUName" => &mut options.lu_name,
                "enableTLS" => &mut options.enable_tls,
                "verifyCert" => &mut options.verify_cert,
                "codePage" => &mut options.code_page,
                "screensDir" => &mut options.screens_dir,
                key => {
                    debug!(key, "ignoring unknown configuration key");
                    continue;
                }
            };
            *slot = Some(value);
        }
        options
    }

    /// Overlay `other` on top of `self`.
    fn merge(self, other: Self) -> Self {
        Self {
            host: other.host.or(self.host),
            port: other.port.or(self.port),
            model: other.model.or(self.model),
            trace_file: other.trace_file.or(self.trace_file),
            lu_name: other.lu_name.or(self.lu_name),
            enable_tls: other.enable_tls.or(self.enable_tls),
            verify_cert: other.verify_cert.or(self.verify_cert),
            code_page: other.code_page.or(self.code_page),
            screens_dir: other.screens_dir.or(self.screens_dir),
        }
    }
}

/// Builder merging a configuration file with explicit overrides.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    file: RawOptions,
    overrides: RawOptions,
}

impl ConfigBuilder {
    /// Read options from a configuration file.
    pub fn file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration file");
        self.file = self.file.merge(RawOptions::parse(&text));
        Ok(self)
    }

    /// Read options from configuration text.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.file = self.file.merge(RawOptions::parse(text));
        self
    }

    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.overrides.host = Some(host.into());
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.overrides.port = Some(port.to_string());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.overrides.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn trace_file(mut self, path: impl AsRef<Path>) -> Self {
        self.overrides.trace_file = Some(path.as_ref().display().to_string());
        self
    }

    #[must_use]
    pub fn lu_name(mut self, lu: impl Into<String>) -> Self {
        self.overrides.lu_name = Some(lu.into());
        self
    }

    #[must_use]
    pub fn enable_tls(mut self, enable: bool) -> Self {
        self.overrides.enable_tls = Some(yes_no(enable).to_string());
        self
    }

    #[must_use]
    pub fn verify_cert(mut self, verify: bool) -> Self {
        self.overrides.verify_cert = Some(yes_no(verify).to_string());
        self
    }

    #[must_use]
    pub fn code_page(mut self, code_page: impl Into<String>) -> Self {
        self.overrides.code_page = Some(code_page.into());
        self
    }

    #[must_use]
    pub fn screens_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.overrides.screens_dir = Some(dir.as_ref().display().to_string());
        self
    }

    /// Validate the merged options. Every invalid attribute is reported.
    pub fn build(self) -> Result<Config, ConfigError> {
        let raw = self.file.merge(self.overrides);
        let defaults = Config::default();
        let mut errors = Vec::new();

        let model = raw
            .model
            .as_deref()
            .map_or(Ok(defaults.model), str::parse)
            .unwrap_or_else(|e| {
                errors.push(e);
                defaults.model
            });

        let port = raw.port.as_deref().map_or(Some(defaults.port), |p| {
            p.parse::<u16>().ok().filter(|&p| p >= 1)
        });
        let port = port.unwrap_or_else(|| {
            errors.push(ConfigError::InvalidPort(raw.port.clone().unwrap_or_default()));
            defaults.port
        });

        let code_page = raw
            .code_page
            .as_deref()
            .map_or(Ok(defaults.code_page), str::parse)
            .unwrap_or_else(|e| {
                errors.push(e);
                defaults.code_page
            });

        let enable_tls = parse_flag("enableTLS", raw.enable_tls.as_deref(), defaults.enable_tls)
            .unwrap_or_else(|e| {
                errors.push(e);
                defaults.enable_tls
            });
        let verify_cert =
            parse_flag("verifyCert", raw.verify_cert.as_deref(), defaults.verify_cert)
                .unwrap_or_else(|e| {
                    errors.push(e);
                    defaults.verify_cert
                });

        let screens_dir = non_empty(raw.screens_dir).map(PathBuf::from);
        if let Some(dir) = &screens_dir
            && !dir.is_dir()
        {
            errors.push(ConfigError::MissingScreensDir(dir.clone()));
        }

        match errors.len() {
            0 => Ok(Config {
                host: non_empty(raw.host).unwrap_or(defaults.host),
                port,
                model,
                trace_file: non_empty(raw.trace_file).map(PathBuf::from),
                lu_name: non_empty(raw.lu_name),
                enable_tls,
                verify_cert,
                code_page,
                screens_dir,
            }),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::Multiple(errors)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_flag(key: &'static str, value: Option<&str>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        _ => Err(ConfigError::InvalidFlag {
            key,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 23);
        assert_eq!(config.model.to_string(), "3279-2");
        assert!(!config.enable_tls);
        assert!(config.verify_cert);
        assert_eq!(config.code_page.name(), "cp037");
        assert_eq!(config.code_page.charset(), Charset::Latin1);
        assert!(config.lu_name.is_none());
        assert!(config.trace_file.is_none());
        assert!(config.screens_dir.is_none());
    }

    #[test]
    fn test_model_geometry() {
        let geometry = |m: &str| m.parse::<Model>().unwrap().geometry();
        assert_eq!(geometry("3279-2"), Geometry { rows: 24, cols: 80 });
        assert_eq!(geometry("3278-3"), Geometry { rows: 32, cols: 80 });
        assert_eq!(geometry("3279-4"), Geometry { rows: 43, cols: 80 });
        assert_eq!(geometry("3279-5"), Geometry { rows: 27, cols: 132 });
        assert!("3278-2".parse::<Model>().is_ok_and(|m| !m.is_color()));
        assert_eq!("3278-4".parse::<Model>().unwrap().number(), 4);
    }

    #[test]
    fn test_invalid_models() {
        for bad in ["3279-1", "3279-6", "3270-2", "3279", "32792", " 3279-2", ""] {
            assert!(
                matches!(bad.parse::<Model>(), Err(ConfigError::InvalidModel(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_file_text() {
        let config = Config::builder()
            .text(
                "# sample\n\
                 \n\
                 hostname = mainframe.example.com\n\
                 \tport=992\n\
                 model = 3279-5\r\n\
                 LUName = LU01QSWJ\n\
                 enableTLS = YES\n\
                 verifyCert = no\n\
                 codePage = cp1147\n\
                 traceFile =\n\
                 colour = green\n\
                 this line has no separator\n",
            )
            .build()
            .unwrap();
        assert_eq!(config.host, "mainframe.example.com");
        assert_eq!(config.port, 992);
        assert_eq!(config.geometry(), Geometry { rows: 27, cols: 132 });
        assert_eq!(config.lu_name.as_deref(), Some("LU01QSWJ"));
        assert!(config.enable_tls);
        assert!(!config.verify_cert);
        assert_eq!(config.code_page.charset(), Charset::Latin9);
        assert!(config.trace_file.is_none());
    }

    #[test]
    fn test_commented_key_is_ignored() {
        let config = Config::builder().text("#hostname = nope\n").build().unwrap();
        assert_eq!(config.host, "localhost");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let config = Config::builder()
            .text("hostname = from-file\nport = 2323\nmodel = 3278-3\n")
            .host("from-override")
            .model("3279-4")
            .build()
            .unwrap();
        assert_eq!(config.host, "from-override");
        assert_eq!(config.port, 2323);
        assert_eq!(config.model.to_string(), "3279-4");
    }

    #[test]
    fn test_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p3270.cfg");
        std::fs::write(
            &path,
            format!("hostname = h\nscreensDir = {}\n", dir.path().display()),
        )
        .unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.host, "h");
        assert_eq!(config.screens_dir.as_deref(), Some(dir.path()));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::from_file("/nonexistent/p3270.cfg").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/p3270.cfg"));
    }

    #[test]
    fn test_single_invalid_attribute() {
        let err = Config::builder().model("3279-9").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidModel(ref m) if m == "3279-9"));

        let err = Config::builder().text("port = 0\n").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));

        let err = Config::builder().text("port = 70000\n").build().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort(_)));
    }

    #[test]
    fn test_every_invalid_attribute_is_reported() {
        let err = Config::builder()
            .text(
                "model = 3279-X\nport = abc\ncodePage = cp999\n\
                 enableTLS = maybe\nverifyCert = sure\nscreensDir = /nonexistent/screens\n",
            )
            .build()
            .unwrap_err();
        let ConfigError::Multiple(errors) = err else {
            panic!("expected multiple errors, got {err:?}");
        };
        assert_eq!(errors.len(), 6);
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidModel(_))));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidPort(_))));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::UnknownCodePage(_))));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidFlag { key: "enableTLS", .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::InvalidFlag { key: "verifyCert", .. })));
        assert!(errors.iter().any(|e| matches!(e, ConfigError::MissingScreensDir(_))));
    }

    #[test]
    fn test_code_pages() {
        assert_eq!("cp870".parse::<CodePage>().unwrap().charset(), Charset::Latin2);
        assert_eq!("cp1026".parse::<CodePage>().unwrap().charset(), Charset::Latin5);
        assert_eq!("bracket".parse::<CodePage>().unwrap().charset(), Charset::Latin1);
        assert!(matches!(
            "cp937".parse::<CodePage>(),
            Err(ConfigError::UnsupportedCodePage { name: "cp937", .. })
        ));
        assert!(matches!(
            "latin1".parse::<CodePage>(),
            Err(ConfigError::UnknownCodePage(_))
        ));
    }

    #[test]
    fn test_display_and_json() {
        let config = Config::builder().lu_name("LU01").build().unwrap();
        let text = config.to_string();
        assert!(text.contains("Host Name      : localhost"));
        assert!(text.contains("Terminal Model : 3279-2"));
        assert!(text.contains("LU Name        : LU01"));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["model"], "3279-2");
        assert_eq!(json["port"], 23);
        assert_eq!(json["code_page"]["name"], "cp037");
        assert_eq!(json["code_page"]["charset"], "latin1");
    }
}
