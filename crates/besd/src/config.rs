//! Daemon configuration.
//!
//! The file format is TOML; tables flatten into dotted keys so that
//!
//! ```toml
//! [BES]
//! ServerUnixSocket = "/run/bes.sock"
//! modules = ["usage", "raw"]
//! ```
//!
//! yields `BES.ServerUnixSocket` and `BES.modules = "usage,raw"`. The rest of
//! the daemon only sees the flat key/value store ([`Config`]) or the typed
//! view built from it ([`ServerSettings`]).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bes_protocol::MAX_CHUNK_SIZE;
use thiserror::Error;
use toml::{Table, Value};

use crate::registry::ServiceError;

/// Keys read by the daemon.
pub mod keys {
    pub const SERVER_UNIX_SOCKET: &str = "BES.ServerUnixSocket";
    pub const SERVER_PORT: &str = "BES.ServerPort";
    pub const SERVER_HOST: &str = "BES.ServerHost";
    pub const SEND_BUFFER_SIZE: &str = "BES.SendBufferSize";
    pub const RECEIVE_BUFFER_SIZE: &str = "BES.ReceiveBufferSize";
    pub const MAX_REQUEST_SIZE: &str = "BES.MaxRequestSize";
    pub const ANNOTATION_SERVICE_URL: &str = "BES.AnnotationServiceURL";
    pub const MODULES: &str = "BES.modules";
    pub const AUTHENTICATE: &str = "BES.Authenticate";
    pub const DEFAULT_TRANSMITTER: &str = "BES.DefaultTransmitter";
    pub const ROOT_DIRECTORY: &str = "BES.Catalog.RootDirectory";
}

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "BES_CONFIG";

/// Environment variable overriding the Unix socket path.
pub const SOCKET_ENV: &str = "BES_SOCKET";

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/bes.sock";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_TRANSMITTER: &str = "basic";

/// Largest request message a client may send, in bytes.
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;

/// Modules loaded when `BES.modules` is not set.
pub const DEFAULT_MODULES: &[&str] = &["usage", "raw"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {value:?} (expected {expected})")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Service registration failed: {0}")]
    Service(#[from] ServiceError),
}

/// Flat key/value configuration store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and flattens a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let table: Table = contents
            .parse()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;

        let mut config = Self::new();
        flatten("", &table, &mut config.values);
        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Parses a value with `FromStr`.
    pub fn get_parsed<T: FromStr>(
        &self,
        key: &str,
        expected: &'static str,
    ) -> Result<Option<T>, ConfigError> {
        self.get(key)
            .map(|raw| {
                raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw.to_string(),
                    expected,
                })
            })
            .transpose()
    }

    /// Accepts `yes/no`, `true/false`, `on/off` and `1/0`, any case.
    pub fn get_bool(&self, key: &str) -> Result<Option<bool>, ConfigError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "yes" | "true" | "on" | "1" => Ok(Some(true)),
            "no" | "false" | "off" | "0" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.to_string(),
                expected: "yes or no",
            }),
        }
    }

    /// Splits a comma-separated value, dropping empty items.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        self.get(key).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
    }

    /// Applies `BES_SOCKET` from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from an arbitrary variable source.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(socket) = lookup(SOCKET_ENV).filter(|s| !s.is_empty()) {
            self.set(keys::SERVER_UNIX_SOCKET, socket);
        }
    }
}

fn flatten(prefix: &str, table: &Table, out: &mut BTreeMap<String, String>) {
    for (name, value) in table {
        let key = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };

        match value {
            Value::Table(inner) => flatten(&key, inner, out),
            other => {
                out.insert(key, scalar_text(other));
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Boolean(b) => b.to_string(),
        Value::Datetime(d) => d.to_string(),
        Value::Array(items) => items.iter().map(scalar_text).collect::<Vec<_>>().join(","),
        Value::Table(t) => t.to_string(),
    }
}

/// Typed view of the keys the daemon reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub unix_socket: PathBuf,
    /// Host and port for the TCP listener; `None` disables it
    pub tcp: Option<(String, u16)>,
    pub send_buffer_size: Option<usize>,
    pub receive_buffer_size: Option<usize>,
    /// Requests longer than this are discarded and answered with an error
    pub max_request_size: usize,
    pub annotation_url: Option<String>,
    pub modules: Vec<String>,
    pub authenticate: bool,
    pub default_transmitter: String,
    /// Base directory for container paths
    pub root_directory: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            unix_socket: PathBuf::from(DEFAULT_SOCKET_PATH),
            tcp: None,
            send_buffer_size: None,
            receive_buffer_size: None,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            annotation_url: None,
            modules: DEFAULT_MODULES.iter().map(|m| m.to_string()).collect(),
            authenticate: false,
            default_transmitter: DEFAULT_TRANSMITTER.to_string(),
            root_directory: None,
        }
    }
}

impl ServerSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tcp = config
            .get_parsed::<u16>(keys::SERVER_PORT, "a port number")?
            .map(|port| {
                let host = config.get(keys::SERVER_HOST).unwrap_or(DEFAULT_HOST);
                (host.to_string(), port)
            });

        Ok(Self {
            unix_socket: config
                .get(keys::SERVER_UNIX_SOCKET)
                .map(PathBuf::from)
                .unwrap_or(defaults.unix_socket),
            tcp,
            send_buffer_size: config.get_parsed(keys::SEND_BUFFER_SIZE, "a byte count")?,
            receive_buffer_size: config.get_parsed(keys::RECEIVE_BUFFER_SIZE, "a byte count")?,
            max_request_size: config
                .get_parsed(keys::MAX_REQUEST_SIZE, "a byte count")?
                .unwrap_or(defaults.max_request_size),
            annotation_url: config
                .get(keys::ANNOTATION_SERVICE_URL)
                .filter(|url| !url.is_empty())
                .map(str::to_string),
            modules: config.get_list(keys::MODULES).unwrap_or(defaults.modules),
            authenticate: config.get_bool(keys::AUTHENTICATE)?.unwrap_or(false),
            default_transmitter: config
                .get(keys::DEFAULT_TRANSMITTER)
                .map(str::to_string)
                .unwrap_or(defaults.default_transmitter),
            root_directory: config.get(keys::ROOT_DIRECTORY).map(PathBuf::from),
        })
    }

    /// Size of the per-connection receive buffer.
    pub fn receive_buffer(&self) -> usize {
        self.receive_buffer_size.unwrap_or(MAX_CHUNK_SIZE)
    }
}
