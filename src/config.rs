//! Configuration file parser for feedrelay.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`:
//! the Spring blog feed polled every 500ms, fanned out to two append files
//! and one mailbox.
//! Unknown top-level keys are accepted but logged as potential typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable that overrides any config-file SMTP password.
pub const SMTP_PASSWORD_ENV: &str = "FEEDRELAY_SMTP_PASSWORD";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds the maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Structurally valid TOML that describes a broken pipeline.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All sections use `#[serde(default)]` so any subset of keys can be
/// specified. Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedConfig,
    pub pipeline: PipelineConfig,
    /// Category name → sink name. Entries whose category is not a key here
    /// are dropped with a warning.
    pub routes: BTreeMap<String, String>,
    /// Sink name → sink definition. Each sink gets its own bounded channel
    /// and consumer task.
    pub sinks: BTreeMap<String, SinkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Feed URL, polled on a fixed period. Must be http(s).
    pub url: String,
    /// Poll period in milliseconds.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounded capacity of each per-category channel. When a channel is
    /// full the poller blocks until its consumer catches up.
    pub channel_capacity: usize,
}

/// One sink definition, tagged by `type` in the TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// Append formatted entry lines to a file.
    File { path: PathBuf },
    /// Batch formatted entry lines into an email and send via SMTP.
    Email(EmailSinkConfig),
}

/// SMTP sink settings.
///
/// The password can live in the config file, but `FEEDRELAY_SMTP_PASSWORD`
/// always wins when set; `secrecy` keeps it out of Debug output either way.
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSinkConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Use an implicit-TLS relay connection. Off by default to match the
    /// plain port-25 relays this service historically talked to.
    #[serde(default)]
    pub smtp_tls: bool,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
    pub from: String,
    pub to: String,
    pub subject: String,
}

fn default_smtp_port() -> u16 {
    25
}

impl Default for Config {
    fn default() -> Self {
        let mut routes = BTreeMap::new();
        routes.insert("releases".to_string(), "releases".to_string());
        routes.insert("engineering".to_string(), "engineering".to_string());
        routes.insert("news".to_string(), "news".to_string());

        let mut sinks = BTreeMap::new();
        sinks.insert(
            "releases".to_string(),
            SinkConfig::File {
                path: PathBuf::from("releases.txt"),
            },
        );
        sinks.insert(
            "engineering".to_string(),
            SinkConfig::File {
                path: PathBuf::from("engineering.txt"),
            },
        );
        sinks.insert(
            "news".to_string(),
            SinkConfig::Email(EmailSinkConfig {
                smtp_host: "localhost".to_string(),
                smtp_port: 25,
                smtp_tls: false,
                username: None,
                password: None,
                from: "feedrelay@localhost".to_string(),
                to: "feedrelay@localhost".to_string(),
                subject: "News from the feed".to_string(),
            }),
        );

        Self {
            feed: FeedConfig::default(),
            pipeline: PipelineConfig::default(),
            routes,
            sinks,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: "https://spring.io/blog.atom".to_string(),
            poll_interval_ms: 500,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 10,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown top-level keys → accepted, logged as warning
    ///
    /// After parsing, `FEEDRELAY_SMTP_PASSWORD` (when set) replaces the
    /// password of every email sink, and the result is validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a corrupted or hostile file
        // cannot balloon memory.
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Self::default().with_env_password().validated();
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {} // Size is within limits, proceed
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Self::default().with_env_password().validated();
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Self::default().with_env_password().validated();
        }

        // Parse as a raw table first to warn on unknown top-level keys
        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["feed", "pipeline", "routes", "sinks"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(
            path = %path.display(),
            feed = %config.feed.url,
            routes = config.routes.len(),
            sinks = config.sinks.len(),
            "Loaded configuration"
        );
        config.with_env_password().validated()
    }

    fn with_env_password(mut self) -> Self {
        if let Ok(password) = std::env::var(SMTP_PASSWORD_ENV) {
            for sink in self.sinks.values_mut() {
                if let SinkConfig::Email(email) = sink {
                    email.password = Some(SecretString::from(password.clone()));
                }
            }
        }
        self
    }

    fn validated(self) -> Result<Self, ConfigError> {
        match url::Url::parse(&self.feed.url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => {}
            Ok(parsed) => {
                return Err(ConfigError::Invalid(format!(
                    "Feed URL must be http or https, got scheme '{}'",
                    parsed.scheme()
                )));
            }
            Err(e) => {
                return Err(ConfigError::Invalid(format!(
                    "Feed URL '{}' is not a valid URL: {}",
                    self.feed.url, e
                )));
            }
        }

        if self.feed.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }

        if self.pipeline.channel_capacity == 0 {
            return Err(ConfigError::Invalid(
                "channel_capacity must be greater than zero".to_string(),
            ));
        }

        if self.routes.is_empty() {
            return Err(ConfigError::Invalid(
                "At least one route must be configured".to_string(),
            ));
        }

        for (category, sink_name) in &self.routes {
            if !self.sinks.contains_key(sink_name) {
                return Err(ConfigError::Invalid(format!(
                    "Route '{}' points at undefined sink '{}'",
                    category, sink_name
                )));
            }
        }

        for (name, sink) in &self.sinks {
            if let SinkConfig::Email(email) = sink {
                if email.smtp_host.trim().is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "Email sink '{}' has an empty smtp_host",
                        name
                    )));
                }
            }
        }

        Ok(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
