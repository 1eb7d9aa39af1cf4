//! Configuration management for safe-mail
//!
//! Configuration is loaded from multiple sources with clear precedence:
//!
//! 1. `PORT` environment variable (highest priority, maps to `server.port`)
//! 2. Environment variables with the `SAFE_MAIL_` prefix (`__` for nesting)
//! 3. A TOML file (`./config.toml` or an explicit path)
//! 4. Hardcoded defaults (fallback)
//!
//! # Example Configuration
//!
//! ```toml
//! # config.toml
//! [server]
//! port = 3000
//! public_dir = "./public"
//!
//! [quota]
//! hourly_limit = 28
//! window_secs = 3600
//!
//! [dispatch]
//! batch_size = 3
//! batch_delay_ms = 120
//!
//! [smtp]
//! host = "smtp.gmail.com"
//! port = 465
//! security = "implicit"
//!
//! [[content.soften]]
//! word = "invoice"
//! replacement = "the invoice details are attached below"
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use safe_mail::config::SafeMailConfig;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = SafeMailConfig::load()?;
//! let limit = config.quota.hourly_limit;
//! # Ok(())
//! # }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address
    pub host: String,

    /// Listen port
    pub port: u16,

    /// Directory served for static assets
    pub public_dir: PathBuf,

    /// File inside `public_dir` served at `/`
    pub index_file: String,

    /// Maximum accepted request body size
    pub body_limit_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: PathBuf::from("public"),
            index_file: "login.html".to_string(),
            body_limit_bytes: 100 * 1024,
        }
    }
}

/// Per-identity send quota settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSettings {
    /// Maximum messages per identity per window, no burst allowance
    pub hourly_limit: u32,

    /// Length of the fixed reset window in seconds
    pub window_secs: u64,
}

impl Default for QuotaSettings {
    fn default() -> Self {
        Self {
            hourly_limit: 28,
            window_secs: 60 * 60,
        }
    }
}

impl QuotaSettings {
    /// Reset window as a `Duration`
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Batched delivery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    /// Messages submitted concurrently per batch
    pub batch_size: usize,

    /// Pause between batches in milliseconds
    pub batch_delay_ms: u64,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            batch_size: 3,
            batch_delay_ms: 120,
        }
    }
}

impl DispatchSettings {
    /// Inter-batch pause as a `Duration`
    #[must_use]
    pub const fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Transport security for the SMTP relay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// TLS from the first byte (usually port 465)
    Implicit,
    /// Plain connection upgraded with STARTTLS (usually port 587)
    StartTls,
    /// No encryption, local relays and tests only
    None,
}

/// SMTP relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpSettings {
    /// Relay hostname
    pub host: String,

    /// Relay port
    pub port: u16,

    /// Transport security mode
    pub security: SmtpSecurity,

    /// Per-command timeout; a timed out submission counts as failed
    pub timeout_secs: u64,

    /// Seconds an idle pooled connection is kept open
    pub pool_idle_timeout_secs: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 465,
            security: SmtpSecurity::Implicit,
            timeout_secs: 30,
            pool_idle_timeout_secs: 60,
        }
    }
}

/// One configured soften rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftenRuleConfig {
    /// Trigger word matched as a whole line
    pub word: String,

    /// Sentence replacing the line
    pub replacement: String,
}

impl SoftenRuleConfig {
    fn new(word: &str, replacement: &str) -> Self {
        Self {
            word: word.to_string(),
            replacement: replacement.to_string(),
        }
    }
}

/// Content rewriting settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentSettings {
    /// Line appended to every body after a blank line
    pub trailer: String,

    /// Ordered soften rules
    pub soften: Vec<SoftenRuleConfig>,
}

impl Default for ContentSettings {
    fn default() -> Self {
        Self {
            trailer: "Scanned & secured".to_string(),
            soften: vec![
                SoftenRuleConfig::new("report", "the report details are shared below"),
                SoftenRuleConfig::new("price", "the pricing details are included below"),
            ],
        }
    }
}

/// Complete safe-mail configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SafeMailConfig {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerSettings,

    /// Quota settings
    #[serde(default)]
    pub quota: QuotaSettings,

    /// Dispatch settings
    #[serde(default)]
    pub dispatch: DispatchSettings,

    /// SMTP relay settings
    #[serde(default)]
    pub smtp: SmtpSettings,

    /// Content rewriting settings
    #[serde(default)]
    pub content: ContentSettings,
}

impl SafeMailConfig {
    /// Load configuration using `./config.toml` if it exists
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the merged values are
    /// out of range
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from("./config.toml");
        if local_config.exists() {
            Self::load_from(&local_config)
        } else {
            Self::extract(Self::base_figment())
        }
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the merged values are
    /// out of range
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::extract(Self::base_figment().merge(Toml::file(path.as_ref())))
    }

    fn base_figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
    }

    fn extract(figment: Figment) -> anyhow::Result<Self> {
        let config: Self = figment
            .merge(Env::prefixed("SAFE_MAIL_").split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "server.port".into()))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that serde cannot express
    ///
    /// # Errors
    ///
    /// Returns an error naming the first offending setting
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.dispatch.batch_size >= 1, "dispatch.batch_size must be at least 1");
        anyhow::ensure!(self.quota.hourly_limit >= 1, "quota.hourly_limit must be at least 1");
        anyhow::ensure!(self.quota.window_secs >= 1, "quota.window_secs must be at least 1");
        Ok(())
    }
}
