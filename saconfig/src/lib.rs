//! # Sonos Alerts Configuration Module
//!
//! This module loads the INI configuration shared by the alert services:
//! - One section per service variant (`[sonos-alerts]`, `[vo-sonos-alerts]`)
//! - Case-insensitive keys, as written by hand in most deployments
//! - Environment variable overrides (`SONOSALERTS__<KEY>`)
//! - Typed values with defaults for the optional timing keys
//!
//! ## Usage
//!
//! ```no_run
//! use saconfig::{Config, Variant};
//!
//! let config = Config::load("alerts.ini", Variant::Incident)?;
//! println!("listening on {}", config.listen_port);
//! # Ok::<(), saconfig::ConfigError>(())
//! ```

use ini::Ini;
use std::{env, fmt, path::Path, time::Duration};
use thiserror::Error;
use tracing::{debug, info};

const ENV_PREFIX: &str = "SONOSALERTS__";

// Keys of the configuration file
const KEY_SONOS_PLAYER: &str = "sonosPlayer";
const KEY_ALERT_SOUND_URL: &str = "alertSoundURL";
const KEY_WEBHOOK_URL_ROOT: &str = "alertWebhookURLRoot";
const KEY_WEBHOOK_AUTH_KEY: &str = "alertWebhookAuthKey";
const KEY_LISTEN_PORT: &str = "listenPort";
const KEY_ALERT_PADDING: &str = "alertPaddingSeconds";
const KEY_FALLBACK_WAIT: &str = "fallbackWaitSeconds";
const KEY_MAX_WAIT: &str = "maxWaitSeconds";
const KEY_DISCOVERY_TIMEOUT: &str = "discoveryTimeoutSeconds";
const KEY_LOG_LEVEL: &str = "logLevel";

// Default values for configuration
const DEFAULT_FALLBACK_WAIT_SECS: u64 = 10;
const DEFAULT_MAX_WAIT_SECS: u64 = 300;
const DEFAULT_DISCOVERY_TIMEOUT_SECS: u64 = 5;
const DEFAULT_LOG_LEVEL: &str = "INFO";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file {path}: {message}")]
    Unreadable { path: String, message: String },
    #[error("Missing section [{0}] in configuration")]
    MissingSection(String),
    #[error("Missing key '{key}' in section [{section}]")]
    MissingKey { section: String, key: String },
    #[error("Invalid value '{value}' for key '{key}': {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// The two services sharing this configuration format.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    /// Home-automation doorbell trigger, no webhook authentication.
    Doorbell,
    /// Incident-management webhook, signed requests only.
    Incident,
}

impl Variant {
    /// INI section holding the keys for this variant.
    pub fn section(&self) -> &'static str {
        match self {
            Variant::Doorbell => "sonos-alerts",
            Variant::Incident => "vo-sonos-alerts",
        }
    }

    fn requires_webhook_auth(&self) -> bool {
        matches!(self, Variant::Incident)
    }

    fn default_padding_secs(&self) -> u64 {
        match self {
            Variant::Doorbell => 0,
            Variant::Incident => 2,
        }
    }
}

/// Shared secret and base URL used to sign incoming webhooks.
#[derive(Clone)]
pub struct WebhookConfig {
    pub url_root: String,
    pub auth_key: String,
}

impl fmt::Debug for WebhookConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookConfig")
            .field("url_root", &self.url_root)
            .field("auth_key", &"<redacted>")
            .finish()
    }
}

/// Process-wide configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub variant: Variant,
    /// Room name, IP address or `ip:port` of the speaker.
    pub speaker: String,
    pub alert_sound_url: String,
    /// Present for the incident variant, optional for the doorbell one.
    pub webhook: Option<WebhookConfig>,
    pub listen_port: u16,
    /// Extra wait added to the reported alert duration.
    pub alert_padding: Duration,
    /// Wait used when the alert duration cannot be read.
    pub fallback_wait: Duration,
    /// Upper bound on the wait, whatever the speaker reports.
    pub max_wait: Duration,
    pub discovery_timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Loads the section of `variant` from the INI file at `path`.
    ///
    /// Values from `SONOSALERTS__<KEY>` environment variables replace the
    /// file values.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read, the section or a
    /// required key is missing, or a numeric value does not parse.
    pub fn load(path: impl AsRef<Path>, variant: Variant) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), section = variant.section(), "Loading configuration");

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        Self::from_ini(&ini, variant, |name| env::var(name).ok())
    }

    /// Parses configuration text without consulting the environment.
    pub fn from_ini_str(text: &str, variant: Variant) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Unreadable {
            path: "<string>".to_string(),
            message: e.to_string(),
        })?;

        Self::from_ini(&ini, variant, |_| None)
    }

    fn from_ini<F>(ini: &Ini, variant: Variant, env_lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let section = Section::find(ini, variant.section(), env_lookup)?;

        let speaker = section.required(KEY_SONOS_PLAYER)?;
        let alert_sound_url = section.required(KEY_ALERT_SOUND_URL)?;
        let listen_port = section.parse_required::<u16>(KEY_LISTEN_PORT)?;

        let webhook = if variant.requires_webhook_auth() {
            Some(WebhookConfig {
                url_root: section.required(KEY_WEBHOOK_URL_ROOT)?,
                auth_key: section.required(KEY_WEBHOOK_AUTH_KEY)?,
            })
        } else {
            match (
                section.optional(KEY_WEBHOOK_URL_ROOT),
                section.optional(KEY_WEBHOOK_AUTH_KEY),
            ) {
                (Some(url_root), Some(auth_key)) => Some(WebhookConfig { url_root, auth_key }),
                _ => None,
            }
        };

        let config = Config {
            variant,
            speaker,
            alert_sound_url,
            webhook,
            listen_port,
            alert_padding: section.seconds(KEY_ALERT_PADDING, variant.default_padding_secs())?,
            fallback_wait: section.seconds(KEY_FALLBACK_WAIT, DEFAULT_FALLBACK_WAIT_SECS)?,
            max_wait: section.seconds(KEY_MAX_WAIT, DEFAULT_MAX_WAIT_SECS)?,
            discovery_timeout: section
                .seconds(KEY_DISCOVERY_TIMEOUT, DEFAULT_DISCOVERY_TIMEOUT_SECS)?,
            log_level: section
                .optional(KEY_LOG_LEVEL)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        };

        debug!(?config, "Configuration loaded");
        Ok(config)
    }
}

/// One INI section plus the environment overrides applying to it.
struct Section<'a, F> {
    name: &'a str,
    properties: &'a ini::Properties,
    env_lookup: F,
}

impl<'a, F> Section<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn find(ini: &'a Ini, name: &'a str, env_lookup: F) -> Result<Self, ConfigError> {
        let properties = ini
            .iter()
            .find_map(|(section, props)| match section {
                Some(s) if s.eq_ignore_ascii_case(name) => Some(props),
                _ => None,
            })
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;

        Ok(Self {
            name,
            properties,
            env_lookup,
        })
    }

    fn optional(&self, key: &str) -> Option<String> {
        let env_name = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
        if let Some(value) = (self.env_lookup)(&env_name) {
            debug!(env_var = %env_name, "Configuration value overridden from environment");
            return Some(value);
        }

        self.properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key).ok_or_else(|| ConfigError::MissingKey {
            section: self.name.to_string(),
            key: key.to_string(),
        })
    }

    fn parse_required<T>(&self, key: &str) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        let raw = self.required(key)?;
        parse_value(key, &raw)
    }

    fn seconds(&self, key: &str, default: u64) -> Result<Duration, ConfigError> {
        let secs = match self.optional(key) {
            Some(raw) => parse_value::<u64>(key, &raw)?,
            None => default,
        };
        Ok(Duration::from_secs(secs))
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const INCIDENT: &str = "\
[vo-sonos-alerts]
sonosPlayer = Office
alertSoundURL = http://nas.local/alert.mp3
alertWebhookURLRoot = http://alerts.example.com/alert
alertWebhookAuthKey = s3cr3t
listenPort = 8080
";

    #[test]
    fn incident_section_is_loaded_with_defaults() {
        let config = Config::from_ini_str(INCIDENT, Variant::Incident).unwrap();

        assert_eq!(config.speaker, "Office");
        assert_eq!(config.alert_sound_url, "http://nas.local/alert.mp3");
        assert_eq!(config.listen_port, 8080);
        let webhook = config.webhook.unwrap();
        assert_eq!(webhook.url_root, "http://alerts.example.com/alert");
        assert_eq!(webhook.auth_key, "s3cr3t");
        assert_eq!(config.alert_padding, Duration::from_secs(2));
        assert_eq!(config.fallback_wait, Duration::from_secs(10));
        assert_eq!(config.max_wait, Duration::from_secs(300));
        assert_eq!(config.log_level, "INFO");
    }

    #[test]
    fn keys_are_case_insensitive() {
        let text = "[sonos-alerts]\n\
                    SONOSPLAYER = 10.0.0.5\n\
                    alertsoundurl = http://x/a.mp3\n\
                    ListenPort = 5000\n";
        let config = Config::from_ini_str(text, Variant::Doorbell).unwrap();

        assert_eq!(config.speaker, "10.0.0.5");
        assert_eq!(config.listen_port, 5000);
        assert!(config.webhook.is_none());
        assert_eq!(config.alert_padding, Duration::ZERO);
    }

    #[test]
    fn incident_variant_requires_auth_key() {
        let text = INCIDENT.replace("alertWebhookAuthKey = s3cr3t\n", "");
        let err = Config::from_ini_str(&text, Variant::Incident).unwrap_err();

        assert!(matches!(
            err,
            ConfigError::MissingKey { ref key, .. } if key == KEY_WEBHOOK_AUTH_KEY
        ));
    }

    #[test]
    fn missing_section_is_reported() {
        let err = Config::from_ini_str(INCIDENT, Variant::Doorbell).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSection(ref s) if s == "sonos-alerts"));
    }

    #[test]
    fn bad_port_is_rejected() {
        let text = INCIDENT.replace("listenPort = 8080", "listenPort = eighty");
        let err = Config::from_ini_str(&text, Variant::Incident).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let ini = Ini::load_from_str(INCIDENT).unwrap();
        let config = Config::from_ini(&ini, Variant::Incident, |name| match name {
            "SONOSALERTS__LISTENPORT" => Some("9090".to_string()),
            "SONOSALERTS__MAXWAITSECONDS" => Some("30".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.listen_port, 9090);
        assert_eq!(config.max_wait, Duration::from_secs(30));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(INCIDENT.as_bytes()).unwrap();

        let config = Config::load(file.path(), Variant::Incident).unwrap();
        assert_eq!(config.speaker, "Office");
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = Config::load("/nonexistent/alerts.ini", Variant::Doorbell).unwrap_err();
        assert!(matches!(err, ConfigError::Unreadable { .. }));
    }

    #[test]
    fn debug_output_hides_auth_key() {
        let config = Config::from_ini_str(INCIDENT, Variant::Incident).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("s3cr3t"));
    }
}
