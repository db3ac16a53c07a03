//! Configuration loading and credential resolution
//!
//! Every setting is resolved with the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback, only where a sensible default exists)
//!
//! A missing TOML file is not an error: the caller gets a warning and the
//! compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const ENV_CONFIG_PATH: &str = "SDCLI_CONFIG";
/// Environment variable overriding the Platform Backend base URL
pub const ENV_PLATFORM_URL: &str = "SDCLI_PLATFORM_URL";
/// Environment variable holding the OAuth client id
pub const ENV_CLIENT_ID: &str = "SDCLI_CLIENT_ID";
/// Environment variable holding the access key id
pub const ENV_ACCESS_KEY_ID: &str = "SDCLI_ACCESS_KEY_ID";
/// Environment variable holding the access key secret
pub const ENV_ACCESS_KEY_SECRET: &str = "SDCLI_ACCESS_KEY_SECRET";

/// Default Platform Backend endpoint
pub const DEFAULT_PLATFORM_URL: &str = "https://app.shapediver.com";

/// Contents of the TOML config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Platform Backend access
    #[serde(default)]
    pub platform: PlatformSection,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Model check polling
    #[serde(default)]
    pub polling: PollingConfig,
}

/// `[platform]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSection {
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[polling]` table
///
/// Only the fixed interval and the upload-start budget are configurable.
/// The check-completion budget always derives from the model's own
/// maximum computation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            start_timeout_ms: default_start_timeout_ms(),
        }
    }
}

/// Lower bound on the model check polling interval
pub const MIN_POLL_INTERVAL_MS: u64 = 2500;

impl PollingConfig {
    /// Reject intervals that would poll the Geometry Backend faster than allowed
    pub fn validate(&self) -> Result<()> {
        if self.interval_ms < MIN_POLL_INTERVAL_MS {
            return Err(Error::Config(format!(
                "polling.interval_ms must be at least {} (got {})",
                MIN_POLL_INTERVAL_MS, self.interval_ms
            )));
        }
        Ok(())
    }
}

fn default_interval_ms() -> u64 {
    MIN_POLL_INTERVAL_MS
}

fn default_start_timeout_ms() -> u64 {
    60_000
}

/// Values supplied on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub config_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub client_id: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
}

/// Fully resolved Platform Backend credentials
#[derive(Clone)]
pub struct PlatformCredentials {
    pub base_url: String,
    pub client_id: Option<String>,
    pub access_key_id: String,
    pub access_key_secret: String,
}

impl std::fmt::Debug for PlatformCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformCredentials")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"***")
            .finish()
    }
}

/// Everything a CLI invocation needs from configuration
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub credentials: PlatformCredentials,
    pub logging: LoggingConfig,
    pub polling: PollingConfig,
}

/// Validate a key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Determine which config file to read
///
/// CLI path → `SDCLI_CONFIG` → `<config dir>/sdcli/config.toml`
pub fn config_file_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(ENV_CONFIG_PATH) {
        if is_valid_key(&path) {
            return Some(PathBuf::from(path));
        }
    }

    dirs::config_dir().map(|d| d.join("sdcli").join("config.toml"))
}

/// Load the TOML config file, falling back to defaults when it is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        debug!("Config file not found: {}", path.display());
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write a TOML config file, creating parent directories as needed
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve one setting across CLI → ENV → TOML
///
/// Returns the value and the name of the source it came from.
fn resolve_setting(
    name: &str,
    cli: Option<&str>,
    env_var: &str,
    toml: Option<&str>,
) -> Option<(String, &'static str)> {
    let env = std::env::var(env_var).ok();

    let candidates: [(Option<&str>, &'static str); 3] = [
        (cli, "command line"),
        (env.as_deref(), "environment"),
        (toml, "TOML"),
    ];

    let sources: Vec<&str> = candidates
        .iter()
        .filter(|(value, _)| value.map(is_valid_key).unwrap_or(false))
        .map(|(_, source)| *source)
        .collect();

    // Warn if multiple sources (potential misconfiguration)
    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            sources[0]
        );
    }

    let resolved = candidates
        .into_iter()
        .find_map(|(value, source)| match value {
            Some(v) if is_valid_key(v) => Some((v.trim().to_string(), source)),
            _ => None,
        });
    resolved
}

/// Resolve configuration against an already-loaded TOML config
pub fn resolve_with_toml(overrides: &CliOverrides, toml_config: TomlConfig) -> Result<ResolvedConfig> {
    toml_config.polling.validate()?;

    let platform = &toml_config.platform;

    let base_url = resolve_setting(
        "Platform URL",
        overrides.base_url.as_deref(),
        ENV_PLATFORM_URL,
        platform.base_url.as_deref(),
    )
    .map(|(value, _)| value)
    .unwrap_or_else(|| DEFAULT_PLATFORM_URL.to_string());

    let client_id = resolve_setting(
        "Client id",
        overrides.client_id.as_deref(),
        ENV_CLIENT_ID,
        platform.client_id.as_deref(),
    )
    .map(|(value, _)| value);

    let access_key_id = resolve_setting(
        "Access key id",
        overrides.access_key_id.as_deref(),
        ENV_ACCESS_KEY_ID,
        platform.access_key_id.as_deref(),
    );

    let access_key_secret = resolve_setting(
        "Access key secret",
        overrides.access_key_secret.as_deref(),
        ENV_ACCESS_KEY_SECRET,
        platform.access_key_secret.as_deref(),
    );

    let (access_key_id, access_key_secret) = match (access_key_id, access_key_secret) {
        (Some((id, id_source)), Some((secret, _))) => {
            info!("Platform access key loaded from {}", id_source);
            (id, secret)
        }
        _ => {
            return Err(Error::Config(format!(
                "Platform access key not configured. Please configure using one of:\n\
                 1. Command line: --access-key-id ID --access-key-secret SECRET\n\
                 2. Environment: {}=... {}=...\n\
                 3. TOML config: ~/.config/sdcli/config.toml ([platform] access_key_id, access_key_secret)",
                ENV_ACCESS_KEY_ID, ENV_ACCESS_KEY_SECRET
            )))
        }
    };

    Ok(ResolvedConfig {
        credentials: PlatformCredentials {
            base_url: base_url.trim_end_matches('/').to_string(),
            client_id,
            access_key_id,
            access_key_secret,
        },
        logging: toml_config.logging,
        polling: toml_config.polling,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_polling_defaults() {
        let polling = PollingConfig::default();
        assert_eq!(polling.interval_ms, 2500);
        assert_eq!(polling.start_timeout_ms, 60_000);
    }

    #[test]
    fn test_polling_interval_lower_bound() {
        assert!(PollingConfig::default().validate().is_ok());

        let fast = PollingConfig {
            interval_ms: 0,
            ..Default::default()
        };
        assert!(matches!(fast.validate(), Err(Error::Config(_))));

        let just_under = PollingConfig {
            interval_ms: MIN_POLL_INTERVAL_MS - 1,
            ..Default::default()
        };
        assert!(just_under.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [platform]
            access_key_id = "id"
            "#,
        )
        .unwrap();

        assert_eq!(config.platform.access_key_id.as_deref(), Some("id"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.polling.interval_ms, 2500);
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = PlatformCredentials {
            base_url: DEFAULT_PLATFORM_URL.to_string(),
            client_id: None,
            access_key_id: "id".to_string(),
            access_key_secret: "very-secret".to_string(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("very-secret"));
    }
}
