//! TOML-based configuration for tap-bridge.
//!
//! Replaces compiled-in interface names with a file, by default
//! `/etc/tap-bridge/config.toml`:
//!
//! ```toml
//! [link]
//! interface = "enp0s25"
//! promiscuous = true
//! ethertype = 3          # ETH_P_ALL
//!
//! [tap]
//! name = "tap0"
//!
//! [bridge]
//! echo_suppression = false
//! log_level = "info"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]` and every section
//! `#[serde(default)]`, so an empty file, a partial file, or no file at all
//! yields a usable configuration.  Command-line flags are applied on top of
//! the loaded values in `main.rs`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tapbridge_core::EchoSuppressor;
use thiserror::Error;

/// Where the binary looks for its configuration when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/tap-bridge/config.toml";

/// `ETH_P_ALL`: capture every EtherType.
pub const ETH_P_ALL: u16 = 0x0003;

/// Longest interface name the kernel accepts (`IFNAMSIZ - 1`).
pub const MAX_IFNAME_LEN: usize = 15;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// The values parsed but cannot describe a working bridge.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub tap: TapConfig,
    #[serde(default)]
    pub bridge: BridgeSettings,
}

/// The physical interface side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkConfig {
    /// Name of the physical interface to bridge (e.g. `"eth0"`).
    #[serde(default = "default_link_interface")]
    pub interface: String,
    /// Put the interface into promiscuous mode so frames addressed to other
    /// hosts are captured too.
    #[serde(default = "default_true")]
    pub promiscuous: bool,
    /// Administratively bring the interface up before binding.
    #[serde(default = "default_true")]
    pub bring_up: bool,
    /// EtherType the raw socket captures.  `3` (`ETH_P_ALL`) captures all.
    #[serde(default = "default_ethertype")]
    pub ethertype: u16,
}

/// The virtual interface side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapConfig {
    /// Requested tap name.  A `%d` is replaced by the kernel with the first
    /// free number (e.g. `"tap%d"` → `"tap0"`).
    #[serde(default = "default_tap_name")]
    pub name: String,
    /// Administratively bring the tap up after it is created.
    #[serde(default = "default_true")]
    pub bring_up: bool,
}

/// Forwarding behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeSettings {
    /// Drop captured frames that match one of our own recent transmissions.
    #[serde(default)]
    pub echo_suppression: bool,
    /// Number of recent transmissions remembered for echo suppression.
    #[serde(default = "default_echo_window")]
    pub echo_window: usize,
    /// How long a transmission is remembered, in milliseconds.
    #[serde(default = "default_echo_max_age_ms")]
    pub echo_max_age_ms: u64,
    /// `tracing` level used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl BridgeSettings {
    /// Builds the echo suppressor these settings describe, if enabled.
    pub fn echo_suppressor(&self) -> Option<EchoSuppressor> {
        self.echo_suppression.then(|| {
            EchoSuppressor::new(
                self.echo_window,
                Duration::from_millis(self.echo_max_age_ms),
            )
        })
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_link_interface() -> String {
    "eth0".to_string()
}
fn default_tap_name() -> String {
    "tap0".to_string()
}
fn default_true() -> bool {
    true
}
fn default_ethertype() -> u16 {
    ETH_P_ALL
}
fn default_echo_window() -> usize {
    tapbridge_core::DEFAULT_ECHO_WINDOW
}
fn default_echo_max_age_ms() -> u64 {
    tapbridge_core::DEFAULT_ECHO_MAX_AGE.as_millis() as u64
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            interface: default_link_interface(),
            promiscuous: default_true(),
            bring_up: default_true(),
            ethertype: default_ethertype(),
        }
    }
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            name: default_tap_name(),
            bring_up: default_true(),
        }
    }
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            echo_suppression: false,
            echo_window: default_echo_window(),
            echo_max_age_ms: default_echo_max_age_ms(),
            log_level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Checks the values that the kernel or the loop would otherwise reject
    /// later with a less helpful error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ifname("link.interface", &self.link.interface)?;
        validate_ifname("tap.name", &self.tap.name)?;
        if self.link.interface == self.tap.name {
            return Err(ConfigError::Invalid(format!(
                "link.interface and tap.name are both {:?}",
                self.link.interface
            )));
        }
        if self.link.ethertype == 0 {
            return Err(ConfigError::Invalid(
                "link.ethertype must be non-zero".to_string(),
            ));
        }
        if self.bridge.echo_suppression && self.bridge.echo_window == 0 {
            return Err(ConfigError::Invalid(
                "bridge.echo_window must be at least 1 when echo_suppression is on".to_string(),
            ));
        }
        Ok(())
    }
}

fn validate_ifname(field: &str, name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} is empty")));
    }
    if name.len() > MAX_IFNAME_LEN {
        return Err(ConfigError::Invalid(format!(
            "{field} {name:?} is longer than {MAX_IFNAME_LEN} bytes"
        )));
    }
    if name.contains(|c: char| c == '\0' || c == '/' || c.is_whitespace()) {
        return Err(ConfigError::Invalid(format!(
            "{field} {name:?} contains an invalid character"
        )));
    }
    Ok(())
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads `AppConfig` from `path`, returning `AppConfig::default()` if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let cfg: AppConfig = toml::from_str(&content)?;
            Ok(cfg)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("tapbridge_test_{tag}_{}", std::process::id()))
            .join("config.toml")
    }

    // ── Defaults ──────────────────────────────────────────────────────────────

    #[test]
    fn test_app_config_default_names() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.link.interface, "eth0");
        assert_eq!(cfg.tap.name, "tap0");
    }

    #[test]
    fn test_app_config_default_captures_all_ethertypes_promiscuously() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.link.ethertype, ETH_P_ALL);
        assert!(cfg.link.promiscuous);
        assert!(cfg.link.bring_up);
        assert!(cfg.tap.bring_up);
    }

    #[test]
    fn test_echo_suppression_is_off_by_default() {
        let cfg = AppConfig::default();
        assert!(!cfg.bridge.echo_suppression);
        assert!(cfg.bridge.echo_suppressor().is_none());
        assert_eq!(cfg.bridge.echo_window, 64);
        assert_eq!(cfg.bridge.echo_max_age_ms, 50);
    }

    #[test]
    fn test_echo_suppressor_built_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.bridge.echo_suppression = true;
        assert!(cfg.bridge.echo_suppressor().is_some());
    }

    // ── TOML parsing ──────────────────────────────────────────────────────────

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        // Arrange / Act
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");

        // Assert
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_link_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[link]
interface = "enp0s25"
promiscuous = false
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.link.interface, "enp0s25");
        assert!(!cfg.link.promiscuous);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.link.ethertype, ETH_P_ALL);
        assert_eq!(cfg.tap.name, "tap0");
    }

    #[test]
    fn test_config_serializes_and_deserializes_round_trip() {
        let mut cfg = AppConfig::default();
        cfg.tap.name = "br-tap%d".to_string();
        cfg.link.ethertype = 0x0800;
        cfg.bridge.echo_suppression = true;

        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let restored: AppConfig = toml::from_str(&toml_str).expect("deserialize");

        assert_eq!(cfg, restored);
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<AppConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    // ── Validation ────────────────────────────────────────────────────────────

    #[test]
    fn test_default_config_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overlong_interface_name() {
        let mut cfg = AppConfig::default();
        cfg.link.interface = "a-very-long-ifname".to_string();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_same_link_and_tap() {
        let mut cfg = AppConfig::default();
        cfg.tap.name = cfg.link.interface.clone();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_and_odd_names() {
        for bad in ["", "eth 0", "eth/0"] {
            let mut cfg = AppConfig::default();
            cfg.link.interface = bad.to_string();
            assert!(cfg.validate().is_err(), "{bad:?} must be rejected");
        }
    }

    #[test]
    fn test_validate_rejects_zero_echo_window_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.bridge.echo_suppression = true;
        cfg.bridge.echo_window = 0;
        assert!(cfg.validate().is_err());

        cfg.bridge.echo_suppression = false;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_ethertype() {
        let mut cfg = AppConfig::default();
        cfg.link.ethertype = 0;
        assert!(cfg.validate().is_err());
    }

    // ── load_config / save_config ─────────────────────────────────────────────

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = PathBuf::from("/nonexistent/path/that/cannot/exist/config.toml");

        let cfg = load_config(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let path = temp_path("roundtrip");
        let mut cfg = AppConfig::default();
        cfg.link.interface = "enp3s0".to_string();
        cfg.bridge.log_level = "debug".to_string();

        // Act
        save_config(&path, &cfg).expect("save");
        let loaded = load_config(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_load_config_reports_malformed_file() {
        let path = temp_path("malformed");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[link\ninterface = ").unwrap();

        let result = load_config(&path);

        assert!(matches!(result, Err(ConfigError::Parse(_))));
        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }
}
