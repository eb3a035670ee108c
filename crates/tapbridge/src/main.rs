//! tap-bridge entry point.
//!
//! Bridges a physical Ethernet interface to a Linux tap interface: every frame
//! captured on the physical link is injected into the tap, and every frame the
//! local stack sends out of the tap is transmitted on the physical link.
//!
//! # Usage
//!
//! ```text
//! tap-bridge [OPTIONS]
//!
//! Options:
//!   --config <PATH>       TOML config file [default: /etc/tap-bridge/config.toml]
//!   --link <IFACE>        Physical interface to capture on
//!   --tap <NAME>          Tap interface to create or attach to
//!   --ethertype <N>       EtherType to capture, decimal or 0x hex
//!   --no-promisc          Do not enable promiscuous mode on the link
//!   --echo-suppression    Drop captured copies of our own transmissions
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                     | Flag                 |
//! |------------------------------|----------------------|
//! | `TAPBRIDGE_CONFIG`           | `--config`           |
//! | `TAPBRIDGE_LINK`             | `--link`             |
//! | `TAPBRIDGE_TAP`              | `--tap`              |
//! | `TAPBRIDGE_ETHERTYPE`        | `--ethertype`        |
//! | `TAPBRIDGE_NO_PROMISC`       | `--no-promisc`       |
//! | `TAPBRIDGE_ECHO_SUPPRESSION` | `--echo-suppression` |
//!
//! Command-line values override the config file, which overrides built-in
//! defaults.  `RUST_LOG` overrides `bridge.log_level`.
//!
//! # Architecture overview
//!
//! ```text
//! main()
//!  ├─ load_config + CLI overrides + validate
//!  ├─ establish()              tap, raw socket, ioctls, bind
//!  ├─ signal task              SIGINT / SIGTERM -> ShutdownHandle::trigger
//!  └─ spawn_blocking           ForwardingLoop::run over poll(2)
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use tapbridge::infrastructure::storage::config::{load_config, AppConfig, DEFAULT_CONFIG_PATH};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Bridge a physical Ethernet link to a Linux tap interface.
#[derive(Debug, Parser)]
#[command(
    name = "tap-bridge",
    about = "Forward Ethernet frames between a physical interface and a tap interface",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.
    ///
    /// A missing file is not an error; built-in defaults are used.
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "TAPBRIDGE_CONFIG")]
    config: PathBuf,

    /// Physical interface to capture on and transmit through.
    #[arg(long, env = "TAPBRIDGE_LINK")]
    link: Option<String>,

    /// Tap interface to create, or attach to if it already exists.
    #[arg(long, env = "TAPBRIDGE_TAP")]
    tap: Option<String>,

    /// EtherType the raw socket captures (`3` / `0x0003` is every protocol).
    #[arg(long, value_parser = parse_ethertype, env = "TAPBRIDGE_ETHERTYPE")]
    ethertype: Option<u16>,

    /// Leave the physical interface's promiscuous flag untouched.
    #[arg(long, env = "TAPBRIDGE_NO_PROMISC")]
    no_promisc: bool,

    /// Drop captured frames that match a recent transmission.
    #[arg(long, env = "TAPBRIDGE_ECHO_SUPPRESSION")]
    echo_suppression: bool,
}

impl Cli {
    /// Overlays the flags that were given onto `config`.
    fn apply_to(&self, config: &mut AppConfig) {
        if let Some(link) = &self.link {
            config.link.interface = link.clone();
        }
        if let Some(tap) = &self.tap {
            config.tap.name = tap.clone();
        }
        if let Some(ethertype) = self.ethertype {
            config.link.ethertype = ethertype;
        }
        if self.no_promisc {
            config.link.promiscuous = false;
        }
        if self.echo_suppression {
            config.bridge.echo_suppression = true;
        }
    }

    /// Loads the config file, applies the overrides and validates the result.
    fn into_app_config(self) -> anyhow::Result<AppConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("loading {}", self.config.display()))?;
        self.apply_to(&mut config);
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

/// Parses an EtherType given in decimal or `0x`-prefixed hexadecimal.
fn parse_ethertype(s: &str) -> Result<u16, String> {
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid EtherType '{s}': {e}"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_app_config()?;

    // RUST_LOG wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.bridge.log_level)),
        )
        .init();

    info!(
        "tap-bridge starting: link={}, tap={}",
        config.link.interface, config.tap.name
    );

    run(config).await?;

    info!("tap-bridge stopped");
    Ok(())
}

#[cfg(target_os = "linux")]
async fn run(config: AppConfig) -> anyhow::Result<()> {
    use tapbridge::application::ForwardingLoop;
    use tapbridge::infrastructure::linux::{establish, PollReadiness, SetupError, ShutdownHandle};

    let endpoints = establish(&config).context("setting up the bridge")?;
    let shutdown = ShutdownHandle::new()
        .map_err(SetupError::Shutdown)
        .context("setting up the bridge")?;

    let readiness = PollReadiness::new(&endpoints.link, &endpoints.tap, shutdown.clone());
    let mut forwarder =
        ForwardingLoop::new(endpoints.link, endpoints.tap, readiness, endpoints.identity);
    if let Some(echo) = config.bridge.echo_suppressor() {
        forwarder = forwarder.with_echo_suppression(echo);
    }

    tokio::spawn(wait_for_signal(shutdown));

    let stats = tokio::task::spawn_blocking(move || forwarder.run())
        .await
        .context("forwarding thread panicked")?
        .map_err(|e| {
            if let Some(errno) = e.os_error() {
                tracing::error!(errno, "forwarding stopped by an OS error");
            }
            e
        })
        .context("forwarding failed")?;

    info!(
        link_to_tap = stats.link_to_tap_frames,
        tap_to_link = stats.tap_to_link_frames,
        "bridge shut down cleanly"
    );
    Ok(())
}

#[cfg(not(target_os = "linux"))]
async fn run(_config: AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("tap-bridge requires Linux tap devices and AF_PACKET sockets")
}

/// Triggers `shutdown` on the first SIGINT or SIGTERM.
#[cfg(target_os = "linux")]
async fn wait_for_signal(shutdown: tapbridge::infrastructure::linux::ShutdownHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to listen for SIGTERM: {e}");
            return;
        }
    };

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
                return;
            }
            info!("received Ctrl+C, shutting down");
        }
        _ = terminate.recv() => info!("received SIGTERM, shutting down"),
    }

    if let Err(e) = shutdown.trigger() {
        tracing::error!("failed to wake the forwarding loop: {e}");
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    /// A `Cli` with no flags given, built directly so `TAPBRIDGE_*` variables
    /// in the test environment cannot leak in.
    fn bare_cli() -> Cli {
        Cli {
            config: PathBuf::from("/nonexistent/tap-bridge/config.toml"),
            link: None,
            tap: None,
            ethertype: None,
            no_promisc: false,
            echo_suppression: false,
        }
    }

    #[test]
    fn test_cli_without_flags_leaves_config_untouched() {
        // Arrange
        let cli = bare_cli();
        let mut config = AppConfig::default();

        // Act
        cli.apply_to(&mut config);

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_cli_default_config_path() {
        let command = Cli::command();
        let config_arg = command
            .get_arguments()
            .find(|arg| arg.get_id() == "config")
            .expect("--config is declared");

        let defaults: Vec<String> = config_arg
            .get_default_values()
            .iter()
            .map(|v| v.to_string_lossy().into_owned())
            .collect();
        assert_eq!(defaults, [DEFAULT_CONFIG_PATH]);
    }

    #[test]
    fn test_cli_every_flag_has_an_env_fallback() {
        let command = Cli::command();
        let envs: Vec<String> = command
            .get_arguments()
            .filter_map(|arg| arg.get_env())
            .map(|env| env.to_string_lossy().into_owned())
            .collect();

        assert_eq!(
            envs,
            [
                "TAPBRIDGE_CONFIG",
                "TAPBRIDGE_LINK",
                "TAPBRIDGE_TAP",
                "TAPBRIDGE_ETHERTYPE",
                "TAPBRIDGE_NO_PROMISC",
                "TAPBRIDGE_ECHO_SUPPRESSION",
            ]
        );
    }

    #[test]
    fn test_cli_link_and_tap_override() {
        let cli = Cli::parse_from(["tap-bridge", "--link", "enp3s0", "--tap", "tap7"]);
        let mut config = AppConfig::default();

        cli.apply_to(&mut config);

        assert_eq!(config.link.interface, "enp3s0");
        assert_eq!(config.tap.name, "tap7");
    }

    #[test]
    fn test_cli_flags_override_booleans() {
        let cli = Cli {
            no_promisc: true,
            echo_suppression: true,
            ..bare_cli()
        };
        let mut config = AppConfig::default();

        cli.apply_to(&mut config);

        assert!(!config.link.promiscuous);
        assert!(config.bridge.echo_suppression);
    }

    #[test]
    fn test_cli_ethertype_accepts_hex_and_decimal() {
        let hex = Cli::parse_from(["tap-bridge", "--ethertype", "0x88b5"]);
        let dec = Cli::parse_from(["tap-bridge", "--ethertype", "2048"]);

        assert_eq!(hex.ethertype, Some(0x88b5));
        assert_eq!(dec.ethertype, Some(0x0800));
    }

    #[test]
    fn test_cli_ethertype_rejects_garbage() {
        let result = Cli::try_parse_from(["tap-bridge", "--ethertype", "ipv4"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_ethertype_rejects_overflow() {
        assert!(parse_ethertype("0x10000").is_err());
        assert!(parse_ethertype("70000").is_err());
    }

    #[test]
    fn test_into_app_config_missing_file_uses_defaults() {
        // Arrange: the config path cannot exist
        let cli = Cli {
            link: Some("eth1".to_string()),
            ..bare_cli()
        };

        // Act
        let config = cli.into_app_config().unwrap();

        // Assert
        assert_eq!(config.link.interface, "eth1");
        assert_eq!(config.tap.name, "tap0");
    }

    #[test]
    fn test_into_app_config_rejects_link_equal_to_tap() {
        let cli = Cli {
            link: Some("tap0".to_string()),
            ..bare_cli()
        };

        assert!(cli.into_app_config().is_err());
    }
}
