//! Configuration management.

use crate::capabilities::WidgetDelivery;
use crate::state::{
    TransportSettings, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MCP_PATH, DEFAULT_MESSAGES_PATH,
};
use anyhow::{bail, Context};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration structure that matches the TOML file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    session: SessionConfig,
    #[serde(default)]
    widgets: WidgetsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ServerConfig {
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_mcp_path")]
    mcp_path: String,
    #[serde(default = "default_messages_path")]
    messages_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            mcp_path: default_mcp_path(),
            messages_path: default_messages_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SessionConfig {
    #[serde(default = "default_heartbeat_secs")]
    heartbeat_secs: u64,
    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,
    /// Unset disables idle reaping
    idle_timeout_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
            channel_capacity: default_channel_capacity(),
            idle_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WidgetsConfig {
    #[serde(default = "default_assets_dir")]
    assets_dir: PathBuf,
    #[serde(default)]
    delivery: WidgetDelivery,
}

impl Default for WidgetsConfig {
    fn default() -> Self {
        Self {
            assets_dir: default_assets_dir(),
            delivery: WidgetDelivery::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LoggingConfig {
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    log_file: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    /// If not set, uses RUST_LOG environment variable or defaults to "info"
    log_level: Option<String>,
}

fn default_port() -> u16 {
    pizzaz_types::DEFAULT_PORT
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_mcp_path() -> String {
    DEFAULT_MCP_PATH.to_string()
}

fn default_messages_path() -> String {
    DEFAULT_MESSAGES_PATH.to_string()
}

fn default_heartbeat_secs() -> u64 {
    15
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets")
}

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub assets_dir: Option<PathBuf>,
    pub widget_delivery: Option<WidgetDelivery>,
    pub heartbeat_secs: Option<u64>,
    /// Extra config file, merged above `.pizzaz.toml`
    pub config_file: Option<PathBuf>,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Address to bind
    pub host: String,
    /// Path of the push (SSE) endpoint
    pub mcp_path: String,
    /// Path of the pull (POST) endpoint
    pub messages_path: String,
    pub heartbeat_interval: Duration,
    pub channel_capacity: usize,
    pub idle_timeout: Option<Duration>,
    /// Directory holding the built widget bundles
    pub assets_dir: PathBuf,
    pub widget_delivery: WidgetDelivery,
    /// Path to log file (if set, logs will be written to file in addition to stdout)
    pub log_file: Option<PathBuf>,
    /// Log level (if set, overrides RUST_LOG environment variable)
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with full priority chain: CLI args > env vars > config files > defaults.
    ///
    /// Config files are searched in this order:
    /// 1. `config.toml` in user config directory (~/.config/pizzaz/ on Linux)
    /// 2. `.pizzaz.toml` in current directory
    /// 3. the file passed with `--config`, if any
    ///
    /// Environment variables use the `PIZZAZ_` prefix with `__` between
    /// section and key, e.g. `PIZZAZ_SESSION__HEARTBEAT_SECS=30`. A bare
    /// `PORT` is honoured for hosting platforms that set it.
    pub fn from_figment(overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let local_config = std::env::current_dir().ok().map(|d| d.join(".pizzaz.toml"));
        let user_config = directories::ProjectDirs::from("", "", "pizzaz")
            .map(|dirs| dirs.config_dir().join("config.toml"));

        // Build figment with priority: defaults < user config < local config < env vars < CLI args
        let mut figment = Figment::new().merge(Serialized::defaults(ConfigFile {
            server: ServerConfig::default(),
            session: SessionConfig::default(),
            widgets: WidgetsConfig::default(),
            logging: LoggingConfig::default(),
        }));

        for path in [user_config, local_config].into_iter().flatten() {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            }
        }

        if let Some(ref path) = overrides.config_file {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            figment = figment.merge(Toml::file(path));
        }

        figment = figment
            .merge(
                Env::raw()
                    .only(&["PORT"])
                    .map(|_| "server.port".into()),
            )
            .merge(Env::prefixed("PIZZAZ_").split("__"));

        if let Some(p) = overrides.port {
            figment = figment.merge(Serialized::default("server.port", p));
        }
        if let Some(ref h) = overrides.host {
            figment = figment.merge(Serialized::default("server.host", h));
        }
        if let Some(ref dir) = overrides.assets_dir {
            figment = figment.merge(Serialized::default("widgets.assets_dir", dir));
        }
        if let Some(delivery) = overrides.widget_delivery {
            figment = figment.merge(Serialized::default("widgets.delivery", delivery));
        }
        if let Some(secs) = overrides.heartbeat_secs {
            figment = figment.merge(Serialized::default("session.heartbeat_secs", secs));
        }

        let config_file: ConfigFile = figment
            .extract()
            .context("Failed to load configuration")?;
        Self::from_file(config_file)
    }

    fn from_file(file: ConfigFile) -> anyhow::Result<Self> {
        if file.session.heartbeat_secs == 0 {
            bail!("session.heartbeat_secs must be greater than zero");
        }
        if file.session.channel_capacity == 0 {
            bail!("session.channel_capacity must be greater than zero");
        }
        if file.session.idle_timeout_secs == Some(0) {
            bail!("session.idle_timeout_secs must be greater than zero when set");
        }
        for (key, path) in [
            ("server.mcp_path", &file.server.mcp_path),
            ("server.messages_path", &file.server.messages_path),
        ] {
            if !path.starts_with('/') {
                bail!("{} must start with '/', got {:?}", key, path);
            }
        }
        if file.server.mcp_path == file.server.messages_path {
            bail!("server.mcp_path and server.messages_path must differ");
        }

        Ok(Self {
            port: file.server.port,
            host: file.server.host,
            mcp_path: file.server.mcp_path,
            messages_path: file.server.messages_path,
            heartbeat_interval: Duration::from_secs(file.session.heartbeat_secs),
            channel_capacity: file.session.channel_capacity,
            idle_timeout: file.session.idle_timeout_secs.map(Duration::from_secs),
            assets_dir: file.widgets.assets_dir,
            widget_delivery: file.widgets.delivery,
            log_file: file.logging.log_file,
            log_level: file.logging.log_level,
        })
    }

    /// Settings handed to the HTTP transport.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            heartbeat_interval: self.heartbeat_interval,
            channel_capacity: self.channel_capacity,
            mcp_path: self.mcp_path.clone(),
            messages_path: self.messages_path.clone(),
            idle_timeout: self.idle_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "PORT",
        "PIZZAZ_SERVER__PORT",
        "PIZZAZ_SESSION__HEARTBEAT_SECS",
        "PIZZAZ_WIDGETS__DELIVERY",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    /// Load config from inside `dir`, restoring the working directory afterwards.
    fn load_in(dir: &TempDir, overrides: ConfigOverrides) -> anyhow::Result<Config> {
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir).unwrap();
        let config = Config::from_figment(overrides);
        let _ = std::env::set_current_dir(original_dir);
        config
    }

    #[test]
    #[serial]
    fn test_from_figment_defaults() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        let config = load_in(&temp_dir, ConfigOverrides::default()).unwrap();

        assert_eq!(config.port, pizzaz_types::DEFAULT_PORT);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.mcp_path, "/mcp");
        assert_eq!(config.messages_path, "/mcp/messages");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(config.channel_capacity, 64);
        assert!(config.idle_timeout.is_none());
        assert_eq!(config.assets_dir, PathBuf::from("assets"));
        assert_eq!(config.widget_delivery, WidgetDelivery::Reference);
    }

    #[test]
    #[serial]
    fn test_from_figment_config_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".pizzaz.toml"),
            r#"
[server]
port = 7777
mcp_path = "/proxy/mcp"
messages_path = "/proxy/mcp/messages"

[session]
heartbeat_secs = 5
idle_timeout_secs = 600

[widgets]
delivery = "inline"
"#,
        )
        .unwrap();

        let config = load_in(&temp_dir, ConfigOverrides::default()).unwrap();

        assert_eq!(config.port, 7777);
        assert_eq!(config.mcp_path, "/proxy/mcp");
        assert_eq!(config.messages_path, "/proxy/mcp/messages");
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.widget_delivery, WidgetDelivery::Inline);
    }

    #[test]
    #[serial]
    fn test_env_vars_override_config_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(".pizzaz.toml"),
            "[server]\nport = 7777\n[session]\nheartbeat_secs = 5",
        )
        .unwrap();

        std::env::set_var("PIZZAZ_SERVER__PORT", "8888");
        std::env::set_var("PIZZAZ_SESSION__HEARTBEAT_SECS", "30");
        let config = load_in(&temp_dir, ConfigOverrides::default());
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.port, 8888);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    }

    #[test]
    #[serial]
    fn test_bare_port_env_var() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        std::env::set_var("PORT", "9100");
        let config = load_in(&temp_dir, ConfigOverrides::default());
        clear_env();

        assert_eq!(config.unwrap().port, 9100);
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env_and_config() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".pizzaz.toml"), "[server]\nport = 7777").unwrap();

        std::env::set_var("PIZZAZ_SERVER__PORT", "8888");
        std::env::set_var("PIZZAZ_WIDGETS__DELIVERY", "inline");
        let config = load_in(
            &temp_dir,
            ConfigOverrides {
                port: Some(9999),
                widget_delivery: Some(WidgetDelivery::Reference),
                assets_dir: Some(PathBuf::from("/srv/widgets")),
                ..ConfigOverrides::default()
            },
        );
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.port, 9999);
        assert_eq!(config.widget_delivery, WidgetDelivery::Reference);
        assert_eq!(config.assets_dir, PathBuf::from("/srv/widgets"));
    }

    #[test]
    #[serial]
    fn test_explicit_config_file() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();
        let extra = temp_dir.path().join("extra.toml");
        fs::write(temp_dir.path().join(".pizzaz.toml"), "[server]\nport = 7777").unwrap();
        fs::write(&extra, "[server]\nport = 7878").unwrap();

        let config = load_in(
            &temp_dir,
            ConfigOverrides {
                config_file: Some(extra),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();
        assert_eq!(config.port, 7878);

        let missing = load_in(
            &temp_dir,
            ConfigOverrides {
                config_file: Some(temp_dir.path().join("nope.toml")),
                ..ConfigOverrides::default()
            },
        );
        assert!(missing.is_err());
    }

    #[test]
    #[serial]
    fn test_invalid_values_rejected() {
        clear_env();
        let temp_dir = TempDir::new().unwrap();

        for content in [
            "[session]\nheartbeat_secs = 0",
            "[session]\nchannel_capacity = 0",
            "[server]\nmcp_path = \"mcp\"",
            "[server]\nmcp_path = \"/x\"\nmessages_path = \"/x\"",
            "[widgets]\ndelivery = \"sideways\"",
        ] {
            fs::write(temp_dir.path().join(".pizzaz.toml"), content).unwrap();
            assert!(
                load_in(&temp_dir, ConfigOverrides::default()).is_err(),
                "accepted {content:?}"
            );
        }
    }

    #[test]
    fn test_transport_settings() {
        let config = Config::from_file(ConfigFile {
            server: ServerConfig::default(),
            session: SessionConfig {
                idle_timeout_secs: Some(90),
                ..SessionConfig::default()
            },
            widgets: WidgetsConfig::default(),
            logging: LoggingConfig::default(),
        })
        .unwrap();

        let settings = config.transport_settings();
        assert_eq!(settings.heartbeat_interval, Duration::from_secs(15));
        assert_eq!(settings.idle_timeout, Some(Duration::from_secs(90)));
        assert_eq!(settings.messages_path, "/mcp/messages");
    }
}
