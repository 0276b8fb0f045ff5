use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "FIRMADOR_CONFIG";

/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config file not found at {0}")]
    NotFound(PathBuf),
    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub overlay: OverlayConfig,
    #[serde(default)]
    pub signature: SignatureConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Offset of the signing time zone from UTC, in minutes.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default = "default_qr_marker")]
    pub qr_marker: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignatureConfig {
    #[serde(default)]
    pub payload: SignedPayload,
}

/// What the signature is computed over.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SignedPayload {
    /// The serialized document with the overlay applied.
    #[default]
    Document,
    /// A constant marker string, for parity with legacy signed output.
    Placeholder,
}

/// Payload signed in [`SignedPayload::Placeholder`] mode.
pub const PLACEHOLDER_PAYLOAD: &[u8] = b"Data to be signed";

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_max_upload_bytes() -> usize {
    25 * 1024 * 1024
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("firmador/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_utc_offset_minutes() -> i32 {
    -300 // UTC-05:00
}

fn default_label() -> String {
    "Firmado electrónicamente por:".to_string()
}

fn default_qr_marker() -> String {
    "FIRMADO ELECTRONICAMENTE".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            label: default_label(),
            qr_marker: default_qr_marker(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OverlayConfig {
    /// The configured signing time zone.
    pub fn time_zone(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(ConfigError::InvalidValue {
                name: "overlay.utc_offset_minutes",
                value: self.utc_offset_minutes.to_string(),
            })
    }
}

impl SignerConfig {
    /// Load from `FIRMADOR_CONFIG` if set, otherwise defaults; `PORT`
    /// overrides the listen port either way.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            config.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                name: PORT_ENV,
                value: port.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SignerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.overlay.time_zone()?;
        if self.fetch.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "fetch.timeout_secs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SignerConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.fetch.timeout(), Duration::from_secs(30));
        assert_eq!(config.signature.payload, SignedPayload::Document);
        assert_eq!(
            config.overlay.time_zone().unwrap(),
            FixedOffset::west_opt(5 * 3600).unwrap()
        );
    }

    #[test]
    fn test_partial_toml() {
        let config = SignerConfig::from_toml(
            r#"
            [signature]
            payload = "placeholder"

            [overlay]
            utc_offset_minutes = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.signature.payload, SignedPayload::Placeholder);
        assert_eq!(config.overlay.utc_offset_minutes, 60);
        assert_eq!(config.overlay.qr_marker, "FIRMADO ELECTRONICAMENTE");
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_rejects_out_of_range_offset() {
        let err = SignerConfig::from_toml("[overlay]\nutc_offset_minutes = 100000\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_rejects_overflowing_offset() {
        for minutes in ["2000000000", "-2000000000"] {
            let toml = format!("[overlay]\nutc_offset_minutes = {minutes}\n");
            let err = SignerConfig::from_toml(&toml).unwrap_err();
            assert!(matches!(
                err,
                ConfigError::InvalidValue {
                    name: "overlay.utc_offset_minutes",
                    ..
                }
            ));
        }
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let err = SignerConfig::from_toml("[fetch]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
