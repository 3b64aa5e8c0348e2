//! Configuration loading and first-run provisioning.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "hostlink";
pub const DEFAULT_PORT: u16 = 2001;

const JWT_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// TCP port for the HTTPS/WSS listener.
    pub port: u16,
    /// HMAC secret for token signing. Generated on first run.
    pub jwt_secret: String,
    pub logging: LoggingConfig,
    pub tls: TlsConfig,
    pub stream: StreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Optional externally provisioned certificate. When unset, a self-signed
/// pair is generated next to the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub cert: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Initial target frame rate.
    pub fps: u32,
    /// Initial JPEG quality.
    pub quality: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            fps: crate::stream::DEFAULT_FPS,
            quality: crate::capture::encoder::DEFAULT_QUALITY,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            jwt_secret: String::new(),
            logging: LoggingConfig::default(),
            tls: TlsConfig::default(),
            stream: StreamConfig::default(),
        }
    }
}

/// Resolve the config file path, honouring an explicit override.
pub fn config_path(override_path: Option<PathBuf>) -> Result<PathBuf> {
    match override_path {
        Some(path) => {
            if path.is_dir() {
                Ok(path.join("config.toml"))
            } else {
                Ok(path)
            }
        }
        None => Ok(default_config_dir()?.join("config.toml")),
    }
}

pub fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        let mut path = PathBuf::from(dir);
        path.push(APP_NAME);
        return Ok(path);
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

/// Load the config, writing a freshly provisioned default file first if
/// none exists. Environment variables prefixed `HOSTLINK__` override file
/// values.
pub fn load_or_init(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        write_default_config(path)?;
    }

    let built = Config::builder()
        .add_source(
            File::from(path)
                .format(FileFormat::Toml)
                .required(false),
        )
        .add_source(Environment::with_prefix("HOSTLINK").separator("__"))
        .build()
        .context("building configuration")?;

    let mut cfg: AppConfig = built
        .try_deserialize()
        .context("deserializing configuration")?;

    if cfg.port == 0 {
        cfg.port = DEFAULT_PORT;
    }
    if cfg.jwt_secret.is_empty() {
        // Tokens minted against an ephemeral secret die with the process.
        log::warn!("no jwt_secret configured, generating an ephemeral one");
        cfg.jwt_secret = random_secret(JWT_SECRET_LEN);
    }

    Ok(cfg)
}

/// Write a default config with a generated secret.
pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {parent:?}"))?;
    }

    let config = AppConfig {
        jwt_secret: random_secret(JWT_SECRET_LEN),
        ..AppConfig::default()
    };
    let toml = toml::to_string_pretty(&config).context("serializing default config")?;
    let mut body = String::new();
    body.push_str("# Configuration for ");
    body.push_str(APP_NAME);
    body.push('\n');
    body.push('\n');
    body.push_str(&toml);
    std::fs::write(path, body)
        .with_context(|| format!("writing config file to {}", path.display()))?;

    info!("generated default configuration at {}", path.display());
    Ok(())
}

fn random_secret(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.stream.fps, crate::stream::DEFAULT_FPS);
        assert_eq!(cfg.stream.quality, crate::capture::encoder::DEFAULT_QUALITY);
        assert!(cfg.tls.cert.is_none());
    }

    #[test]
    fn first_run_provisions_a_secret() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let cfg = load_or_init(&path).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.jwt_secret.len(), JWT_SECRET_LEN);

        // Reloading keeps the persisted secret.
        let again = load_or_init(&path).unwrap();
        assert_eq!(cfg.jwt_secret, again.jwt_secret);
    }

    #[test]
    fn file_values_are_loaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "port = 9443\njwt_secret = \"abc\"\n\n[stream]\nfps = 10\nquality = 80\n",
        )
        .unwrap();

        let cfg = load_or_init(&path).unwrap();
        assert_eq!(cfg.port, 9443);
        assert_eq!(cfg.jwt_secret, "abc");
        assert_eq!(cfg.stream.fps, 10);
        assert_eq!(cfg.stream.quality, 80);
    }
}
