use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::Result;

pub const DEFAULT_OPTIONS_PATH: &str = "/data/options.json";
pub const DEFAULT_RECORDING_DIR: &str = "recording";
pub const DEFAULT_NVR_PORT: u16 = 443;
pub const DEFAULT_NVR_PROTOCOL: &str = "https";

/// Raw shape of the add-on options file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
pub struct OptionsFile {
    #[serde(rename = "RECORDING_DIR")]
    pub recording_dir: Option<String>,
    #[serde(rename = "QVRPRO_USER")]
    pub user: Option<String>,
    #[serde(rename = "QVRPRO_PW")]
    pub password: Option<String>,
    #[serde(rename = "QVRPRO_HOST")]
    pub host: Option<String>,
    #[serde(rename = "QVRPRO_PROTOCOL")]
    pub protocol: Option<String>,
    #[serde(rename = "QVRPRO_PORT")]
    pub port: Option<Value>,
    #[serde(rename = "VERIFY_SSL")]
    pub verify_ssl: Option<Value>,
    #[serde(rename = "CAMERA_GUID")]
    pub camera_guid: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub recording_dir: PathBuf,
    pub nvr: NvrSettings,
    /// Fixed camera; `None` means discover the first camera on the NVR.
    pub camera_guid: Option<String>,
}

#[derive(Clone)]
pub struct NvrSettings {
    pub username: String,
    pub password: String,
    pub host: String,
    pub protocol: String,
    pub port: u16,
    pub verify_ssl: bool,
}

// Keeps the password out of the logs.
impl std::fmt::Debug for NvrSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NvrSettings")
            .field("username", &self.username)
            .field("password", &"***")
            .field("host", &self.host)
            .field("protocol", &self.protocol)
            .field("port", &self.port)
            .field("verify_ssl", &self.verify_ssl)
            .finish()
    }
}

impl Default for NvrSettings {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            host: String::new(),
            protocol: DEFAULT_NVR_PROTOCOL.to_string(),
            port: DEFAULT_NVR_PORT,
            verify_ssl: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_options(OptionsFile::default())
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let options: OptionsFile = serde_json::from_str(&content)?;
        info!("Loaded options from {}", path.as_ref().display());
        Ok(Self::from_options(options))
    }

    pub fn from_options(options: OptionsFile) -> Self {
        let recording_dir = non_empty(options.recording_dir)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RECORDING_DIR));

        let nvr = NvrSettings {
            username: options.user.unwrap_or_default(),
            password: options.password.unwrap_or_default(),
            host: options.host.unwrap_or_default(),
            protocol: non_empty(options.protocol).unwrap_or_else(|| DEFAULT_NVR_PROTOCOL.to_string()),
            port: options.port.as_ref().map(parse_port).unwrap_or(DEFAULT_NVR_PORT),
            verify_ssl: !options.verify_ssl.as_ref().is_some_and(disables_verification),
        };

        Self {
            recording_dir,
            nvr,
            camera_guid: non_empty(options.camera_guid),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_port(value: &Value) -> u16 {
    let parsed = match value {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| {
        warn!("Invalid QVRPRO_PORT {}, using {}", value, DEFAULT_NVR_PORT);
        DEFAULT_NVR_PORT
    })
}

// Only a value equal to zero turns verification off; `false` compares equal to 0.
fn disables_verification(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        _ => false,
    }
}
