use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::accessories::AccessoryIdentity;
use crate::protocol::client::DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub host: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    /// Fade applied to dimmable outputs, in seconds.
    pub fade_seconds: Option<u64>,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    #[serde(alias = "integrationID")]
    pub integration_id: String,
    #[serde(default = "default_dimmable", alias = "isDimmable")]
    pub dimmable: bool,
    pub uuid: Option<Uuid>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_username() -> String {
    String::from("lutron")
}

fn default_password() -> String {
    String::from("integration")
}

fn default_dimmable() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            host: None,
            port: default_port(),
            username: default_username(),
            password: default_password(),
            fade_seconds: None,
            devices: vec![],
        }
    }
}

impl Settings {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings file {}", path.display()))
    }

    /// Reads the file, falling back to defaults when it cannot be read.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Settings::default());
        };
        if !Path::new(path).exists() {
            warn!("Settings file {path} not found, using default settings");
            return Ok(Settings::default());
        }
        Settings::from_file(path)
    }

    pub fn fade(&self) -> Option<Duration> {
        self.fade_seconds.map(Duration::from_secs)
    }
}

impl DeviceConfig {
    pub fn identity(&self) -> AccessoryIdentity {
        match self.uuid {
            Some(uuid) => AccessoryIdentity::new(&self.name, uuid, &self.integration_id, self.dimmable),
            None => AccessoryIdentity::for_output(&self.name, &self.integration_id, self.dimmable),
        }
    }
}
