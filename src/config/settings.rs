//! Installer settings
//!
//! Every field has a default, so a settings file only needs to name what it
//! changes:
//!
//! ```json
//! { "interface": "wg1", "ssh_port": 2222, "jail": { "bantime": 86400 } }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::merge::{DEFAULT_KEY_FIELD, DEFAULT_PLACEHOLDER, DEFAULT_SENTINEL};
use crate::error::ConfigError;

/// Linux limits interface names to 15 bytes
const MAX_INTERFACE_NAME: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProvisionSettings {
    /// Interface name, also the config file stem
    pub interface: String,
    /// Directory wg-quick reads configs from
    pub config_dir: PathBuf,
    /// Token in templates that stands for the private key
    pub placeholder: String,
    /// Assignment key holding the private key
    pub key_field: String,
    /// Line that ends a pasted template
    pub sentinel: String,
    /// SSH port kept open when the firewall is enabled
    pub ssh_port: u16,
    /// Enable `wg-quick@<interface>` at boot
    pub enable_on_boot: bool,
    /// Intrusion guard tuning
    pub jail: JailSettings,
}

/// fail2ban sshd jail tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JailSettings {
    pub path: PathBuf,
    pub maxretry: u32,
    /// Seconds
    pub findtime: u64,
    /// Seconds
    pub bantime: u64,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            interface: "wg0".to_string(),
            config_dir: PathBuf::from("/etc/wireguard"),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            key_field: DEFAULT_KEY_FIELD.to_string(),
            sentinel: DEFAULT_SENTINEL.to_string(),
            ssh_port: 22,
            enable_on_boot: true,
            jail: JailSettings::default(),
        }
    }
}

impl Default for JailSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/fail2ban/jail.local"),
            maxretry: 5,
            findtime: 600,
            bantime: 3600,
        }
    }
}

impl ProvisionSettings {
    /// Load settings from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                ConfigError::Io(e)
            }
        })?;

        let settings: Self = serde_json::from_str(&json).map_err(|e| ConfigError::Settings {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        settings.validate().map_err(|message| ConfigError::Settings {
            path: path.display().to_string(),
            message,
        })?;

        tracing::debug!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Check values serde cannot check on its own
    pub fn validate(&self) -> Result<(), String> {
        validate_interface_name(&self.interface)?;
        if self.placeholder.is_empty() {
            return Err("placeholder must not be empty".to_string());
        }
        if self.key_field.trim().is_empty() || self.key_field.contains('=') {
            return Err(format!("invalid key_field: {:?}", self.key_field));
        }
        if self.sentinel.trim().is_empty() {
            return Err("sentinel must not be blank".to_string());
        }
        Ok(())
    }

    /// Where the interface config gets installed
    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(format!("{}.conf", self.interface))
    }
}

/// Interface names double as file stems and systemd instance names
pub fn validate_interface_name(name: &str) -> Result<(), String> {
    if name.is_empty() || name.len() > MAX_INTERFACE_NAME {
        return Err(format!(
            "interface name must be 1-{} characters, got {:?}",
            MAX_INTERFACE_NAME, name
        ));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '=' | '+' | '.' | '-'))
    {
        return Err(format!("invalid characters in interface name {:?}", name));
    }
    Ok(())
}
