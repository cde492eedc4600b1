use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_rotation")]
    pub rotation: String, // "daily", "hourly", "never"
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            rotation: default_rotation(),
            ansi_colors: default_true(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "geo_tracker".to_string()
}
fn default_rotation() -> String {
    "daily".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // BLE protocol
    #[serde(default = "default_service_uuid")]
    pub ble_service_uuid: String,
    #[serde(default = "default_write_uuid")]
    pub ble_write_char_uuid: String,
    #[serde(default = "default_notify_uuid")]
    pub ble_notify_char_uuid: String,

    // Scanning
    #[serde(default = "default_scan_seconds")]
    pub scan_seconds: u64,
    #[serde(default = "default_true")]
    pub allow_duplicate_reports: bool,

    // Connection
    /// Wait after connect before GATT traffic, letting bonding settle.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Command written to request the stored telemetry block.
    #[serde(default = "default_telemetry_request")]
    pub telemetry_request: String,

    /// Previously associated tracker, connectable without a fresh scan.
    #[serde(default)]
    pub associated_peripheral_id: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ble_service_uuid: default_service_uuid(),
            ble_write_char_uuid: default_write_uuid(),
            ble_notify_char_uuid: default_notify_uuid(),
            scan_seconds: default_scan_seconds(),
            allow_duplicate_reports: true,
            settle_delay_ms: default_settle_delay_ms(),
            telemetry_request: default_telemetry_request(),
            associated_peripheral_id: None,
            log_settings: LogSettings::default(),
        }
    }
}

fn default_service_uuid() -> String {
    "fff0".to_string()
}
fn default_write_uuid() -> String {
    "fff2".to_string()
}
fn default_notify_uuid() -> String {
    "fff1".to_string()
}
fn default_scan_seconds() -> u64 {
    3
}
fn default_settle_delay_ms() -> u64 {
    900
}
fn default_telemetry_request() -> String {
    "#100;".to_string()
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::default_settings_path()?;
        Ok(Self::at_path(settings_path))
    }

    /// Load from an explicit path, falling back to defaults when the file
    /// is absent or unreadable.
    pub fn at_path(settings_path: PathBuf) -> Self {
        let settings = Self::load_from_file(&settings_path).unwrap_or_default();
        Self {
            settings,
            settings_path,
        }
    }

    fn default_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("GeoTracker");
        fs::create_dir_all(&path)?;
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Remember the tracker for the direct-connect flow.
    pub fn set_associated_peripheral(&mut self, id: &str) -> anyhow::Result<()> {
        if self.settings.associated_peripheral_id.as_deref() != Some(id) {
            self.settings.associated_peripheral_id = Some(id.to_string());
            self.save()?;
        }
        Ok(())
    }
}
