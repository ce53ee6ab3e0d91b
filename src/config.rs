// File: config.rs
// Location: /src/config.rs

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_display_tool")]
    pub display_tool: String,
    #[serde(default = "default_wifi_rescan_seconds")]
    pub wifi_rescan_seconds: u32,
    #[serde(default)]
    pub last_page: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            display_tool: default_display_tool(),
            wifi_rescan_seconds: default_wifi_rescan_seconds(),
            last_page: None,
        }
    }
}

impl AppSettings {
    pub fn validate(&self) -> Result<()> {
        if self.display_tool.trim().is_empty() {
            anyhow::bail!("Display tool command must not be empty");
        }

        if self.wifi_rescan_seconds != 0 && !(5..=600).contains(&self.wifi_rescan_seconds) {
            anyhow::bail!("Wi-Fi rescan interval must be 0 (off) or 5-600 seconds");
        }

        Ok(())
    }

    /// Program and arguments of the external display tool.
    pub fn display_tool_argv(&self) -> Vec<String> {
        self.display_tool
            .split_whitespace()
            .map(str::to_string)
            .collect()
    }
}

fn default_display_tool() -> String {
    "arandr".to_string()
}

fn default_wifi_rescan_seconds() -> u32 {
    30
}

pub fn load_app_settings(path: &std::path::Path) -> Result<AppSettings> {
    let content = std::fs::read_to_string(path)?;
    let settings: AppSettings = serde_json::from_str(&content)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_app_settings(path: &std::path::Path, settings: &AppSettings) -> Result<()> {
    settings.validate()?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(path, json)?;

    Ok(())
}

/// Loads settings, falling back to defaults when the file is missing or invalid.
pub fn load_or_default(path: &std::path::Path) -> AppSettings {
    if !path.exists() {
        return AppSettings::default();
    }

    match load_app_settings(path) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Ignoring settings file {:?}: {}", path, e);
            AppSettings::default()
        }
    }
}

pub fn app_settings_path() -> PathBuf {
    std::env::var("HOME")
        .map(|home| PathBuf::from(home).join(".config/plenjos-settings/settings.json"))
        .unwrap_or_else(|_| PathBuf::from("/tmp/plenjos-settings-settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = AppSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.display_tool_argv(), vec!["arandr".to_string()]);
    }

    #[test]
    fn test_blank_display_tool_rejected() {
        let settings = AppSettings {
            display_tool: "   ".to_string(),
            ..AppSettings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_rescan_interval_bounds() {
        let mut settings = AppSettings::default();

        settings.wifi_rescan_seconds = 0;
        assert!(settings.validate().is_ok());

        settings.wifi_rescan_seconds = 3;
        assert!(settings.validate().is_err());

        settings.wifi_rescan_seconds = 601;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_display_tool_argv_splits_arguments() {
        let settings = AppSettings {
            display_tool: "  wdisplays --verbose  ".to_string(),
            ..AppSettings::default()
        };
        assert_eq!(
            settings.display_tool_argv(),
            vec!["wdisplays".to_string(), "--verbose".to_string()]
        );
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let settings: AppSettings = serde_json::from_str(r#"{"last_page":"Panel"}"#).unwrap();
        assert_eq!(settings.display_tool, "arandr");
        assert_eq!(settings.wifi_rescan_seconds, 30);
        assert_eq!(settings.last_page.as_deref(), Some("Panel"));
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/settings.json");
        let settings = AppSettings {
            display_tool: "wdisplays".to_string(),
            wifi_rescan_seconds: 0,
            last_page: Some("Displays".to_string()),
        };

        save_app_settings(&path, &settings).unwrap();
        assert_eq!(load_app_settings(&path).unwrap(), settings);
    }

    #[test]
    fn test_save_rejects_invalid_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = AppSettings {
            wifi_rescan_seconds: 1,
            ..AppSettings::default()
        };

        assert!(save_app_settings(&path, &settings).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_or_default_on_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(load_or_default(&path), AppSettings::default());
    }
}
