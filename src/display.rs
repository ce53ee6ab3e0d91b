// File: display.rs
// Location: /src/display.rs

use anyhow::{Context, Result};
use gtk4::gdk;
use gtk4::prelude::*;
use std::process::ExitStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorInfo {
    pub connector: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub scale: i32,
    pub refresh_hz: f64,
}

impl MonitorInfo {
    pub fn from_gdk(monitor: &gdk::Monitor) -> Self {
        let geometry = monitor.geometry();
        Self {
            connector: monitor.connector().map(|s| s.to_string()),
            manufacturer: monitor.manufacturer().map(|s| s.to_string()),
            model: monitor.model().map(|s| s.to_string()),
            x: geometry.x(),
            y: geometry.y(),
            width: geometry.width(),
            height: geometry.height(),
            scale: monitor.scale_factor(),
            // GDK reports millihertz
            refresh_hz: monitor.refresh_rate() as f64 / 1000.0,
        }
    }

    pub fn label(&self) -> String {
        let parts: Vec<&str> = [self.manufacturer.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        if !parts.is_empty() {
            return parts.join(" ");
        }

        match self.connector.as_deref() {
            Some(connector) if !connector.is_empty() => connector.to_string(),
            _ => "Unknown Display".to_string(),
        }
    }

    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{} × {} @ {} Hz",
            self.width,
            self.height,
            format_refresh(self.refresh_hz)
        );
        if self.scale != 1 {
            summary.push_str(&format!(", scale {}", self.scale));
        }
        summary
    }

    pub fn position(&self) -> String {
        format!("{}, {}", self.x, self.y)
    }
}

fn format_refresh(hz: f64) -> String {
    let rounded = (hz * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{:.2}", rounded)
            .trim_end_matches('0')
            .to_string()
    }
}

pub fn monitors(display: &gdk::Display) -> Vec<MonitorInfo> {
    let list = display.monitors();
    (0..list.n_items())
        .filter_map(|i| list.item(i))
        .filter_map(|obj| obj.downcast::<gdk::Monitor>().ok())
        .map(|m| MonitorInfo::from_gdk(&m))
        .collect()
}

/// Runs the external configuration tool and waits for it to exit.
pub async fn run_tool(argv: &[String]) -> Result<ExitStatus> {
    let (program, args) = argv
        .split_first()
        .context("No display tool configured")?;

    log::info!("Launching display tool: {}", argv.join(" "));

    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("Failed to start {}", program))?;

    log::debug!("{} exited with {}", program, status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> MonitorInfo {
        MonitorInfo {
            connector: Some("eDP-1".to_string()),
            manufacturer: Some("BOE".to_string()),
            model: Some("0x095f".to_string()),
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
            scale: 1,
            refresh_hz: 60.0,
        }
    }

    #[test]
    fn test_label_prefers_manufacturer_and_model() {
        assert_eq!(monitor().label(), "BOE 0x095f");

        let connector_only = MonitorInfo {
            manufacturer: None,
            model: Some("  ".to_string()),
            ..monitor()
        };
        assert_eq!(connector_only.label(), "eDP-1");

        let anonymous = MonitorInfo {
            connector: None,
            manufacturer: None,
            model: None,
            ..monitor()
        };
        assert_eq!(anonymous.label(), "Unknown Display");
    }

    #[test]
    fn test_summary() {
        assert_eq!(monitor().summary(), "1920 × 1080 @ 60 Hz");

        let hidpi = MonitorInfo {
            width: 2560,
            height: 1600,
            scale: 2,
            refresh_hz: 59.951,
            ..monitor()
        };
        assert_eq!(hidpi.summary(), "2560 × 1600 @ 59.95 Hz, scale 2");

        let odd = MonitorInfo {
            refresh_hz: 74.5,
            ..monitor()
        };
        assert_eq!(odd.summary(), "1920 × 1080 @ 74.5 Hz");
    }

    #[test]
    fn test_run_tool_reports_exit_status() {
        let ok = tokio_test::block_on(run_tool(&["true".to_string()])).unwrap();
        assert!(ok.success());

        let failed = tokio_test::block_on(run_tool(&["false".to_string()])).unwrap();
        assert!(!failed.success());
    }

    #[test]
    fn test_run_tool_errors() {
        assert!(tokio_test::block_on(run_tool(&[])).is_err());
        assert!(tokio_test::block_on(run_tool(&["plenjos-no-such-tool".to_string()])).is_err());
    }
}
