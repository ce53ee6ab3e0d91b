// File: main.rs
// Location: /src/main.rs

use chrono::Local;
use gtk4::prelude::*;
use libadwaita as adw;
use std::fs::OpenOptions;
use std::io::Write;

mod ui;
mod window;

use window::SettingsWindow;

const APP_ID: &str = "com.plenjos.Settings";

fn setup_logging() {
    let log_path = std::env::var("HOME")
        .map(|home| std::path::PathBuf::from(home).join(".local/share/plenjos-settings"))
        .unwrap_or_else(|_| std::path::PathBuf::from("/tmp"));

    let _ = std::fs::create_dir_all(&log_path);
    let log_file_path = log_path.join("plenjos-settings.log");

    env_logger::Builder::new()
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init()
        .ok();

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file_path)
    {
        let now = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(file, "\n[{}] [INFO] ========== Plenjos Settings Started ==========", now);
        let _ = writeln!(file, "[{}] [DEBUG] Log file: {:?}", now, log_file_path);
    }
}

fn main() -> glib::ExitCode {
    setup_logging();
    log::info!("Application starting...");

    let rt = tokio::runtime::Runtime::new().expect("Failed to create Tokio runtime");
    let _guard = rt.enter();

    let app = adw::Application::builder()
        .application_id(APP_ID)
        .build();

    app.connect_activate(build_ui);
    app.run()
}

fn build_ui(app: &adw::Application) {
    if let Some(window) = app.active_window() {
        log::debug!("Presenting existing window");
        window.present();
        return;
    }

    log::info!("Building UI...");
    let window = SettingsWindow::new(app);
    window.present();
    log::info!("UI built and window presented");
}
