// File: display_page.rs
// Location: /src/ui/display_page.rs

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::RefCell;
use std::rc::Rc;

use plenjos_settings::config::AppSettings;
use plenjos_settings::display::{self, MonitorInfo};

use crate::ui::{icon_name, section_frame, show_toast};

pub struct DisplayPage {
    pub widget: adw::ToastOverlay,
    monitors_group: adw::PreferencesGroup,
    monitor_rows: Rc<RefCell<Vec<adw::ActionRow>>>,
    configure_button: gtk4::Button,
    settings: Rc<RefCell<AppSettings>>,
}

impl DisplayPage {
    pub fn new(settings: Rc<RefCell<AppSettings>>) -> Self {
        let widget = adw::ToastOverlay::new();

        let monitors_group = adw::PreferencesGroup::builder()
            .title("Monitors")
            .build();

        let configure_button = gtk4::Button::builder()
            .label("Open Display Configuration")
            .halign(gtk4::Align::Center)
            .css_classes(vec!["pill".to_string(), "suggested-action".to_string()])
            .build();

        let tool_group = adw::PreferencesGroup::builder()
            .description("Arrange monitors, resolution and refresh rate in the display tool")
            .build();
        tool_group.add(&configure_button);

        let preferences = adw::PreferencesPage::new();
        preferences.add(&monitors_group);
        preferences.add(&tool_group);

        let (toolbar_view, _header) = section_frame(&preferences);
        widget.set_child(Some(&toolbar_view));

        let page = Self {
            widget,
            monitors_group,
            monitor_rows: Rc::new(RefCell::new(Vec::new())),
            configure_button: configure_button.clone(),
            settings,
        };

        let page_ref = page.clone_ref();
        configure_button.connect_clicked(move |_| {
            let page = page_ref.clone_ref();
            glib::spawn_future_local(async move {
                page.open_tool().await;
            });
        });

        if let Some(display) = gtk4::gdk::Display::default() {
            let page_ref = page.clone_ref();
            display.monitors().connect_items_changed(move |_, _, _, _| {
                page_ref.refresh_monitors();
            });
        }
        page.refresh_monitors();

        page
    }

    pub fn clone_ref(&self) -> Self {
        Self {
            widget: self.widget.clone(),
            monitors_group: self.monitors_group.clone(),
            monitor_rows: self.monitor_rows.clone(),
            configure_button: self.configure_button.clone(),
            settings: self.settings.clone(),
        }
    }

    fn refresh_monitors(&self) {
        for row in self.monitor_rows.borrow_mut().drain(..) {
            self.monitors_group.remove(&row);
        }

        let monitors = gtk4::gdk::Display::default()
            .map(|display| display::monitors(&display))
            .unwrap_or_default();

        log::debug!("{} monitor(s) connected", monitors.len());

        if monitors.is_empty() {
            self.monitors_group
                .set_description(Some("No monitors reported by the display server"));
        } else {
            self.monitors_group.set_description(None);
        }

        for monitor in &monitors {
            let row = monitor_row(monitor);
            self.monitors_group.add(&row);
            self.monitor_rows.borrow_mut().push(row);
        }
    }

    async fn open_tool(&self) {
        let argv = self.settings.borrow().display_tool_argv();

        self.configure_button.set_sensitive(false);
        match display::run_tool(&argv).await {
            Ok(status) if status.success() => {}
            Ok(status) => {
                log::warn!("Display tool exited with {}", status);
                show_toast(&self.widget, "Display configuration tool reported an error");
            }
            Err(e) => {
                log::error!("{:#}", e);
                show_toast(
                    &self.widget,
                    &format!("Could not start {}", argv.first().map(String::as_str).unwrap_or("display tool")),
                );
            }
        }
        self.configure_button.set_sensitive(true);

        self.refresh_monitors();
    }
}

fn monitor_row(monitor: &MonitorInfo) -> adw::ActionRow {
    let row = adw::ActionRow::builder()
        .title(monitor.label())
        .subtitle(monitor.summary())
        .use_markup(false)
        .build();

    row.add_prefix(&gtk4::Image::from_icon_name(icon_name(
        "video-display-symbolic",
        &["preferences-desktop-display-symbolic", "computer-symbolic"][..],
    )));

    if let Some(connector) = monitor.connector.as_deref() {
        let label = gtk4::Label::new(Some(connector));
        label.add_css_class("dim-label");
        label.set_tooltip_text(Some(&format!("Position {}", monitor.position())));
        row.add_suffix(&label);
    }

    row
}
