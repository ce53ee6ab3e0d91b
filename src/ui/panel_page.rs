// File: panel_page.rs
// Location: /src/ui/panel_page.rs

use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};

use plenjos_settings::gsettings::{self, ColorScheme};

use crate::ui::section_frame;

pub struct PanelPage {
    pub widget: adw::ToolbarView,
}

impl PanelPage {
    pub fn new() -> Self {
        let style_row = adw::ComboRow::builder()
            .title("Panel Style")
            .model(&gtk4::StringList::new(&ColorScheme::LABELS))
            .build();

        let group = adw::PreferencesGroup::builder()
            .title("Panel")
            .build();
        group.add(&style_row);

        match gsettings::settings_if_available(gsettings::PANEL_SCHEMA) {
            Some(settings) => {
                style_row.set_selected(ColorScheme::read(&settings).index());

                style_row.connect_selected_notify(move |row| {
                    let scheme = ColorScheme::from_index(row.selected());
                    log::info!("Panel style set to {}", scheme.as_str());
                    if let Err(e) = scheme.write(&settings) {
                        log::error!("Failed to write panel style: {}", e);
                    }
                });
            }
            None => {
                style_row.set_sensitive(false);
                style_row.set_subtitle("Panel settings are not installed");
            }
        }

        let preferences = adw::PreferencesPage::new();
        preferences.add(&group);

        let (widget, _header) = section_frame(&preferences);
        Self { widget }
    }
}
