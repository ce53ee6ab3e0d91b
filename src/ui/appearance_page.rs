// File: appearance_page.rs
// Location: /src/ui/appearance_page.rs

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::Cell;
use std::rc::Rc;

use plenjos_settings::gsettings::{self, ColorScheme};

use crate::ui::{icon_name, section_frame, show_toast};

pub struct AppearancePage {
    pub widget: adw::ToastOverlay,
    preview: gtk4::Picture,
    style_row: adw::ComboRow,
    background: Option<gio::Settings>,
    interface: Option<gio::Settings>,
    updating_style: Rc<Cell<bool>>,
}

impl AppearancePage {
    pub fn new() -> Self {
        let widget = adw::ToastOverlay::new();

        let background = gsettings::settings_if_available(gsettings::BACKGROUND_SCHEMA);
        let interface = gsettings::settings_if_available(gsettings::INTERFACE_SCHEMA);

        let preview = gtk4::Picture::builder()
            .content_fit(gtk4::ContentFit::Cover)
            .height_request(220)
            .can_shrink(true)
            .overflow(gtk4::Overflow::Hidden)
            .build();
        preview.add_css_class("background-preview");

        let preview_group = adw::PreferencesGroup::new();
        preview_group.add(&preview);

        let background_row = adw::ActionRow::builder()
            .title("Background")
            .subtitle("Choose an image for the desktop background")
            .activatable(true)
            .build();
        background_row.add_suffix(&gtk4::Image::from_icon_name(icon_name(
            "document-open-symbolic",
            &["folder-pictures-symbolic", "go-next-symbolic"][..],
        )));

        let style_row = adw::ComboRow::builder()
            .title("Style")
            .model(&gtk4::StringList::new(&ColorScheme::LABELS))
            .build();

        let group = adw::PreferencesGroup::builder()
            .title("Appearance")
            .build();
        group.add(&background_row);
        group.add(&style_row);

        let preferences = adw::PreferencesPage::new();
        preferences.add(&preview_group);
        preferences.add(&group);

        let (toolbar_view, _header) = section_frame(&preferences);
        widget.set_child(Some(&toolbar_view));

        if background.is_none() {
            background_row.set_sensitive(false);
            background_row.set_subtitle("Background settings are not installed");
        }
        if interface.is_none() {
            style_row.set_sensitive(false);
            style_row.set_subtitle("Interface settings are not installed");
        }

        let page = Self {
            widget,
            preview,
            style_row: style_row.clone(),
            background,
            interface,
            updating_style: Rc::new(Cell::new(false)),
        };

        page.sync_style_row();
        page.update_preview();

        let page_ref = page.clone_ref();
        background_row.connect_activated(move |_| {
            let page = page_ref.clone_ref();
            glib::spawn_future_local(async move {
                page.choose_background().await;
            });
        });

        let page_ref = page.clone_ref();
        style_row.connect_selected_notify(move |row| {
            if page_ref.updating_style.get() {
                return;
            }
            let Some(interface) = page_ref.interface.as_ref() else {
                return;
            };
            let scheme = ColorScheme::from_index(row.selected());
            log::info!("Style set to {}", scheme.as_str());
            if let Err(e) = scheme.write(interface) {
                log::error!("Failed to write style: {}", e);
                show_toast(&page_ref.widget, "Failed to change style");
            }
        });

        if let Some(background) = page.background.as_ref() {
            let page_ref = page.clone_ref();
            background.connect_changed(None, move |_, key| {
                log::debug!("Background key {} changed", key);
                page_ref.update_preview();
            });
        }

        if let Some(interface) = page.interface.as_ref() {
            let page_ref = page.clone_ref();
            interface.connect_changed(Some(gsettings::COLOR_SCHEME_KEY), move |_, _| {
                page_ref.sync_style_row();
                page_ref.update_preview();
            });
        }

        page
    }

    pub fn clone_ref(&self) -> Self {
        Self {
            widget: self.widget.clone(),
            preview: self.preview.clone(),
            style_row: self.style_row.clone(),
            background: self.background.clone(),
            interface: self.interface.clone(),
            updating_style: self.updating_style.clone(),
        }
    }

    fn color_scheme(&self) -> ColorScheme {
        self.interface
            .as_ref()
            .map(ColorScheme::read)
            .unwrap_or_default()
    }

    fn sync_style_row(&self) {
        self.updating_style.set(true);
        self.style_row.set_selected(self.color_scheme().index());
        self.updating_style.set(false);
    }

    fn update_preview(&self) {
        let Some(background) = self.background.as_ref() else {
            self.preview.set_paintable(None::<&gtk4::gdk::Paintable>);
            return;
        };

        let key = gsettings::background_key_for(self.color_scheme());
        let uri = background.string(key);

        match gsettings::picture_path_from_uri(&uri) {
            Some(path) => self.preview.set_filename(Some(&path)),
            None => {
                log::debug!("No local picture for {} ({})", key, uri);
                self.preview.set_paintable(None::<&gtk4::gdk::Paintable>);
            }
        }
    }

    async fn choose_background(&self) {
        let Some(background) = self.background.as_ref() else {
            return;
        };

        let filter = gtk4::FileFilter::new();
        filter.set_name(Some("Images"));
        filter.add_pixbuf_formats();

        let filters = gio::ListStore::new::<gtk4::FileFilter>();
        filters.append(&filter);

        let dialog = gtk4::FileDialog::builder()
            .title("Select Background")
            .modal(true)
            .filters(&filters)
            .default_filter(&filter)
            .build();

        let parent = self.widget.root().and_downcast::<gtk4::Window>();
        let file = match dialog.open_future(parent.as_ref()).await {
            Ok(file) => file,
            Err(e) => {
                log::debug!("Background selection cancelled: {}", e);
                return;
            }
        };

        let uri = file.uri();
        log::info!("Setting background to {}", uri);
        if let Err(e) = gsettings::set_background(background, &uri) {
            log::error!("Failed to set background: {}", e);
            show_toast(&self.widget, "Failed to change background");
        }
    }
}
