// File: mod.rs
// Location: /src/ui/mod.rs

use gtk4::prelude::*;
use libadwaita as adw;

pub mod appearance_page;
pub mod bluetooth_page;
pub mod display_page;
pub mod network_page;
pub mod panel_page;
pub mod wifi_dialog;
pub mod wifi_page;

pub fn icon_name<'a>(primary: &'a str, fallbacks: &'a [&'a str]) -> &'a str {
    let Some(display) = gtk4::gdk::Display::default() else {
        return primary;
    };
    let theme = gtk4::IconTheme::for_display(&display);

    if theme.has_icon(primary) {
        return primary;
    }

    for &name in fallbacks {
        if theme.has_icon(name) {
            return name;
        }
    }

    primary
}

pub fn show_toast(overlay: &adw::ToastOverlay, message: &str) {
    let toast = adw::Toast::new(message);
    toast.set_timeout(3);
    overlay.add_toast(toast);
}

/// Header bar plus content, the frame every section page uses.
pub fn section_frame(content: &impl IsA<gtk4::Widget>) -> (adw::ToolbarView, adw::HeaderBar) {
    let header = adw::HeaderBar::new();
    let toolbar_view = adw::ToolbarView::new();
    toolbar_view.add_top_bar(&header);
    toolbar_view.set_content(Some(content));
    (toolbar_view, header)
}
