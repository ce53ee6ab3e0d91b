// File: window.rs
// Location: /src/window.rs

use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::RefCell;
use std::rc::Rc;

use plenjos_settings::config::{self, AppSettings};

use crate::ui::{
    appearance_page::AppearancePage, bluetooth_page::BluetoothPage, display_page::DisplayPage,
    icon_name, network_page::NetworkPage, panel_page::PanelPage,
};

const DEFAULT_SECTION: &str = "Network";

struct Section {
    name: &'static str,
    title: &'static str,
    icon: &'static str,
}

const NETWORK: Section = Section {
    name: "Network",
    title: "Network",
    icon: "preferences-system-network",
};
const BLUETOOTH: Section = Section {
    name: "Bluetooth",
    title: "Bluetooth",
    icon: "bluetooth-active",
};
const DISPLAYS: Section = Section {
    name: "Displays",
    title: "Displays",
    icon: "preferences-desktop-display",
};
const APPEARANCE: Section = Section {
    name: "Appearance",
    title: "Appearance",
    icon: "preferences-desktop-theme",
};
const PANEL: Section = Section {
    name: "Panel",
    title: "Panel",
    icon: "preferences-desktop-panel",
};

const SECTIONS: [&Section; 5] = [&NETWORK, &BLUETOOTH, &DISPLAYS, &APPEARANCE, &PANEL];

fn section_title(name: &str) -> Option<&'static str> {
    SECTIONS.iter().find(|s| s.name == name).map(|s| s.title)
}

const STYLESHEET: &str = r#"
/* Sidebar */
#settings_stack_item {
    padding: 8px 10px;
    border-radius: 8px;
    transition: background 150ms ease;
}

#settings_stack_item:hover {
    background: alpha(currentColor, 0.06);
}

#settings_stack_item:selected {
    background: alpha(@accent_bg_color, 0.22);
}

#settings_stack_item:selected label {
    font-weight: 600;
}

#settings_stack_spacer {
    min-height: 18px;
}

/* Rows */
row {
    transition: background 200ms ease;
}

row:hover {
    background: alpha(currentColor, 0.03);
}

.network-row image.signal-indicator {
    margin-right: 8px;
}

/* Signal strength colors */
.signal-excellent {
    color: @success_color;
}

.signal-good {
    color: @accent_color;
}

.signal-fair {
    color: @warning_color;
}

.signal-weak {
    color: @error_color;
}

.connected-indicator {
    color: @success_color;
    font-weight: 600;
}

/* Appearance */
.background-preview {
    border-radius: 12px;
    background: alpha(currentColor, 0.05);
}

/* Buttons */
button.flat.circular {
    min-width: 32px;
    min-height: 32px;
    padding: 0;
}

.big-spinner {
    min-width: 24px;
    min-height: 24px;
}

toast {
    border-radius: 8px;
}

statuspage {
    padding: 32px;
}
"#;

pub struct SettingsWindow {
    pub window: adw::ApplicationWindow,
}

impl SettingsWindow {
    pub fn new(app: &adw::Application) -> Self {
        Self::load_css();

        let settings_path = config::app_settings_path();
        let settings = Rc::new(RefCell::new(config::load_or_default(&settings_path)));

        let split_view = adw::NavigationSplitView::new();
        split_view.set_min_sidebar_width(220.0);

        let stack = gtk4::Stack::builder()
            .transition_type(gtk4::StackTransitionType::Crossfade)
            .hhomogeneous(false)
            .vhomogeneous(false)
            .build();

        let items_box = gtk4::Box::new(gtk4::Orientation::Vertical, 2);
        items_box.add_css_class("settings-sidebar");
        items_box.set_margin_top(6);
        items_box.set_margin_bottom(6);
        items_box.set_margin_start(6);
        items_box.set_margin_end(6);

        let items: Rc<RefCell<Vec<(String, gtk4::Button)>>> = Rc::new(RefCell::new(Vec::new()));

        let network_page = NetworkPage::new(settings.clone());
        let bluetooth_page = BluetoothPage::new();
        let display_page = DisplayPage::new(settings.clone());
        let appearance_page = AppearancePage::new();
        let panel_page = PanelPage::new();

        let add_section = |section: &Section, widget: &gtk4::Widget| {
            stack.add_named(widget, Some(section.name));
            let item = Self::create_stack_item(&stack, &split_view, section);
            items_box.append(&item);
            items.borrow_mut().push((section.name.to_string(), item));
        };

        add_section(&NETWORK, network_page.widget.upcast_ref());
        add_section(&BLUETOOTH, bluetooth_page.widget.upcast_ref());
        items_box.append(&Self::create_stack_spacer());
        add_section(&DISPLAYS, display_page.widget.upcast_ref());
        add_section(&APPEARANCE, appearance_page.widget.upcast_ref());
        add_section(&PANEL, panel_page.widget.upcast_ref());

        // Sidebar
        let menu_button = gtk4::MenuButton::builder()
            .icon_name("open-menu-symbolic")
            .tooltip_text("Main Menu")
            .primary(true)
            .build();

        let menu = gio::Menu::new();
        menu.append(Some("About Settings"), Some("app.about"));
        menu_button.set_menu_model(Some(&menu));

        let sidebar_header = adw::HeaderBar::new();
        sidebar_header.pack_end(&menu_button);

        let sidebar_scrolled = gtk4::ScrolledWindow::builder()
            .hscrollbar_policy(gtk4::PolicyType::Never)
            .vexpand(true)
            .child(&items_box)
            .build();

        let sidebar_view = adw::ToolbarView::new();
        sidebar_view.add_top_bar(&sidebar_header);
        sidebar_view.set_content(Some(&sidebar_scrolled));

        let sidebar_page = adw::NavigationPage::builder()
            .title("Settings")
            .tag("sidebar")
            .child(&sidebar_view)
            .build();

        let content_page = adw::NavigationPage::builder()
            .title(DEFAULT_SECTION)
            .tag("content")
            .child(&stack)
            .build();

        split_view.set_sidebar(Some(&sidebar_page));
        split_view.set_content(Some(&content_page));

        // Selection highlight, page title and persistence follow the stack
        let items_ref = items.clone();
        let settings_ref = settings.clone();
        let content_page_ref = content_page.clone();
        stack.connect_visible_child_notify(move |stack| {
            let Some(visible) = stack.visible_child_name() else {
                return;
            };

            for (name, item) in items_ref.borrow().iter() {
                if name.as_str() == visible.as_str() {
                    item.set_state_flags(gtk4::StateFlags::SELECTED, false);
                } else {
                    item.unset_state_flags(gtk4::StateFlags::SELECTED);
                }
            }

            if let Some(title) = section_title(&visible) {
                content_page_ref.set_title(title);
            }

            let mut settings = settings_ref.borrow_mut();
            if settings.last_page.as_deref() != Some(visible.as_str()) {
                settings.last_page = Some(visible.to_string());
                if let Err(e) = config::save_app_settings(&config::app_settings_path(), &settings) {
                    log::warn!("Failed to remember last section: {}", e);
                }
            }
        });

        let initial = Self::initial_section(&settings.borrow());
        stack.set_visible_child_name(initial);
        if let Some((_, item)) = items.borrow().iter().find(|(name, _)| name == initial) {
            item.set_state_flags(gtk4::StateFlags::SELECTED, false);
        }
        if let Some(title) = section_title(initial) {
            content_page.set_title(title);
        }

        let window = adw::ApplicationWindow::builder()
            .application(app)
            .title("Settings")
            .icon_name("preferences-system")
            .default_width(960)
            .default_height(680)
            .width_request(360)
            .height_request(294)
            .content(&split_view)
            .build();

        match adw::BreakpointCondition::parse("max-width: 600sp") {
            Ok(condition) => {
                let breakpoint = adw::Breakpoint::new(condition);
                breakpoint.add_setter(&split_view, "collapsed", Some(&true.to_value()));
                window.add_breakpoint(breakpoint);
            }
            Err(e) => log::warn!("Invalid breakpoint condition: {}", e),
        }

        let about_action = gio::SimpleAction::new("about", None);
        let window_weak = window.downgrade();
        about_action.connect_activate(move |_, _| {
            if let Some(window) = window_weak.upgrade() {
                Self::show_about_dialog(&window);
            }
        });
        app.add_action(&about_action);

        Self { window }
    }

    fn initial_section(settings: &AppSettings) -> &'static str {
        settings
            .last_page
            .as_deref()
            .and_then(|name| SECTIONS.iter().find(|s| s.name == name))
            .map(|s| s.name)
            .unwrap_or(DEFAULT_SECTION)
    }

    fn create_stack_item(
        stack: &gtk4::Stack,
        split_view: &adw::NavigationSplitView,
        section: &Section,
    ) -> gtk4::Button {
        let symbolic = format!("{}-symbolic", section.icon);
        let icon = gtk4::Image::from_icon_name(icon_name(
            section.icon,
            &[symbolic.as_str(), "preferences-system"],
        ));
        icon.set_pixel_size(24);

        let label = gtk4::Label::builder()
            .label(section.title)
            .xalign(0.0)
            .hexpand(true)
            .build();

        let content = gtk4::Box::new(gtk4::Orientation::Horizontal, 12);
        content.append(&icon);
        content.append(&label);

        let button = gtk4::Button::builder()
            .child(&content)
            .css_classes(vec!["flat".to_string()])
            .build();
        button.set_widget_name("settings_stack_item");

        let name = section.name;
        let stack = stack.clone();
        let split_view = split_view.clone();
        button.connect_clicked(move |_| {
            stack.set_visible_child_name(name);
            split_view.set_show_content(true);
        });

        button
    }

    fn create_stack_spacer() -> gtk4::Box {
        let spacer = gtk4::Box::new(gtk4::Orientation::Vertical, 0);
        spacer.set_widget_name("settings_stack_spacer");
        spacer
    }

    fn show_about_dialog(window: &adw::ApplicationWindow) {
        let about = adw::AboutDialog::builder()
            .application_name("Settings")
            .application_icon("preferences-system")
            .developer_name("Plenjos")
            .version(env!("CARGO_PKG_VERSION"))
            .comments("System settings for the Plenjos desktop")
            .license_type(gtk4::License::Gpl30)
            .build();

        about.present(Some(window));
    }

    fn load_css() {
        let provider = gtk4::CssProvider::new();
        provider.load_from_data(STYLESHEET);

        gtk4::style_context_add_provider_for_display(
            &gtk4::gdk::Display::default().expect("Could not connect to display"),
            &provider,
            gtk4::STYLE_PROVIDER_PRIORITY_APPLICATION,
        );
    }

    pub fn present(&self) {
        self.window.present();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_section_restores_known_page() {
        let settings = AppSettings {
            last_page: Some("Panel".to_string()),
            ..AppSettings::default()
        };
        assert_eq!(SettingsWindow::initial_section(&settings), "Panel");
    }

    #[test]
    fn test_initial_section_falls_back() {
        let unknown = AppSettings {
            last_page: Some("Printers".to_string()),
            ..AppSettings::default()
        };
        assert_eq!(SettingsWindow::initial_section(&unknown), "Network");
        assert_eq!(SettingsWindow::initial_section(&AppSettings::default()), "Network");
    }

    #[test]
    fn test_section_titles() {
        assert_eq!(section_title("Displays"), Some("Displays"));
        assert_eq!(section_title("Spacer"), None);
    }

    #[test]
    fn test_stylesheet_keeps_focus_ring_and_used_classes() {
        assert!(!STYLESHEET.contains("outline: none"));
        for class in ["dim-subtitle", "action-pill", "destructive-action"] {
            assert!(!STYLESHEET.contains(class), "{} is not used by any widget", class);
        }
        assert!(STYLESHEET.contains("#settings_stack_item"));
    }
}
