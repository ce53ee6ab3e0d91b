// File: network_page.rs
// Location: /src/ui/network_page.rs

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::RefCell;
use std::rc::Rc;

use plenjos_settings::config::AppSettings;
use plenjos_settings::nm::{Device, DeviceType, NmClient};

use crate::ui::{icon_name, show_toast, wifi_page::WifiPage};

pub struct NetworkPage {
    pub widget: adw::ToastOverlay,
    navigation: adw::NavigationView,
    content_stack: gtk4::Stack,
    interfaces_group: adw::PreferencesGroup,
    refresh_button: gtk4::Button,
    rows: Rc<RefCell<Vec<adw::ActionRow>>>,
    client: Rc<RefCell<Option<NmClient>>>,
    settings: Rc<RefCell<AppSettings>>,
}

impl NetworkPage {
    pub fn new(settings: Rc<RefCell<AppSettings>>) -> Self {
        let widget = adw::ToastOverlay::new();
        let navigation = adw::NavigationView::new();

        let refresh_button = gtk4::Button::builder()
            .icon_name(icon_name(
                "view-refresh-symbolic",
                &["view-refresh", "reload-symbolic"][..],
            ))
            .tooltip_text("Refresh interfaces")
            .build();

        let header = adw::HeaderBar::new();
        header.pack_end(&refresh_button);

        let interfaces_group = adw::PreferencesGroup::builder()
            .title("Interfaces")
            .build();

        let preferences = adw::PreferencesPage::new();
        preferences.add(&interfaces_group);

        let unavailable = adw::StatusPage::builder()
            .icon_name(icon_name(
                "network-error-symbolic",
                &["network-offline-symbolic", "dialog-error-symbolic"][..],
            ))
            .title("Network Unavailable")
            .description("NetworkManager is not running")
            .build();

        let content_stack = gtk4::Stack::new();
        content_stack.add_named(&preferences, Some("interfaces"));
        content_stack.add_named(&unavailable, Some("unavailable"));

        let toolbar_view = adw::ToolbarView::new();
        toolbar_view.add_top_bar(&header);
        toolbar_view.set_content(Some(&content_stack));

        let root = adw::NavigationPage::builder()
            .title("Network")
            .tag("network")
            .child(&toolbar_view)
            .build();
        navigation.add(&root);
        widget.set_child(Some(&navigation));

        let page = Self {
            widget,
            navigation,
            content_stack,
            interfaces_group,
            refresh_button: refresh_button.clone(),
            rows: Rc::new(RefCell::new(Vec::new())),
            client: Rc::new(RefCell::new(None)),
            settings,
        };

        let page_ref = page.clone_ref();
        refresh_button.connect_clicked(move |_| {
            let page = page_ref.clone_ref();
            glib::spawn_future_local(async move {
                page.refresh_devices().await;
            });
        });

        let page_ref = page.clone_ref();
        glib::spawn_future_local(async move {
            page_ref.refresh_devices().await;
        });

        page
    }

    pub fn clone_ref(&self) -> Self {
        Self {
            widget: self.widget.clone(),
            navigation: self.navigation.clone(),
            content_stack: self.content_stack.clone(),
            interfaces_group: self.interfaces_group.clone(),
            refresh_button: self.refresh_button.clone(),
            rows: self.rows.clone(),
            client: self.client.clone(),
            settings: self.settings.clone(),
        }
    }

    async fn client(&self) -> Option<NmClient> {
        if let Some(client) = self.client.borrow().clone() {
            return Some(client);
        }

        match NmClient::connect().await {
            Ok(client) => {
                match client.version().await {
                    Ok(version) => log::info!("NetworkManager {}", version),
                    Err(e) => {
                        log::error!("NetworkManager is not reachable: {}", e);
                        return None;
                    }
                }
                *self.client.borrow_mut() = Some(client.clone());
                Some(client)
            }
            Err(e) => {
                log::error!("Failed to connect to NetworkManager: {}", e);
                None
            }
        }
    }

    async fn refresh_devices(&self) {
        self.refresh_button.set_sensitive(false);

        let Some(client) = self.client().await else {
            self.content_stack.set_visible_child_name("unavailable");
            self.refresh_button.set_sensitive(true);
            return;
        };

        match client.devices().await {
            Ok(devices) => {
                self.content_stack.set_visible_child_name("interfaces");
                self.show_devices(&client, devices);
            }
            Err(e) => {
                log::error!("Failed to enumerate devices: {}", e);
                show_toast(&self.widget, "Failed to list network interfaces");
                // The bus connection may be stale; reconnect next time.
                self.client.borrow_mut().take();
            }
        }

        self.refresh_button.set_sensitive(true);
    }

    fn show_devices(&self, client: &NmClient, devices: Vec<Device>) {
        for row in self.rows.borrow_mut().drain(..) {
            self.interfaces_group.remove(&row);
        }

        for device in devices
            .into_iter()
            .filter(|d| d.device_type != DeviceType::Loopback)
        {
            log::debug!("Interface {} ({:?})", device.interface, device.device_type);
            let row = self.create_device_row(client, device);
            self.interfaces_group.add(&row);
            self.rows.borrow_mut().push(row);
        }

        if self.rows.borrow().is_empty() {
            self.interfaces_group
                .set_description(Some("No network interfaces found"));
        } else {
            self.interfaces_group.set_description(None);
        }
    }

    fn create_device_row(&self, client: &NmClient, device: Device) -> adw::ActionRow {
        let row = adw::ActionRow::builder()
            .title(device.title())
            .subtitle(device.state.label())
            .activatable(true)
            .use_markup(false)
            .build();

        row.add_prefix(&gtk4::Image::from_icon_name(icon_name(
            device.device_type.icon_name(),
            &["network-wired-symbolic", "network-workgroup-symbolic"][..],
        )));
        row.add_suffix(&gtk4::Image::from_icon_name("go-next-symbolic"));

        let page = self.clone_ref();
        let client = client.clone();
        row.connect_activated(move |_| {
            page.open_device(&client, device.clone());
        });

        row
    }

    fn open_device(&self, client: &NmClient, device: Device) {
        if self.navigation.find_page(&device.path).is_some() {
            self.navigation.push_by_tag(&device.path);
            return;
        }

        let page = match device.device_type {
            DeviceType::Wifi => {
                WifiPage::new(client.clone(), device, self.settings.clone()).page
            }
            _ => device_details_page(&device),
        };
        self.navigation.push(&page);
    }
}

fn device_details_page(device: &Device) -> adw::NavigationPage {
    let group = adw::PreferencesGroup::new();

    let rows = [
        ("Interface", Some(device.interface.clone())),
        ("Type", Some(device.description().to_string())),
        ("State", Some(device.state.label().to_string())),
        ("Driver", device.driver.clone()),
        ("Hardware Address", device.hw_address.clone()),
    ];

    for (title, value) in rows {
        let row = adw::ActionRow::builder()
            .title(title)
            .subtitle(value.as_deref().unwrap_or("Unknown"))
            .subtitle_selectable(true)
            .use_markup(false)
            .build();
        row.add_css_class("property");
        group.add(&row);
    }

    let preferences = adw::PreferencesPage::new();
    preferences.add(&group);

    let toolbar_view = adw::ToolbarView::new();
    toolbar_view.add_top_bar(&adw::HeaderBar::new());
    toolbar_view.set_content(Some(&preferences));

    adw::NavigationPage::builder()
        .title(device.title())
        .tag(device.path.as_str())
        .child(&toolbar_view)
        .build()
}
