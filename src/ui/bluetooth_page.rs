// File: bluetooth_page.rs
// Location: /src/ui/bluetooth_page.rs

use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

use plenjos_settings::bluez::{
    Adapter, BluetoothDevice, BluetoothSnapshot, BluezClient, DiscoveryState,
};

use crate::ui::{icon_name, section_frame, show_toast};

const REFRESH_SECONDS: u32 = 3;

pub struct BluetoothPage {
    pub widget: adw::ToastOverlay,
    content_stack: gtk4::Stack,
    power_row: adw::SwitchRow,
    devices_group: adw::PreferencesGroup,
    device_rows: Rc<RefCell<Vec<adw::ActionRow>>>,
    shown_devices: Rc<RefCell<Option<Vec<BluetoothDevice>>>>,
    client: Rc<RefCell<Option<BluezClient>>>,
    adapter: Rc<RefCell<Option<Adapter>>>,
    updating_switch: Rc<Cell<bool>>,
    busy: Rc<Cell<bool>>,
    discovery: Rc<Cell<DiscoveryState>>,
    refresh_source: Rc<RefCell<Option<glib::SourceId>>>,
}

impl BluetoothPage {
    pub fn new() -> Self {
        let widget = adw::ToastOverlay::new();

        let power_row = adw::SwitchRow::builder()
            .title("Bluetooth")
            .build();

        let power_group = adw::PreferencesGroup::new();
        power_group.add(&power_row);

        let devices_group = adw::PreferencesGroup::builder()
            .title("Devices")
            .build();

        let preferences = adw::PreferencesPage::new();
        preferences.add(&power_group);
        preferences.add(&devices_group);

        let no_adapter = adw::StatusPage::builder()
            .icon_name(icon_name(
                "bluetooth-disabled-symbolic",
                &["bluetooth-symbolic", "dialog-information-symbolic"][..],
            ))
            .title("No Bluetooth Adapter")
            .description("Connect a Bluetooth adapter to use Bluetooth devices")
            .build();

        let content_stack = gtk4::Stack::new();
        content_stack.add_named(&preferences, Some("devices"));
        content_stack.add_named(&no_adapter, Some("no-adapter"));

        let (toolbar_view, _header) = section_frame(&content_stack);
        widget.set_child(Some(&toolbar_view));

        let page = Self {
            widget,
            content_stack,
            power_row: power_row.clone(),
            devices_group,
            device_rows: Rc::new(RefCell::new(Vec::new())),
            shown_devices: Rc::new(RefCell::new(None)),
            client: Rc::new(RefCell::new(None)),
            adapter: Rc::new(RefCell::new(None)),
            updating_switch: Rc::new(Cell::new(false)),
            busy: Rc::new(Cell::new(false)),
            discovery: Rc::new(Cell::new(DiscoveryState::default())),
            refresh_source: Rc::new(RefCell::new(None)),
        };

        let page_ref = page.clone_ref();
        power_row.connect_active_notify(move |row| {
            if page_ref.updating_switch.get() {
                return;
            }
            let powered = row.is_active();
            let page = page_ref.clone_ref();
            glib::spawn_future_local(async move {
                page.set_powered(powered).await;
            });
        });

        let page_ref = page.clone_ref();
        page.widget.connect_map(move |_| {
            page_ref.start();
        });

        let page_ref = page.clone_ref();
        page.widget.connect_unmap(move |_| {
            page_ref.stop();
        });

        page
    }

    pub fn clone_ref(&self) -> Self {
        Self {
            widget: self.widget.clone(),
            content_stack: self.content_stack.clone(),
            power_row: self.power_row.clone(),
            devices_group: self.devices_group.clone(),
            device_rows: self.device_rows.clone(),
            shown_devices: self.shown_devices.clone(),
            client: self.client.clone(),
            adapter: self.adapter.clone(),
            updating_switch: self.updating_switch.clone(),
            busy: self.busy.clone(),
            discovery: self.discovery.clone(),
            refresh_source: self.refresh_source.clone(),
        }
    }

    fn start(&self) {
        let page = self.clone_ref();
        glib::spawn_future_local(async move {
            page.refresh().await;
        });

        if self.refresh_source.borrow().is_none() {
            let page = self.clone_ref();
            let source = glib::timeout_add_seconds_local(REFRESH_SECONDS, move || {
                let page = page.clone_ref();
                glib::spawn_future_local(async move {
                    page.refresh().await;
                });
                glib::ControlFlow::Continue
            });
            *self.refresh_source.borrow_mut() = Some(source);
        }
    }

    fn stop(&self) {
        if let Some(source) = self.refresh_source.borrow_mut().take() {
            source.remove();
        }

        let page = self.clone_ref();
        glib::spawn_future_local(async move {
            page.update_discovery(false).await;
        });
    }

    async fn client(&self) -> Option<BluezClient> {
        if let Some(client) = self.client.borrow().clone() {
            return Some(client);
        }

        match BluezClient::connect().await {
            Ok(client) => {
                *self.client.borrow_mut() = Some(client.clone());
                Some(client)
            }
            Err(e) => {
                log::error!("Failed to connect to BlueZ: {}", e);
                None
            }
        }
    }

    async fn snapshot(&self) -> Option<BluetoothSnapshot> {
        let client = self.client().await?;
        match client.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                log::debug!("Bluetooth unavailable: {}", e);
                None
            }
        }
    }

    async fn refresh(&self) {
        // Skip ticks while a pairing or connection is in flight.
        if self.busy.get() {
            return;
        }

        let snapshot = self.snapshot().await.unwrap_or_default();
        let Some(adapter) = snapshot.primary_adapter().cloned() else {
            self.adapter.borrow_mut().take();
            self.content_stack.set_visible_child_name("no-adapter");
            return;
        };

        self.content_stack.set_visible_child_name("devices");

        self.updating_switch.set(true);
        self.power_row.set_active(adapter.powered);
        self.updating_switch.set(false);

        let devices: Vec<BluetoothDevice> = if adapter.powered {
            snapshot.devices_of(&adapter.path).cloned().collect()
        } else {
            Vec::new()
        };
        self.devices_group.set_sensitive(adapter.powered);

        let mut discovery = self.discovery.get();
        discovery.sync(&adapter);
        self.discovery.set(discovery);

        let powered = adapter.powered;
        *self.adapter.borrow_mut() = Some(adapter);
        self.show_devices(devices);

        if powered && self.refresh_source.borrow().is_some() {
            self.update_discovery(true).await;
        }
    }

    fn show_devices(&self, devices: Vec<BluetoothDevice>) {
        if self.shown_devices.borrow().as_ref() == Some(&devices) {
            return;
        }
        *self.shown_devices.borrow_mut() = Some(devices.clone());

        for row in self.device_rows.borrow_mut().drain(..) {
            self.devices_group.remove(&row);
        }

        if devices.is_empty() {
            self.devices_group.set_description(Some("No devices found"));
        } else {
            self.devices_group.set_description(None);
        }

        for device in devices {
            let row = self.create_device_row(device);
            self.devices_group.add(&row);
            self.device_rows.borrow_mut().push(row);
        }
    }

    fn create_device_row(&self, device: BluetoothDevice) -> adw::ActionRow {
        let row = adw::ActionRow::builder()
            .title(device.name.as_str())
            .subtitle(device.status_label())
            .activatable(true)
            .use_markup(false)
            .build();

        let icon_name_owned = device.icon_name();
        row.add_prefix(&gtk4::Image::from_icon_name(icon_name(
            &icon_name_owned,
            &["bluetooth-active-symbolic", "bluetooth-symbolic"][..],
        )));

        if device.connected {
            let label = gtk4::Label::new(Some("Connected"));
            label.add_css_class("connected-indicator");
            row.add_suffix(&label);
        }

        if device.paired {
            let forget = gtk4::Button::builder()
                .icon_name("user-trash-symbolic")
                .tooltip_text("Forget")
                .valign(gtk4::Align::Center)
                .css_classes(vec!["flat".to_string(), "circular".to_string()])
                .build();

            let page = self.clone_ref();
            let device_for_forget = device.clone();
            forget.connect_clicked(move |_| {
                let page = page.clone_ref();
                let device = device_for_forget.clone();
                glib::spawn_future_local(async move {
                    page.forget(&device).await;
                });
            });
            row.add_suffix(&forget);
        }

        let page = self.clone_ref();
        row.connect_activated(move |_| {
            let page = page.clone_ref();
            let device = device.clone();
            glib::spawn_future_local(async move {
                page.activate_device(&device).await;
            });
        });

        row
    }

    async fn set_powered(&self, powered: bool) {
        let (Some(client), Some(adapter)) = (self.client().await, self.adapter.borrow().clone())
        else {
            return;
        };

        log::info!("Switching Bluetooth {}", if powered { "on" } else { "off" });
        if let Err(e) = client.set_powered(&adapter.path, powered).await {
            log::error!("{}", e);
            show_toast(&self.widget, "Failed to change Bluetooth power");
        }

        self.refresh().await;
    }

    async fn update_discovery(&self, discover: bool) {
        let Some(adapter) = self.adapter.borrow().clone() else {
            return;
        };
        let Some(discover) = self.discovery.get().transition(discover, &adapter) else {
            return;
        };
        let Some(client) = self.client().await else {
            return;
        };

        let result = if discover {
            client.start_discovery(&adapter.path).await
        } else {
            client.stop_discovery(&adapter.path).await
        };
        match result {
            Ok(()) => {
                let mut discovery = self.discovery.get();
                discovery.set_running(discover);
                self.discovery.set(discovery);
                log::debug!(
                    "Discovery {} on {}",
                    if discover { "started" } else { "stopped" },
                    adapter.path
                );
            }
            Err(e) => {
                // Powering off ends discovery too.
                if !discover {
                    self.discovery.set(DiscoveryState::default());
                }
                log::warn!("Failed to change discovery on {}: {}", adapter.path, e);
            }
        }
    }

    async fn activate_device(&self, device: &BluetoothDevice) {
        let Some(client) = self.client().await else {
            return;
        };

        self.busy.set(true);
        let (result, failure) = if device.connected {
            log::info!("Disconnecting {}", device.address);
            (client.disconnect_device(&device.path).await, "Failed to disconnect")
        } else if device.paired {
            log::info!("Connecting {}", device.address);
            show_toast(&self.widget, &format!("Connecting to {}…", device.name));
            (client.connect_device(&device.path).await, "Failed to connect")
        } else {
            log::info!("Setting up {}", device.address);
            show_toast(&self.widget, &format!("Setting up {}…", device.name));
            (client.pair_device(&device.path).await, "Failed to set up device")
        };
        self.busy.set(false);

        if let Err(e) = result {
            log::error!("{} {}: {}", failure, device.address, e);
            show_toast(&self.widget, &format!("{} {}", failure, device.name));
        }
        self.refresh().await;
    }

    async fn forget(&self, device: &BluetoothDevice) {
        let Some(client) = self.client().await else {
            return;
        };

        log::info!("Removing {}", device.address);
        if let Err(e) = client.remove_device(&device.adapter, &device.path).await {
            log::error!("Failed to remove {}: {}", device.address, e);
            show_toast(&self.widget, &format!("Failed to forget {}", device.name));
        }
        self.refresh().await;
    }
}
