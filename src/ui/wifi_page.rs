// File: wifi_page.rs
// Location: /src/ui/wifi_page.rs

use futures_util::StreamExt;
use gtk4::glib;
use gtk4::prelude::*;
use libadwaita::{self as adw, prelude::*};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use plenjos_settings::config::AppSettings;
use plenjos_settings::nm::{Device, NmClient};
use plenjos_settings::wifi::{
    plan_activation, ActivationPlan, ApChange, ApGroup, ApGroupKey, ApList, ConnectionSettings,
};

use crate::ui::{icon_name, show_toast, wifi_dialog};

#[derive(Clone)]
struct NetworkRow {
    row: adw::ActionRow,
    signal: gtk4::Image,
}

pub struct WifiPage {
    pub page: adw::NavigationPage,
    toast_overlay: adw::ToastOverlay,
    client: NmClient,
    device: Rc<Device>,
    settings: Rc<RefCell<AppSettings>>,
    list: gtk4::ListBox,
    empty_state: adw::StatusPage,
    spinner: gtk4::Spinner,
    refresh_button: gtk4::Button,
    aps: Rc<RefCell<ApList>>,
    rows: Rc<RefCell<HashMap<ApGroupKey, NetworkRow>>>,
    listener: Rc<RefCell<Option<glib::JoinHandle<()>>>>,
    rescan_source: Rc<RefCell<Option<glib::SourceId>>>,
}

impl WifiPage {
    pub fn new(
        client: NmClient,
        device: Device,
        settings: Rc<RefCell<AppSettings>>,
    ) -> Self {
        let toast_overlay = adw::ToastOverlay::new();

        let spinner = gtk4::Spinner::new();
        spinner.add_css_class("big-spinner");
        spinner.set_visible(false);

        let refresh_button = gtk4::Button::builder()
            .icon_name(icon_name(
                "view-refresh-symbolic",
                &["view-refresh", "reload-symbolic"][..],
            ))
            .tooltip_text("Search for networks")
            .build();

        let header = adw::HeaderBar::new();
        header.pack_end(&refresh_button);
        header.pack_end(&spinner);

        let scrolled = gtk4::ScrolledWindow::builder()
            .hscrollbar_policy(gtk4::PolicyType::Never)
            .vexpand(true)
            .build();

        let clamp = adw::Clamp::builder().maximum_size(720).build();

        let content = gtk4::Box::new(gtk4::Orientation::Vertical, 12);
        content.set_margin_top(24);
        content.set_margin_bottom(24);
        content.set_margin_start(12);
        content.set_margin_end(12);

        let networks_label = gtk4::Label::builder()
            .label("Visible Networks")
            .halign(gtk4::Align::Start)
            .build();
        networks_label.add_css_class("heading");

        let list = gtk4::ListBox::builder()
            .css_classes(vec!["boxed-list".to_string()])
            .selection_mode(gtk4::SelectionMode::None)
            .build();

        let empty_state = adw::StatusPage::builder()
            .icon_name(icon_name(
                "network-wireless-no-route-symbolic",
                &["network-wireless-offline-symbolic", "network-wireless-symbolic"][..],
            ))
            .title("No Networks Found")
            .description("Searching for Wi-Fi networks nearby")
            .build();
        empty_state.set_visible(false);

        content.append(&networks_label);
        content.append(&list);
        content.append(&empty_state);
        clamp.set_child(Some(&content));
        scrolled.set_child(Some(&clamp));
        toast_overlay.set_child(Some(&scrolled));

        let toolbar_view = adw::ToolbarView::new();
        toolbar_view.add_top_bar(&header);
        toolbar_view.set_content(Some(&toast_overlay));

        let page = adw::NavigationPage::builder()
            .title(device.title())
            .tag(device.path.as_str())
            .child(&toolbar_view)
            .build();

        let aps = Rc::new(RefCell::new(ApList::new()));
        let rows: Rc<RefCell<HashMap<ApGroupKey, NetworkRow>>> =
            Rc::new(RefCell::new(HashMap::new()));

        // Strongest network first
        let aps_sort = aps.clone();
        let rows_sort = rows.clone();
        list.set_sort_func(move |a, b| {
            let strength = |row: &gtk4::ListBoxRow| {
                rows_sort
                    .borrow()
                    .iter()
                    .find(|(_, r)| r.row.upcast_ref::<gtk4::ListBoxRow>() == row)
                    .and_then(|(key, _)| aps_sort.borrow().get(key).map(ApGroup::strength))
                    .unwrap_or(0)
            };
            strength(b).cmp(&strength(a)).into()
        });

        let wifi_page = Self {
            page,
            toast_overlay,
            client,
            device: Rc::new(device),
            settings,
            list,
            empty_state,
            spinner,
            refresh_button: refresh_button.clone(),
            aps,
            rows,
            listener: Rc::new(RefCell::new(None)),
            rescan_source: Rc::new(RefCell::new(None)),
        };

        let page_ref = wifi_page.clone_ref();
        refresh_button.connect_clicked(move |_| {
            let page = page_ref.clone_ref();
            glib::spawn_future_local(async move {
                page.rescan().await;
            });
        });

        let page_ref = wifi_page.clone_ref();
        wifi_page.page.connect_map(move |_| {
            page_ref.start();
        });

        let page_ref = wifi_page.clone_ref();
        wifi_page.page.connect_unmap(move |_| {
            page_ref.stop();
        });

        wifi_page
    }

    pub fn clone_ref(&self) -> Self {
        Self {
            page: self.page.clone(),
            toast_overlay: self.toast_overlay.clone(),
            client: self.client.clone(),
            device: self.device.clone(),
            settings: self.settings.clone(),
            list: self.list.clone(),
            empty_state: self.empty_state.clone(),
            spinner: self.spinner.clone(),
            refresh_button: self.refresh_button.clone(),
            aps: self.aps.clone(),
            rows: self.rows.clone(),
            listener: self.listener.clone(),
            rescan_source: self.rescan_source.clone(),
        }
    }

    fn start(&self) {
        log::debug!("Wi-Fi page for {} mapped", self.device.interface);

        let page = self.clone_ref();
        glib::spawn_future_local(async move {
            page.rescan().await;
        });

        self.start_listening();

        let interval = self.settings.borrow().wifi_rescan_seconds;
        if interval > 0 && self.rescan_source.borrow().is_none() {
            let page = self.clone_ref();
            let source = glib::timeout_add_seconds_local(interval, move || {
                let page = page.clone_ref();
                glib::spawn_future_local(async move {
                    page.rescan().await;
                });
                glib::ControlFlow::Continue
            });
            *self.rescan_source.borrow_mut() = Some(source);
        }
    }

    fn stop(&self) {
        if let Some(handle) = self.listener.borrow_mut().take() {
            handle.abort();
        }
        if let Some(source) = self.rescan_source.borrow_mut().take() {
            source.remove();
        }
    }

    fn start_listening(&self) {
        if self.listener.borrow().is_some() {
            return;
        }

        let page = self.clone_ref();
        let handle = glib::spawn_future_local(async move {
            let wireless = match page.client.wireless(&page.device.path).await {
                Ok(proxy) => proxy,
                Err(e) => {
                    log::warn!("Cannot watch access points on {}: {}", page.device.interface, e);
                    return;
                }
            };

            let mut added = match wireless.receive_access_point_added().await {
                Ok(stream) => stream,
                Err(e) => {
                    log::warn!("Failed to subscribe to AccessPointAdded: {}", e);
                    return;
                }
            };
            let mut removed = match wireless.receive_access_point_removed().await {
                Ok(stream) => stream,
                Err(e) => {
                    log::warn!("Failed to subscribe to AccessPointRemoved: {}", e);
                    return;
                }
            };

            loop {
                tokio::select! {
                    Some(signal) = added.next() => {
                        if let Ok(args) = signal.args() {
                            let path = args.access_point().to_string();
                            page.on_access_point_added(&path).await;
                        }
                    }
                    Some(signal) = removed.next() => {
                        if let Ok(args) = signal.args() {
                            let path = args.access_point().to_string();
                            page.on_access_point_removed(&path);
                        }
                    }
                    else => break,
                }
            }
        });

        *self.listener.borrow_mut() = Some(handle);
    }

    async fn on_access_point_added(&self, path: &str) {
        match self.client.access_point(path).await {
            Ok(ap) => {
                log::debug!("Access point added: {} ({})", ap.display_ssid(), path);
                let change = self.aps.borrow_mut().add(ap);
                self.apply_change(change);
            }
            Err(e) => log::debug!("Ignoring access point {}: {}", path, e),
        }
    }

    fn on_access_point_removed(&self, path: &str) {
        log::debug!("Access point removed: {}", path);
        let change = self.aps.borrow_mut().remove(path);
        if let Some(change) = change {
            self.apply_change(change);
        }
    }

    async fn rescan(&self) {
        self.spinner.set_visible(true);
        self.spinner.start();
        self.refresh_button.set_sensitive(false);

        // NetworkManager rejects scans that come too soon after the last one.
        if let Err(e) = self.client.request_scan(&self.device.path).await {
            log::debug!("{}", e);
        }
        self.reload().await;

        self.spinner.stop();
        self.spinner.set_visible(false);
        self.refresh_button.set_sensitive(true);
    }

    /// Reconciles the list with the access points NetworkManager reports now.
    async fn reload(&self) {
        let access_points = match self.client.access_points(&self.device.path).await {
            Ok(aps) => aps,
            Err(e) => {
                log::error!("Failed to list access points on {}: {}", self.device.interface, e);
                show_toast(&self.toast_overlay, "Failed to list Wi-Fi networks");
                return;
            }
        };

        let current: HashSet<&str> = access_points.iter().map(|ap| ap.path.as_str()).collect();
        let stale: Vec<String> = self
            .aps
            .borrow()
            .paths()
            .filter(|path| !current.contains(path))
            .map(str::to_string)
            .collect();

        for path in stale {
            self.on_access_point_removed(&path);
        }

        for ap in access_points {
            let change = self.aps.borrow_mut().add(ap);
            self.apply_change(change);
        }
    }

    fn apply_change(&self, change: ApChange) {
        match change {
            ApChange::Ignored => {}
            ApChange::Moved { from, to } => {
                self.apply_change(*from);
                self.apply_change(*to);
                return;
            }
            ApChange::Inserted(key) => {
                let network_row = self.create_row(&key);
                let row = network_row.row.clone();
                self.rows.borrow_mut().insert(key, network_row);
                self.list.append(&row);
            }
            ApChange::Merged(key) | ApChange::Updated(key) => {
                let row = self.rows.borrow().get(&key).cloned();
                if let Some(row) = row {
                    self.update_row(&row, &key);
                }
            }
            ApChange::Removed(key) => {
                let removed = self.rows.borrow_mut().remove(&key);
                if let Some(network_row) = removed {
                    self.list.remove(&network_row.row);
                }
            }
        }

        self.list.invalidate_sort();
        let empty = self.rows.borrow().is_empty();
        self.list.set_visible(!empty);
        self.empty_state.set_visible(empty);
    }

    fn create_row(&self, key: &ApGroupKey) -> NetworkRow {
        let row = adw::ActionRow::builder()
            .activatable(true)
            .use_markup(false)
            .build();
        row.add_css_class("network-row");

        let signal = gtk4::Image::new();
        signal.add_css_class("signal-indicator");
        row.add_prefix(&signal);

        if key.security.is_secured() {
            let lock = gtk4::Image::from_icon_name(icon_name(
                "network-wireless-encrypted-symbolic",
                &["changes-prevent-symbolic", "system-lock-screen-symbolic"][..],
            ));
            lock.set_tooltip_text(Some(key.security.label()));
            row.add_suffix(&lock);
        }

        let page = self.clone_ref();
        let key_for_activate = key.clone();
        row.connect_activated(move |_| {
            let page = page.clone_ref();
            let key = key_for_activate.clone();
            glib::spawn_future_local(async move {
                page.connect_to(&key).await;
            });
        });

        let network_row = NetworkRow { row, signal };
        self.update_row(&network_row, key);
        network_row
    }

    fn update_row(&self, network_row: &NetworkRow, key: &ApGroupKey) {
        let aps = self.aps.borrow();
        let Some(group) = aps.get(key) else {
            return;
        };
        let ap = group.representative();

        let row = &network_row.row;
        row.set_title(&ap.display_ssid());

        let mut subtitle = format!(
            "{} • {}% • {}",
            key.security.label(),
            group.strength(),
            ap.band()
        );
        if group.len() > 1 {
            subtitle.push_str(&format!(" • {} access points", group.len()));
        }
        row.set_subtitle(&subtitle);

        let signal = &network_row.signal;
        signal.set_icon_name(Some(icon_name(
            get_signal_icon(group.strength()),
            &["network-wireless-symbolic"][..],
        )));
        for class in ["signal-excellent", "signal-good", "signal-fair", "signal-weak"] {
            signal.remove_css_class(class);
        }
        signal.add_css_class(get_signal_class(group.strength()));
    }

    async fn connect_to(&self, key: &ApGroupKey) {
        let ap = {
            let aps = self.aps.borrow();
            match aps.get(key) {
                Some(group) => group.representative().clone(),
                None => return,
            }
        };
        let ssid = ap.display_ssid();
        let candidate = ConnectionSettings::for_access_point(&ap);

        let saved = match self.client.saved_connections().await {
            Ok(saved) => saved,
            Err(e) => {
                log::warn!("Failed to read saved connections: {}", e);
                Vec::new()
            }
        };

        match plan_activation(&candidate, &saved) {
            ActivationPlan::ActivateExisting { connection_path } => {
                log::info!("Activating saved profile {} for {}", connection_path, ssid);
                match self
                    .client
                    .activate_connection(&connection_path, &self.device.path, Some(&ap.path))
                    .await
                {
                    Ok(_) => show_toast(&self.toast_overlay, &format!("Connecting to {}…", ssid)),
                    Err(e) => self.report_failure("Failed to activate connection", &e),
                }
            }
            ActivationPlan::AddAndActivate(mut settings) => {
                let security = ap.security();
                if security.is_secured() {
                    match wifi_dialog::request_credentials(&self.page, &ssid, security).await {
                        Some(credentials) => settings.apply_credentials(credentials),
                        None => {
                            log::debug!("Connection to {} cancelled", ssid);
                            return;
                        }
                    }
                }

                log::info!("Adding new connection for {}", ssid);
                match self
                    .client
                    .add_and_activate_connection(&settings, &self.device.path, Some(&ap.path))
                    .await
                {
                    Ok(_) => show_toast(&self.toast_overlay, &format!("Connecting to {}…", ssid)),
                    Err(e) => self.report_failure("Failed to add new connection", &e),
                }
            }
        }
    }

    fn report_failure(&self, text: &str, error: &anyhow::Error) {
        log::error!("Connection failure. {}. {}.", text, error);
        show_toast(&self.toast_overlay, &format!("{}: {}", text, error));
    }
}

fn get_signal_icon(signal: u8) -> &'static str {
    if signal >= 75 {
        "network-wireless-signal-excellent-symbolic"
    } else if signal >= 50 {
        "network-wireless-signal-good-symbolic"
    } else if signal >= 25 {
        "network-wireless-signal-ok-symbolic"
    } else {
        "network-wireless-signal-weak-symbolic"
    }
}

fn get_signal_class(signal: u8) -> &'static str {
    if signal >= 75 {
        "signal-excellent"
    } else if signal >= 50 {
        "signal-good"
    } else if signal >= 25 {
        "signal-fair"
    } else {
        "signal-weak"
    }
}
