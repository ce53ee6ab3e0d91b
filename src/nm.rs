// File: nm.rs
// Location: /src/nm.rs

use anyhow::{Context, Result};
use std::collections::HashMap;
use zbus::{proxy, Connection};
use zvariant::{ObjectPath, OwnedObjectPath, Value};

use crate::wifi::{AccessPoint, ApMode, ConnectionSettings, DbusSettings, SavedConnection};

#[proxy(
    interface = "org.freedesktop.NetworkManager",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager"
)]
trait NetworkManager {
    fn get_devices(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn activate_connection(
        &self,
        connection: &ObjectPath<'_>,
        device: &ObjectPath<'_>,
        specific_object: &ObjectPath<'_>,
    ) -> zbus::Result<OwnedObjectPath>;

    fn add_and_activate_connection(
        &self,
        connection: HashMap<&str, HashMap<&str, Value<'_>>>,
        device: &ObjectPath<'_>,
        specific_object: &ObjectPath<'_>,
    ) -> zbus::Result<(OwnedObjectPath, OwnedObjectPath)>;

    #[zbus(property)]
    fn version(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Device",
    default_service = "org.freedesktop.NetworkManager"
)]
trait NMDevice {
    #[zbus(property)]
    fn interface(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn device_type(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn state(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn driver(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn hw_address(&self) -> zbus::Result<String>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Device.Wireless",
    default_service = "org.freedesktop.NetworkManager"
)]
pub trait NMWireless {
    fn get_all_access_points(&self) -> zbus::Result<Vec<OwnedObjectPath>>;

    fn request_scan(&self, options: HashMap<&str, Value<'_>>) -> zbus::Result<()>;

    #[zbus(signal)]
    fn access_point_added(&self, access_point: ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(signal)]
    fn access_point_removed(&self, access_point: ObjectPath<'_>) -> zbus::Result<()>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.AccessPoint",
    default_service = "org.freedesktop.NetworkManager"
)]
trait NMAccessPoint {
    #[zbus(property)]
    fn ssid(&self) -> zbus::Result<Vec<u8>>;

    #[zbus(property)]
    fn strength(&self) -> zbus::Result<u8>;

    #[zbus(property)]
    fn hw_address(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn mode(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn flags(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn wpa_flags(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn rsn_flags(&self) -> zbus::Result<u32>;

    #[zbus(property)]
    fn frequency(&self) -> zbus::Result<u32>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings",
    default_service = "org.freedesktop.NetworkManager",
    default_path = "/org/freedesktop/NetworkManager/Settings"
)]
trait NMSettings {
    fn list_connections(&self) -> zbus::Result<Vec<OwnedObjectPath>>;
}

#[proxy(
    interface = "org.freedesktop.NetworkManager.Settings.Connection",
    default_service = "org.freedesktop.NetworkManager"
)]
trait NMSettingsConnection {
    fn get_settings(&self) -> zbus::Result<DbusSettings>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Ethernet,
    Wifi,
    Bluetooth,
    Modem,
    Bond,
    Vlan,
    Bridge,
    Tun,
    Veth,
    WireGuard,
    Loopback,
    Other(u32),
}

impl From<u32> for DeviceType {
    fn from(value: u32) -> Self {
        match value {
            1 => DeviceType::Ethernet,
            2 => DeviceType::Wifi,
            5 => DeviceType::Bluetooth,
            8 => DeviceType::Modem,
            10 => DeviceType::Bond,
            11 => DeviceType::Vlan,
            13 => DeviceType::Bridge,
            16 => DeviceType::Tun,
            20 => DeviceType::Veth,
            29 => DeviceType::WireGuard,
            32 => DeviceType::Loopback,
            other => DeviceType::Other(other),
        }
    }
}

impl DeviceType {
    pub fn label(self) -> &'static str {
        match self {
            DeviceType::Ethernet => "Ethernet",
            DeviceType::Wifi => "Wi-Fi",
            DeviceType::Bluetooth => "Bluetooth",
            DeviceType::Modem => "Mobile Broadband",
            DeviceType::Bond => "Bond",
            DeviceType::Vlan => "VLAN",
            DeviceType::Bridge => "Bridge",
            DeviceType::Tun => "TUN/TAP",
            DeviceType::Veth => "Virtual Ethernet",
            DeviceType::WireGuard => "WireGuard",
            DeviceType::Loopback => "Loopback",
            DeviceType::Other(_) => "Network Device",
        }
    }

    pub fn icon_name(self) -> &'static str {
        match self {
            DeviceType::Wifi => "network-wireless-symbolic",
            DeviceType::Bluetooth => "bluetooth-active-symbolic",
            DeviceType::Modem => "network-cellular-symbolic",
            DeviceType::WireGuard | DeviceType::Tun => "network-vpn-symbolic",
            _ => "network-wired-symbolic",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unknown,
    Unmanaged,
    Unavailable,
    Disconnected,
    Connecting,
    NeedAuth,
    Activated,
    Deactivating,
    Failed,
}

impl From<u32> for DeviceState {
    fn from(value: u32) -> Self {
        match value {
            10 => DeviceState::Unmanaged,
            20 => DeviceState::Unavailable,
            30 => DeviceState::Disconnected,
            40 | 50 | 70 | 80 | 90 => DeviceState::Connecting,
            60 => DeviceState::NeedAuth,
            100 => DeviceState::Activated,
            110 => DeviceState::Deactivating,
            120 => DeviceState::Failed,
            _ => DeviceState::Unknown,
        }
    }
}

impl DeviceState {
    pub fn label(self) -> &'static str {
        match self {
            DeviceState::Unknown => "Unknown",
            DeviceState::Unmanaged => "Unmanaged",
            DeviceState::Unavailable => "Unavailable",
            DeviceState::Disconnected => "Disconnected",
            DeviceState::Connecting => "Connecting",
            DeviceState::NeedAuth => "Authentication required",
            DeviceState::Activated => "Connected",
            DeviceState::Deactivating => "Disconnecting",
            DeviceState::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Device {
    pub path: String,
    pub interface: String,
    pub device_type: DeviceType,
    pub state: DeviceState,
    pub driver: Option<String>,
    pub hw_address: Option<String>,
}

impl Device {
    pub fn description(&self) -> &'static str {
        self.device_type.label()
    }

    pub fn title(&self) -> String {
        format!("{} ({})", self.description(), self.interface)
    }
}

#[derive(Clone)]
pub struct NmClient {
    conn: Connection,
}

impl NmClient {
    pub async fn connect() -> Result<Self> {
        let conn = Connection::system()
            .await
            .context("Failed to connect to the system bus")?;
        Ok(Self { conn })
    }

    pub async fn version(&self) -> Result<String> {
        let proxy = NetworkManagerProxy::new(&self.conn).await?;
        Ok(proxy.version().await?)
    }

    pub async fn devices(&self) -> Result<Vec<Device>> {
        let proxy = NetworkManagerProxy::new(&self.conn).await?;
        let paths = proxy
            .get_devices()
            .await
            .context("NetworkManager did not return devices")?;

        let mut devices = Vec::with_capacity(paths.len());
        for path in paths {
            let device = NMDeviceProxy::builder(&self.conn)
                .path(path.clone())?
                .build()
                .await?;

            devices.push(Device {
                path: path.to_string(),
                interface: device.interface().await?,
                device_type: device.device_type().await?.into(),
                state: device.state().await.unwrap_or(0).into(),
                driver: device.driver().await.ok().filter(|d| !d.is_empty()),
                hw_address: device.hw_address().await.ok().filter(|a| !a.is_empty()),
            });
        }

        Ok(devices)
    }

    /// Proxy used to subscribe to access point signals of a Wi-Fi device.
    pub async fn wireless(&self, device_path: &str) -> Result<NMWirelessProxy<'static>> {
        Ok(NMWirelessProxy::builder(&self.conn)
            .path(device_path.to_string())?
            .build()
            .await?)
    }

    pub async fn request_scan(&self, device_path: &str) -> Result<()> {
        let wireless = self.wireless(device_path).await?;
        wireless
            .request_scan(HashMap::new())
            .await
            .with_context(|| format!("Scan request failed on {}", device_path))?;
        Ok(())
    }

    pub async fn access_points(&self, device_path: &str) -> Result<Vec<AccessPoint>> {
        let wireless = self.wireless(device_path).await?;
        let mut aps = Vec::new();
        for path in wireless.get_all_access_points().await? {
            match self.access_point(path.as_str()).await {
                Ok(ap) => aps.push(ap),
                // Access points can vanish between listing and reading.
                Err(e) => log::debug!("Skipping access point {}: {}", path.as_str(), e),
            }
        }
        Ok(aps)
    }

    pub async fn access_point(&self, path: &str) -> Result<AccessPoint> {
        let ap = NMAccessPointProxy::builder(&self.conn)
            .path(path.to_string())?
            .build()
            .await?;

        Ok(AccessPoint {
            path: path.to_string(),
            ssid: ap.ssid().await?,
            bssid: ap.hw_address().await.unwrap_or_default(),
            strength: ap.strength().await.unwrap_or(0),
            mode: ApMode::from(ap.mode().await.unwrap_or(0)),
            flags: ap.flags().await.unwrap_or(0),
            wpa_flags: ap.wpa_flags().await.unwrap_or(0),
            rsn_flags: ap.rsn_flags().await.unwrap_or(0),
            frequency: ap.frequency().await.unwrap_or(0),
        })
    }

    pub async fn saved_connections(&self) -> Result<Vec<SavedConnection>> {
        let settings = NMSettingsProxy::new(&self.conn).await?;
        let mut connections = Vec::new();

        for path in settings.list_connections().await? {
            let proxy = NMSettingsConnectionProxy::builder(&self.conn)
                .path(path.clone())?
                .build()
                .await?;

            match proxy.get_settings().await {
                Ok(raw) => {
                    let connection = SavedConnection {
                        path: path.to_string(),
                        settings: ConnectionSettings::from_dbus(&raw),
                    };
                    if connection.is_candidate() {
                        connections.push(connection);
                    }
                }
                Err(e) => log::warn!("Failed to read settings of {}: {}", path.as_str(), e),
            }
        }

        Ok(connections)
    }

    pub async fn activate_connection(
        &self,
        connection_path: &str,
        device_path: &str,
        specific_object: Option<&str>,
    ) -> Result<String> {
        let proxy = NetworkManagerProxy::new(&self.conn).await?;
        let connection = ObjectPath::try_from(connection_path)?;
        let device = ObjectPath::try_from(device_path)?;
        let specific = ObjectPath::try_from(specific_object.unwrap_or("/"))?;

        let active = proxy
            .activate_connection(&connection, &device, &specific)
            .await?;
        Ok(active.to_string())
    }

    pub async fn add_and_activate_connection(
        &self,
        settings: &ConnectionSettings,
        device_path: &str,
        specific_object: Option<&str>,
    ) -> Result<String> {
        let proxy = NetworkManagerProxy::new(&self.conn).await?;
        let device = ObjectPath::try_from(device_path)?;
        let specific = ObjectPath::try_from(specific_object.unwrap_or("/"))?;

        let (_connection, active) = proxy
            .add_and_activate_connection(settings.to_dbus(), &device, &specific)
            .await?;
        Ok(active.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_title_uses_description_and_interface() {
        let device = Device {
            path: "/org/freedesktop/NetworkManager/Devices/3".to_string(),
            interface: "wlp2s0".to_string(),
            device_type: DeviceType::from(2),
            state: DeviceState::from(100),
            driver: Some("iwlwifi".to_string()),
            hw_address: None,
        };
        assert_eq!(device.title(), "Wi-Fi (wlp2s0)");
        assert_eq!(device.state.label(), "Connected");
    }

    #[test]
    fn test_device_type_mapping() {
        assert_eq!(DeviceType::from(1), DeviceType::Ethernet);
        assert_eq!(DeviceType::from(32), DeviceType::Loopback);
        assert_eq!(DeviceType::from(99), DeviceType::Other(99));
        assert_eq!(DeviceType::Other(99).label(), "Network Device");
    }

    #[test]
    fn test_intermediate_states_collapse_to_connecting() {
        for raw in [40, 50, 70, 80, 90] {
            assert_eq!(DeviceState::from(raw), DeviceState::Connecting);
        }
        assert_eq!(DeviceState::from(60), DeviceState::NeedAuth);
        assert_eq!(DeviceState::from(7), DeviceState::Unknown);
    }
}
