// File: bluez.rs
// Location: /src/bluez.rs

use anyhow::{Context, Result};
use std::collections::HashMap;
use zbus::{proxy, Connection};
use zvariant::{ObjectPath, OwnedValue};

use crate::wifi::owned;

const BLUEZ_SERVICE: &str = "org.bluez";
const ADAPTER_INTERFACE: &str = "org.bluez.Adapter1";
const DEVICE_INTERFACE: &str = "org.bluez.Device1";

/// Object path -> interface name -> properties.
pub type ManagedObjects = HashMap<String, HashMap<String, HashMap<String, OwnedValue>>>;

#[proxy(interface = "org.bluez.Adapter1", default_service = "org.bluez")]
trait Adapter1 {
    fn start_discovery(&self) -> zbus::Result<()>;

    fn stop_discovery(&self) -> zbus::Result<()>;

    fn remove_device(&self, device: &ObjectPath<'_>) -> zbus::Result<()>;

    #[zbus(property)]
    fn powered(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn set_powered(&self, value: bool) -> zbus::Result<()>;
}

#[proxy(interface = "org.bluez.Device1", default_service = "org.bluez")]
trait Device1 {
    fn connect(&self) -> zbus::Result<()>;

    fn disconnect(&self) -> zbus::Result<()>;

    fn pair(&self) -> zbus::Result<()>;

    #[zbus(property)]
    fn set_trusted(&self, value: bool) -> zbus::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adapter {
    pub path: String,
    pub name: String,
    pub powered: bool,
    pub discovering: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BluetoothDevice {
    pub path: String,
    pub adapter: String,
    pub address: String,
    pub name: String,
    pub icon: Option<String>,
    pub paired: bool,
    pub connected: bool,
    pub trusted: bool,
}

impl BluetoothDevice {
    pub fn status_label(&self) -> &'static str {
        if self.connected {
            "Connected"
        } else if self.paired {
            "Paired"
        } else {
            "Not Set Up"
        }
    }

    pub fn icon_name(&self) -> String {
        match self.icon.as_deref() {
            Some(icon) if !icon.is_empty() => format!("{}-symbolic", icon),
            _ => "bluetooth-active-symbolic".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BluetoothSnapshot {
    pub adapters: Vec<Adapter>,
    pub devices: Vec<BluetoothDevice>,
}

impl BluetoothSnapshot {
    pub fn from_objects(objects: &ManagedObjects) -> Self {
        let mut snapshot = Self::default();

        for (path, interfaces) in objects {
            if let Some(props) = interfaces.get(ADAPTER_INTERFACE) {
                let name = string_prop(props, "Alias")
                    .or_else(|| string_prop(props, "Name"))
                    .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path).to_string());
                snapshot.adapters.push(Adapter {
                    path: path.clone(),
                    name,
                    powered: bool_prop(props, "Powered"),
                    discovering: bool_prop(props, "Discovering"),
                });
            }

            if let Some(props) = interfaces.get(DEVICE_INTERFACE) {
                let address = string_prop(props, "Address").unwrap_or_default();
                let name = string_prop(props, "Alias")
                    .or_else(|| string_prop(props, "Name"))
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| address.clone());
                let adapter = path
                    .rsplit_once('/')
                    .map(|(parent, _)| parent.to_string())
                    .unwrap_or_default();

                snapshot.devices.push(BluetoothDevice {
                    path: path.clone(),
                    adapter,
                    address,
                    name,
                    icon: string_prop(props, "Icon"),
                    paired: bool_prop(props, "Paired"),
                    connected: bool_prop(props, "Connected"),
                    trusted: bool_prop(props, "Trusted"),
                });
            }
        }

        snapshot.adapters.sort_by(|a, b| a.path.cmp(&b.path));
        sort_devices(&mut snapshot.devices);
        snapshot
    }

    pub fn primary_adapter(&self) -> Option<&Adapter> {
        self.adapters.first()
    }

    pub fn devices_of<'a>(&'a self, adapter: &'a str) -> impl Iterator<Item = &'a BluetoothDevice> + 'a {
        self.devices.iter().filter(move |d| d.adapter == adapter)
    }
}

fn string_prop(props: &HashMap<String, OwnedValue>, key: &str) -> Option<String> {
    props.get(key).and_then(owned::<String>)
}

fn bool_prop(props: &HashMap<String, OwnedValue>, key: &str) -> bool {
    props.get(key).and_then(owned::<bool>).unwrap_or(false)
}

/// Connected first, then paired, then by name.
pub fn sort_devices(devices: &mut [BluetoothDevice]) {
    devices.sort_by(|a, b| {
        b.connected
            .cmp(&a.connected)
            .then_with(|| b.paired.cmp(&a.paired))
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

/// Discovery session this app has requested on the primary adapter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryState {
    running: bool,
}

impl DiscoveryState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Forget the session once BlueZ reports discovery stopped, e.g. after a power cycle.
    pub fn sync(&mut self, adapter: &Adapter) {
        if !adapter.powered || !adapter.discovering {
            self.running = false;
        }
    }

    /// The discovery call needed to reach `wanted`, if any.
    pub fn transition(&self, wanted: bool, adapter: &Adapter) -> Option<bool> {
        if wanted && !adapter.powered {
            return None;
        }
        (self.running != wanted).then_some(wanted)
    }
}

#[derive(Clone)]
pub struct BluezClient {
    conn: Connection,
}

impl BluezClient {
    pub async fn connect() -> Result<Self> {
        let conn = Connection::system()
            .await
            .context("Failed to connect to the system bus")?;
        Ok(Self { conn })
    }

    pub async fn snapshot(&self) -> Result<BluetoothSnapshot> {
        let manager = zbus::fdo::ObjectManagerProxy::builder(&self.conn)
            .destination(BLUEZ_SERVICE)?
            .path("/")?
            .build()
            .await?;

        let objects = manager
            .get_managed_objects()
            .await
            .context("BlueZ is not available")?;

        let objects: ManagedObjects = objects
            .into_iter()
            .map(|(path, interfaces)| {
                let interfaces = interfaces
                    .into_iter()
                    .map(|(name, props)| (name.to_string(), props))
                    .collect();
                (path.to_string(), interfaces)
            })
            .collect();

        Ok(BluetoothSnapshot::from_objects(&objects))
    }

    async fn adapter(&self, path: &str) -> Result<Adapter1Proxy<'static>> {
        Ok(Adapter1Proxy::builder(&self.conn)
            .path(path.to_string())?
            .build()
            .await?)
    }

    async fn device(&self, path: &str) -> Result<Device1Proxy<'static>> {
        Ok(Device1Proxy::builder(&self.conn)
            .path(path.to_string())?
            .build()
            .await?)
    }

    pub async fn set_powered(&self, adapter: &str, powered: bool) -> Result<()> {
        self.adapter(adapter)
            .await?
            .set_powered(powered)
            .await
            .with_context(|| format!("Failed to switch {} {}", adapter, if powered { "on" } else { "off" }))?;
        Ok(())
    }

    pub async fn start_discovery(&self, adapter: &str) -> Result<()> {
        self.adapter(adapter).await?.start_discovery().await?;
        Ok(())
    }

    pub async fn stop_discovery(&self, adapter: &str) -> Result<()> {
        self.adapter(adapter).await?.stop_discovery().await?;
        Ok(())
    }

    pub async fn connect_device(&self, device: &str) -> Result<()> {
        self.device(device).await?.connect().await?;
        Ok(())
    }

    pub async fn disconnect_device(&self, device: &str) -> Result<()> {
        self.device(device).await?.disconnect().await?;
        Ok(())
    }

    /// Pairs, trusts and connects a new device.
    pub async fn pair_device(&self, device: &str) -> Result<()> {
        let proxy = self.device(device).await?;
        proxy.pair().await.context("Pairing failed")?;
        if let Err(e) = proxy.set_trusted(true).await {
            log::warn!("Failed to trust {}: {}", device, e);
        }
        proxy.connect().await.context("Connection failed")?;
        Ok(())
    }

    pub async fn remove_device(&self, adapter: &str, device: &str) -> Result<()> {
        let path = ObjectPath::try_from(device)?;
        self.adapter(adapter).await?.remove_device(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zvariant::Value;

    fn ov<'a>(value: impl Into<Value<'a>>) -> OwnedValue {
        OwnedValue::try_from(value.into()).unwrap()
    }

    fn device_props(address: &str, alias: Option<&str>, paired: bool, connected: bool) -> HashMap<String, OwnedValue> {
        let mut props = HashMap::new();
        props.insert("Address".to_string(), ov(address));
        if let Some(alias) = alias {
            props.insert("Alias".to_string(), ov(alias));
        }
        props.insert("Paired".to_string(), ov(paired));
        props.insert("Connected".to_string(), ov(connected));
        props.insert("Icon".to_string(), ov("audio-headset"));
        props
    }

    fn sample_objects() -> ManagedObjects {
        let mut objects: ManagedObjects = HashMap::new();

        let mut adapter = HashMap::new();
        adapter.insert("Alias".to_string(), ov("laptop"));
        adapter.insert("Powered".to_string(), ov(true));
        objects.insert(
            "/org/bluez/hci0".to_string(),
            HashMap::from([(ADAPTER_INTERFACE.to_string(), adapter)]),
        );

        let devices = [
            ("dev_AA", "AA:AA:AA:AA:AA:AA", Some("zebra speaker"), true, false),
            ("dev_BB", "BB:BB:BB:BB:BB:BB", Some("Headphones"), true, true),
            ("dev_CC", "CC:CC:CC:CC:CC:CC", None, false, false),
            ("dev_DD", "DD:DD:DD:DD:DD:DD", Some("apple keyboard"), true, false),
        ];
        for (node, address, alias, paired, connected) in devices {
            objects.insert(
                format!("/org/bluez/hci0/{}", node),
                HashMap::from([(
                    DEVICE_INTERFACE.to_string(),
                    device_props(address, alias, paired, connected),
                )]),
            );
        }

        objects
    }

    #[test]
    fn test_snapshot_parses_adapter() {
        let snapshot = BluetoothSnapshot::from_objects(&sample_objects());
        let adapter = snapshot.primary_adapter().unwrap();
        assert_eq!(adapter.path, "/org/bluez/hci0");
        assert_eq!(adapter.name, "laptop");
        assert!(adapter.powered);
        assert!(!adapter.discovering);
    }

    #[test]
    fn test_devices_sorted_connected_then_paired_then_name() {
        let snapshot = BluetoothSnapshot::from_objects(&sample_objects());
        let names: Vec<&str> = snapshot.devices.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Headphones", "apple keyboard", "zebra speaker", "CC:CC:CC:CC:CC:CC"]
        );
    }

    #[test]
    fn test_device_fields() {
        let snapshot = BluetoothSnapshot::from_objects(&sample_objects());
        let headphones = &snapshot.devices[0];
        assert_eq!(headphones.adapter, "/org/bluez/hci0");
        assert_eq!(headphones.status_label(), "Connected");
        assert_eq!(headphones.icon_name(), "audio-headset-symbolic");

        let unnamed = snapshot.devices.last().unwrap();
        assert_eq!(unnamed.status_label(), "Not Set Up");
        assert_eq!(snapshot.devices_of("/org/bluez/hci0").count(), 4);
        assert_eq!(snapshot.devices_of("/org/bluez/hci1").count(), 0);
    }

    #[test]
    fn test_objects_without_bluez_interfaces_are_ignored() {
        let mut objects: ManagedObjects = HashMap::new();
        objects.insert(
            "/org/bluez".to_string(),
            HashMap::from([("org.bluez.AgentManager1".to_string(), HashMap::new())]),
        );
        assert_eq!(BluetoothSnapshot::from_objects(&objects), BluetoothSnapshot::default());
    }

    fn adapter(powered: bool, discovering: bool) -> Adapter {
        Adapter {
            path: "/org/bluez/hci0".to_string(),
            name: "laptop".to_string(),
            powered,
            discovering,
        }
    }

    #[test]
    fn test_discovery_restarts_after_power_cycle() {
        let mut state = DiscoveryState::default();
        assert_eq!(state.transition(true, &adapter(true, false)), Some(true));
        state.set_running(true);
        state.sync(&adapter(true, true));
        assert_eq!(state.transition(true, &adapter(true, true)), None);

        state.sync(&adapter(false, false));
        assert!(!state.is_running());
        assert_eq!(state.transition(true, &adapter(false, false)), None);
        assert_eq!(state.transition(true, &adapter(true, false)), Some(true));
    }

    #[test]
    fn test_discovery_stop_only_when_running() {
        let mut state = DiscoveryState::default();
        assert_eq!(state.transition(false, &adapter(true, true)), None);
        state.set_running(true);
        assert_eq!(state.transition(false, &adapter(true, true)), Some(false));
    }
}
