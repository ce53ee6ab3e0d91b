// File: wifi.rs
// Location: /src/wifi.rs

use std::collections::HashMap;
use uuid::Uuid;
use zvariant::{OwnedValue, Value};

pub const NM_802_11_AP_FLAGS_PRIVACY: u32 = 0x0000_0001;
pub const NM_802_11_AP_SEC_KEY_MGMT_PSK: u32 = 0x0000_0100;
pub const NM_802_11_AP_SEC_KEY_MGMT_802_1X: u32 = 0x0000_0200;
pub const NM_802_11_AP_SEC_KEY_MGMT_SAE: u32 = 0x0000_0400;
pub const NM_802_11_AP_SEC_KEY_MGMT_OWE: u32 = 0x0000_0800;
pub const NM_802_11_AP_SEC_KEY_MGMT_OWE_TM: u32 = 0x0000_1000;

pub const WIRELESS_TYPE: &str = "802-11-wireless";

/// Known trojan networks that are never shown.
const MIN_PSK_LEN: usize = 8;
const MAX_PSK_LEN: usize = 63;
const HEX_PSK_LEN: usize = 64;

const DENYLISTED_SSIDS: &[&str] = &["Free Public Wi-Fi"];

/// SSIDs commonly left at the factory value by ISPs and vendors.
const MANUFACTURER_DEFAULT_SSIDS: &[&str] = &[
    "linksys",
    "linksys-a",
    "linksys-g",
    "default",
    "belkin54g",
    "NETGEAR",
    "o2DSL",
    "WLAN",
    "ALICE-WLAN",
];

pub type DbusSettings = HashMap<String, HashMap<String, OwnedValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApMode {
    Unknown,
    Adhoc,
    Infra,
    Ap,
    Mesh,
}

impl From<u32> for ApMode {
    fn from(value: u32) -> Self {
        match value {
            1 => ApMode::Adhoc,
            2 => ApMode::Infra,
            3 => ApMode::Ap,
            4 => ApMode::Mesh,
            _ => ApMode::Unknown,
        }
    }
}

impl ApMode {
    pub fn setting_value(self) -> &'static str {
        match self {
            ApMode::Adhoc => "adhoc",
            ApMode::Ap => "ap",
            ApMode::Mesh => "mesh",
            ApMode::Infra | ApMode::Unknown => "infrastructure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Security {
    None,
    Wep,
    WpaPsk,
    Sae,
    Owe,
    Enterprise,
}

impl Security {
    pub fn from_flags(flags: u32, wpa_flags: u32, rsn_flags: u32) -> Self {
        let privacy = flags & NM_802_11_AP_FLAGS_PRIVACY != 0;
        let key_mgmt = wpa_flags | rsn_flags;

        if wpa_flags == 0 && rsn_flags == 0 {
            return if privacy { Security::Wep } else { Security::None };
        }

        if key_mgmt & NM_802_11_AP_SEC_KEY_MGMT_802_1X != 0 {
            Security::Enterprise
        } else if key_mgmt & NM_802_11_AP_SEC_KEY_MGMT_PSK != 0 {
            // WPA2/WPA3 transition networks accept a plain PSK profile.
            Security::WpaPsk
        } else if rsn_flags & NM_802_11_AP_SEC_KEY_MGMT_SAE != 0 {
            Security::Sae
        } else if rsn_flags & (NM_802_11_AP_SEC_KEY_MGMT_OWE | NM_802_11_AP_SEC_KEY_MGMT_OWE_TM) != 0 {
            Security::Owe
        } else {
            Security::WpaPsk
        }
    }

    pub fn is_secured(self) -> bool {
        !matches!(self, Security::None | Security::Owe)
    }

    pub fn label(self) -> &'static str {
        match self {
            Security::None => "Open",
            Security::Wep => "WEP",
            Security::WpaPsk => "WPA/WPA2",
            Security::Sae => "WPA3",
            Security::Owe => "Enhanced Open",
            Security::Enterprise => "Enterprise",
        }
    }

    pub fn key_mgmt(self) -> Option<&'static str> {
        match self {
            Security::None => None,
            Security::Wep => Some("none"),
            Security::WpaPsk => Some("wpa-psk"),
            Security::Sae => Some("sae"),
            Security::Owe => Some("owe"),
            Security::Enterprise => Some("wpa-eap"),
        }
    }

    /// Whether NetworkManager will take `secret` as the key for this security.
    /// WPA-PSK needs 8..=63 characters or a 64 digit hex key.
    pub fn accepts_secret(self, secret: &str) -> bool {
        match self {
            Security::None | Security::Owe => true,
            Security::WpaPsk => {
                let len = secret.chars().count();
                (MIN_PSK_LEN..=MAX_PSK_LEN).contains(&len)
                    || (secret.len() == HEX_PSK_LEN && secret.chars().all(|c| c.is_ascii_hexdigit()))
            }
            Security::Wep | Security::Sae | Security::Enterprise => !secret.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub path: String,
    pub ssid: Vec<u8>,
    pub bssid: String,
    pub strength: u8,
    pub mode: ApMode,
    pub flags: u32,
    pub wpa_flags: u32,
    pub rsn_flags: u32,
    pub frequency: u32,
}

impl AccessPoint {
    pub fn security(&self) -> Security {
        Security::from_flags(self.flags, self.wpa_flags, self.rsn_flags)
    }

    pub fn display_ssid(&self) -> String {
        ssid_to_utf8(&self.ssid)
    }

    pub fn band(&self) -> &'static str {
        if (2400..=2500).contains(&self.frequency) {
            "2.4 GHz"
        } else if (4900..=5900).contains(&self.frequency) {
            "5 GHz"
        } else if (5925..=7125).contains(&self.frequency) {
            "6 GHz"
        } else {
            "Unknown"
        }
    }

    pub fn group_key(&self) -> ApGroupKey {
        ApGroupKey {
            ssid: self.ssid.clone(),
            mode: self.mode,
            security: self.security(),
        }
    }

    /// Hidden and deny-listed networks are never listed.
    pub fn is_listable(&self) -> bool {
        !is_empty_ssid(&self.ssid) && !is_denylisted_ssid(&self.ssid)
    }
}

pub fn is_empty_ssid(ssid: &[u8]) -> bool {
    ssid.iter().all(|b| *b == 0)
}

pub fn ssid_to_utf8(ssid: &[u8]) -> String {
    String::from_utf8_lossy(ssid).into_owned()
}

fn is_ssid_in_list(ssid: &[u8], list: &[&str]) -> bool {
    list.iter().any(|item| item.as_bytes() == ssid)
}

pub fn is_denylisted_ssid(ssid: &[u8]) -> bool {
    is_ssid_in_list(ssid, DENYLISTED_SSIDS)
}

pub fn is_manufacturer_default_ssid(ssid: &[u8]) -> bool {
    is_ssid_in_list(ssid, MANUFACTURER_DEFAULT_SSIDS)
}

pub fn parse_mac(value: &str) -> Option<[u8; 6]> {
    let mut out = [0u8; 6];
    let mut parts = value.trim().split(':');
    for byte in out.iter_mut() {
        let part = parts.next()?;
        if part.is_empty() || part.len() > 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(out)
}

/// Access points sharing SSID, mode and security are one network.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ApGroupKey {
    pub ssid: Vec<u8>,
    pub mode: ApMode,
    pub security: Security,
}

#[derive(Debug, Clone)]
pub struct ApGroup {
    members: Vec<AccessPoint>,
}

impl ApGroup {
    /// Strongest member; used as the specific object on activation.
    pub fn representative(&self) -> &AccessPoint {
        let mut best = &self.members[0];
        for ap in &self.members[1..] {
            if ap.strength > best.strength {
                best = ap;
            }
        }
        best
    }

    pub fn strength(&self) -> u8 {
        self.representative().strength
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApChange {
    Ignored,
    Inserted(ApGroupKey),
    Merged(ApGroupKey),
    Updated(ApGroupKey),
    Removed(ApGroupKey),
    /// A known AP switched group; `from` is the change to its old group.
    Moved {
        from: Box<ApChange>,
        to: Box<ApChange>,
    },
}

#[derive(Debug, Default)]
pub struct ApList {
    groups: HashMap<ApGroupKey, ApGroup>,
    by_path: HashMap<String, ApGroupKey>,
}

impl ApList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, ap: AccessPoint) -> ApChange {
        if !ap.is_listable() {
            return self.remove(&ap.path).unwrap_or(ApChange::Ignored);
        }

        let key = ap.group_key();

        if let Some(existing_key) = self.by_path.get(&ap.path).cloned() {
            if existing_key == key {
                if let Some(group) = self.groups.get_mut(&key) {
                    if let Some(member) = group.members.iter_mut().find(|m| m.path == ap.path) {
                        *member = ap;
                    }
                }
                return ApChange::Updated(key);
            }
            let from = self.remove(&ap.path).unwrap_or(ApChange::Ignored);
            let to = self.insert(key, ap);
            return ApChange::Moved {
                from: Box::new(from),
                to: Box::new(to),
            };
        }

        self.insert(key, ap)
    }

    fn insert(&mut self, key: ApGroupKey, ap: AccessPoint) -> ApChange {
        self.by_path.insert(ap.path.clone(), key.clone());
        match self.groups.get_mut(&key) {
            Some(group) => {
                group.members.push(ap);
                ApChange::Merged(key)
            }
            None => {
                self.groups.insert(key.clone(), ApGroup { members: vec![ap] });
                ApChange::Inserted(key)
            }
        }
    }

    pub fn remove(&mut self, path: &str) -> Option<ApChange> {
        let key = self.by_path.remove(path)?;
        let group = self.groups.get_mut(&key)?;
        group.members.retain(|m| m.path != path);

        if group.is_empty() {
            self.groups.remove(&key);
            Some(ApChange::Removed(key))
        } else {
            Some(ApChange::Updated(key))
        }
    }

    pub fn get(&self, key: &ApGroupKey) -> Option<&ApGroup> {
        self.groups.get(key)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.by_path.keys().map(String::as_str)
    }

    /// Groups ordered by signal strength, strongest first.
    pub fn sorted_keys(&self) -> Vec<ApGroupKey> {
        let mut keys: Vec<(&ApGroupKey, &ApGroup)> = self.groups.iter().collect();
        keys.sort_by(|(ka, a), (kb, b)| {
            b.strength()
                .cmp(&a.strength())
                .then_with(|| ka.ssid.cmp(&kb.ssid))
        });
        keys.into_iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Psk(String),
    Wep(String),
    Enterprise { identity: String, password: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub id: String,
    pub uuid: String,
    pub conn_type: String,
    pub autoconnect: Option<bool>,
    pub master: Option<String>,
    pub ssid: Option<Vec<u8>>,
    pub mode: Option<String>,
    pub bssid: Option<[u8; 6]>,
    pub key_mgmt: Option<String>,
    pub psk: Option<String>,
    pub wep_key0: Option<String>,
    pub eap: Vec<String>,
    pub phase2_auth: Option<String>,
    pub identity: Option<String>,
    pub password: Option<String>,
}

impl ConnectionSettings {
    /// Candidate profile for connecting to `ap`.
    pub fn for_access_point(ap: &AccessPoint) -> Self {
        let security = ap.security();
        let mut settings = Self {
            id: ap.display_ssid(),
            uuid: Uuid::new_v4().to_string(),
            conn_type: WIRELESS_TYPE.to_string(),
            ssid: Some(ap.ssid.clone()),
            mode: Some(ap.mode.setting_value().to_string()),
            key_mgmt: security.key_mgmt().map(str::to_string),
            ..Self::default()
        };

        // Factory-named networks are pinned to the BSSID that was clicked.
        if ap.mode == ApMode::Infra && is_manufacturer_default_ssid(&ap.ssid) {
            settings.bssid = parse_mac(&ap.bssid);
        }

        if security == Security::Enterprise {
            settings.eap = vec!["ttls".to_string()];
            settings.phase2_auth = Some("mschapv2".to_string());
        }

        settings
    }

    pub fn apply_credentials(&mut self, credentials: Credentials) {
        match credentials {
            Credentials::None => {}
            Credentials::Psk(psk) => self.psk = Some(psk),
            Credentials::Wep(key) => self.wep_key0 = Some(key),
            Credentials::Enterprise { identity, password } => {
                self.identity = Some(identity);
                self.password = Some(password);
            }
        }
    }

    /// Ad-hoc and AP-mode profiles are not auto-connected.
    pub fn prepare_for_new(&mut self) {
        if matches!(self.mode.as_deref(), Some("adhoc") | Some("ap")) {
            self.autoconnect = Some(false);
        }
    }

    pub fn is_wireless(&self) -> bool {
        self.conn_type == WIRELESS_TYPE
    }

    pub fn is_port(&self) -> bool {
        self.master.is_some()
    }

    fn mode_or_default(&self) -> &str {
        self.mode.as_deref().unwrap_or("infrastructure")
    }

    /// Compares ignoring id, uuid and secrets. Optional properties the
    /// candidate leaves unset match anything.
    pub fn fuzzy_matches(&self, saved: &ConnectionSettings) -> bool {
        fn wildcard<T: PartialEq>(candidate: &Option<T>, saved: &Option<T>) -> bool {
            candidate.is_none() || candidate == saved
        }

        self.conn_type == saved.conn_type
            && self.ssid == saved.ssid
            && self.mode_or_default() == saved.mode_or_default()
            && self.key_mgmt == saved.key_mgmt
            && wildcard(&self.autoconnect, &saved.autoconnect)
            && wildcard(&self.bssid, &saved.bssid)
            && (self.eap.is_empty() || self.eap == saved.eap)
            && wildcard(&self.phase2_auth, &saved.phase2_auth)
            && wildcard(&self.identity, &saved.identity)
    }

    pub fn to_dbus(&self) -> HashMap<&'static str, HashMap<&'static str, Value<'static>>> {
        let mut out = HashMap::new();

        let mut connection: HashMap<&'static str, Value<'static>> = HashMap::new();
        connection.insert("id", Value::from(self.id.clone()));
        connection.insert("uuid", Value::from(self.uuid.clone()));
        connection.insert("type", Value::from(self.conn_type.clone()));
        if let Some(autoconnect) = self.autoconnect {
            connection.insert("autoconnect", Value::from(autoconnect));
        }
        out.insert("connection", connection);

        if self.is_wireless() {
            let mut wireless: HashMap<&'static str, Value<'static>> = HashMap::new();
            if let Some(ssid) = &self.ssid {
                wireless.insert("ssid", Value::from(ssid.clone()));
            }
            if let Some(mode) = &self.mode {
                wireless.insert("mode", Value::from(mode.clone()));
            }
            if let Some(bssid) = self.bssid {
                wireless.insert("bssid", Value::from(bssid.to_vec()));
            }
            out.insert("802-11-wireless", wireless);
        }

        if let Some(key_mgmt) = &self.key_mgmt {
            let mut security: HashMap<&'static str, Value<'static>> = HashMap::new();
            security.insert("key-mgmt", Value::from(key_mgmt.clone()));
            if let Some(psk) = &self.psk {
                security.insert("psk", Value::from(psk.clone()));
            }
            if let Some(key) = &self.wep_key0 {
                security.insert("wep-key0", Value::from(key.clone()));
            }
            out.insert("802-11-wireless-security", security);
        }

        if !self.eap.is_empty() {
            let mut dot1x: HashMap<&'static str, Value<'static>> = HashMap::new();
            dot1x.insert("eap", Value::from(self.eap.clone()));
            if let Some(phase2) = &self.phase2_auth {
                dot1x.insert("phase2-auth", Value::from(phase2.clone()));
            }
            if let Some(identity) = &self.identity {
                dot1x.insert("identity", Value::from(identity.clone()));
            }
            if let Some(password) = &self.password {
                dot1x.insert("password", Value::from(password.clone()));
            }
            out.insert("802-1x", dot1x);
        }

        out
    }

    pub fn from_dbus(settings: &DbusSettings) -> Self {
        let get = |section: &str, key: &str| settings.get(section).and_then(|s| s.get(key));
        let string = |section: &str, key: &str| get(section, key).and_then(owned::<String>);

        Self {
            id: string("connection", "id").unwrap_or_default(),
            uuid: string("connection", "uuid").unwrap_or_default(),
            conn_type: string("connection", "type").unwrap_or_default(),
            autoconnect: get("connection", "autoconnect").and_then(owned::<bool>),
            master: string("connection", "master")
                .or_else(|| string("connection", "controller"))
                .filter(|v| !v.is_empty()),
            ssid: get("802-11-wireless", "ssid").and_then(owned::<Vec<u8>>),
            mode: string("802-11-wireless", "mode"),
            bssid: get("802-11-wireless", "bssid")
                .and_then(owned::<Vec<u8>>)
                .and_then(|bytes| <[u8; 6]>::try_from(bytes.as_slice()).ok()),
            key_mgmt: string("802-11-wireless-security", "key-mgmt"),
            psk: string("802-11-wireless-security", "psk"),
            wep_key0: string("802-11-wireless-security", "wep-key0"),
            eap: get("802-1x", "eap")
                .and_then(owned::<Vec<String>>)
                .unwrap_or_default(),
            phase2_auth: string("802-1x", "phase2-auth"),
            identity: string("802-1x", "identity"),
            password: string("802-1x", "password"),
        }
    }
}

pub(crate) fn owned<T>(value: &OwnedValue) -> Option<T>
where
    T: TryFrom<OwnedValue>,
{
    value.try_clone().ok().and_then(|v| T::try_from(v).ok())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedConnection {
    pub path: String,
    pub settings: ConnectionSettings,
}

impl SavedConnection {
    /// Port connections are skipped unless they are Wi-Fi profiles.
    pub fn is_candidate(&self) -> bool {
        !self.settings.is_port() || self.settings.is_wireless()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationPlan {
    ActivateExisting { connection_path: String },
    AddAndActivate(ConnectionSettings),
}

pub fn plan_activation(candidate: &ConnectionSettings, saved: &[SavedConnection]) -> ActivationPlan {
    if let Some(found) = saved
        .iter()
        .filter(|c| c.is_candidate())
        .find(|c| candidate.fuzzy_matches(&c.settings))
    {
        log::debug!("Found saved profile {} for {}", found.settings.id, candidate.id);
        return ActivationPlan::ActivateExisting {
            connection_path: found.path.clone(),
        };
    }

    let mut settings = candidate.clone();
    settings.prepare_for_new();
    ActivationPlan::AddAndActivate(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ap(path: &str, ssid: &str, strength: u8) -> AccessPoint {
        AccessPoint {
            path: path.to_string(),
            ssid: ssid.as_bytes().to_vec(),
            bssid: "00:11:22:33:44:55".to_string(),
            strength,
            mode: ApMode::Infra,
            flags: NM_802_11_AP_FLAGS_PRIVACY,
            wpa_flags: 0,
            rsn_flags: NM_802_11_AP_SEC_KEY_MGMT_PSK,
            frequency: 2437,
        }
    }

    fn saved(path: &str, settings: ConnectionSettings) -> SavedConnection {
        SavedConnection {
            path: path.to_string(),
            settings,
        }
    }

    #[test]
    fn test_psk_length_limits() {
        assert!(!Security::WpaPsk.accepts_secret(""));
        assert!(!Security::WpaPsk.accepts_secret("short"));
        assert!(Security::WpaPsk.accepts_secret("12345678"));
        assert!(Security::WpaPsk.accepts_secret(&"a".repeat(63)));
        assert!(!Security::WpaPsk.accepts_secret(&"a".repeat(64)));
        assert!(Security::WpaPsk.accepts_secret(&"0f".repeat(32)));
        assert!(!Security::WpaPsk.accepts_secret(&"zz".repeat(32)));
        assert!(Security::Wep.accepts_secret("abcde"));
        assert!(!Security::Enterprise.accepts_secret(""));
    }

    #[test]
    fn test_security_classification() {
        assert_eq!(Security::from_flags(0, 0, 0), Security::None);
        assert_eq!(Security::from_flags(NM_802_11_AP_FLAGS_PRIVACY, 0, 0), Security::Wep);
        assert_eq!(
            Security::from_flags(1, 0, NM_802_11_AP_SEC_KEY_MGMT_PSK),
            Security::WpaPsk
        );
        assert_eq!(
            Security::from_flags(1, 0, NM_802_11_AP_SEC_KEY_MGMT_SAE),
            Security::Sae
        );
        assert_eq!(
            Security::from_flags(1, 0, NM_802_11_AP_SEC_KEY_MGMT_PSK | NM_802_11_AP_SEC_KEY_MGMT_SAE),
            Security::WpaPsk
        );
        assert_eq!(
            Security::from_flags(1, NM_802_11_AP_SEC_KEY_MGMT_802_1X, 0),
            Security::Enterprise
        );
        assert_eq!(
            Security::from_flags(0, 0, NM_802_11_AP_SEC_KEY_MGMT_OWE),
            Security::Owe
        );
        assert!(!Security::Owe.is_secured());
        assert!(Security::Wep.is_secured());
    }

    #[test]
    fn test_empty_and_denylisted_ssids() {
        assert!(is_empty_ssid(b""));
        assert!(is_empty_ssid(&[0, 0, 0]));
        assert!(!is_empty_ssid(b"home"));
        assert!(is_denylisted_ssid(b"Free Public Wi-Fi"));
        assert!(!is_denylisted_ssid(b"free public wi-fi"));
        assert!(is_manufacturer_default_ssid(b"NETGEAR"));
        assert!(!is_manufacturer_default_ssid(b"netgear"));
    }

    #[test]
    fn test_mac_parsing() {
        assert_eq!(
            parse_mac("00:1a:2B:3c:4D:5e"),
            Some([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e])
        );
        assert_eq!(parse_mac("00:11:22:33:44"), None);
        assert_eq!(parse_mac("00:11:22:33:44:55:66"), None);
        assert_eq!(parse_mac("zz:11:22:33:44:55"), None);
    }

    #[test]
    fn test_ap_list_skips_hidden_and_denylisted() {
        let mut list = ApList::new();
        assert_eq!(list.add(ap("/ap/1", "", 50)), ApChange::Ignored);
        assert_eq!(list.add(ap("/ap/2", "Free Public Wi-Fi", 90)), ApChange::Ignored);
        assert!(list.is_empty());
    }

    #[test]
    fn test_ap_list_merges_duplicates() {
        let mut list = ApList::new();
        let first = ap("/ap/1", "Home", 40);
        let key = first.group_key();

        assert_eq!(list.add(first), ApChange::Inserted(key.clone()));
        assert_eq!(list.add(ap("/ap/2", "Home", 80)), ApChange::Merged(key.clone()));
        assert_eq!(list.len(), 1);

        let group = list.get(&key).unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(group.strength(), 80);
        assert_eq!(group.representative().path, "/ap/2");
    }

    #[test]
    fn test_ap_list_keeps_distinct_security_separate() {
        let mut list = ApList::new();
        let mut open = ap("/ap/2", "Cafe", 60);
        open.flags = 0;
        open.rsn_flags = 0;

        list.add(ap("/ap/1", "Cafe", 50));
        assert!(matches!(list.add(open), ApChange::Inserted(_)));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_ap_list_removes_row_only_when_group_empties() {
        let mut list = ApList::new();
        let key = ap("/ap/1", "Home", 40).group_key();
        list.add(ap("/ap/1", "Home", 40));
        list.add(ap("/ap/2", "Home", 80));

        assert_eq!(list.remove("/ap/2"), Some(ApChange::Updated(key.clone())));
        assert_eq!(list.get(&key).unwrap().representative().path, "/ap/1");
        assert_eq!(list.remove("/ap/1"), Some(ApChange::Removed(key)));
        assert!(list.is_empty());
        assert_eq!(list.remove("/ap/1"), None);
    }

    #[test]
    fn test_ap_list_readd_updates_in_place() {
        let mut list = ApList::new();
        let key = ap("/ap/1", "Home", 40).group_key();
        list.add(ap("/ap/1", "Home", 40));

        assert_eq!(list.add(ap("/ap/1", "Home", 70)), ApChange::Updated(key.clone()));
        assert_eq!(list.get(&key).unwrap().len(), 1);
        assert_eq!(list.get(&key).unwrap().strength(), 70);
    }

    #[test]
    fn test_ap_list_readd_with_new_key_reports_old_group() {
        let mut list = ApList::new();
        let home = ap("/ap/1", "Home", 40).group_key();
        let home_5g = ap("/ap/1", "Home-5G", 40).group_key();
        list.add(ap("/ap/1", "Home", 40));

        assert_eq!(
            list.add(ap("/ap/1", "Home-5G", 40)),
            ApChange::Moved {
                from: Box::new(ApChange::Removed(home.clone())),
                to: Box::new(ApChange::Inserted(home_5g.clone())),
            }
        );
        assert!(list.get(&home).is_none());
        assert_eq!(list.get(&home_5g).unwrap().len(), 1);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_ap_list_move_keeps_old_group_with_other_members() {
        let mut list = ApList::new();
        let home = ap("/ap/1", "Home", 40).group_key();
        let office = ap("/ap/3", "Office", 60).group_key();
        list.add(ap("/ap/1", "Home", 40));
        list.add(ap("/ap/2", "Home", 80));
        list.add(ap("/ap/3", "Office", 60));

        assert_eq!(
            list.add(ap("/ap/2", "Office", 80)),
            ApChange::Moved {
                from: Box::new(ApChange::Updated(home.clone())),
                to: Box::new(ApChange::Merged(office.clone())),
            }
        );
        assert_eq!(list.get(&home).unwrap().strength(), 40);
        assert_eq!(list.get(&office).unwrap().len(), 2);
    }

    #[test]
    fn test_ap_list_drops_known_ap_that_turns_hidden() {
        let mut list = ApList::new();
        let key = ap("/ap/1", "Home", 40).group_key();
        list.add(ap("/ap/1", "Home", 40));

        assert_eq!(list.add(ap("/ap/1", "", 40)), ApChange::Removed(key));
        assert!(!list.contains_path("/ap/1"));
        assert_eq!(list.paths().count(), 0);
    }

    #[test]
    fn test_sorted_keys_strongest_first() {
        let mut list = ApList::new();
        list.add(ap("/ap/1", "Weak", 20));
        list.add(ap("/ap/2", "Strong", 90));
        list.add(ap("/ap/3", "Middle", 50));

        let order: Vec<String> = list
            .sorted_keys()
            .into_iter()
            .map(|k| ssid_to_utf8(&k.ssid))
            .collect();
        assert_eq!(order, vec!["Strong", "Middle", "Weak"]);
    }

    #[test]
    fn test_candidate_for_psk_network() {
        let settings = ConnectionSettings::for_access_point(&ap("/ap/1", "Home", 40));
        assert_eq!(settings.id, "Home");
        assert_eq!(settings.conn_type, WIRELESS_TYPE);
        assert_eq!(settings.ssid.as_deref(), Some(&b"Home"[..]));
        assert_eq!(settings.key_mgmt.as_deref(), Some("wpa-psk"));
        assert_eq!(settings.bssid, None);
        assert!(Uuid::parse_str(&settings.uuid).is_ok());
    }

    #[test]
    fn test_candidate_locks_manufacturer_default_to_bssid() {
        let settings = ConnectionSettings::for_access_point(&ap("/ap/1", "linksys", 40));
        assert_eq!(settings.bssid, Some([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]));

        let mut adhoc = ap("/ap/2", "linksys", 40);
        adhoc.mode = ApMode::Adhoc;
        assert_eq!(ConnectionSettings::for_access_point(&adhoc).bssid, None);
    }

    #[test]
    fn test_candidate_for_enterprise_network() {
        let mut enterprise = ap("/ap/1", "Campus", 40);
        enterprise.rsn_flags = NM_802_11_AP_SEC_KEY_MGMT_802_1X;

        let mut settings = ConnectionSettings::for_access_point(&enterprise);
        assert_eq!(settings.key_mgmt.as_deref(), Some("wpa-eap"));
        assert_eq!(settings.eap, vec!["ttls".to_string()]);
        assert_eq!(settings.phase2_auth.as_deref(), Some("mschapv2"));

        settings.apply_credentials(Credentials::Enterprise {
            identity: "alice".to_string(),
            password: "secret".to_string(),
        });
        assert_eq!(settings.identity.as_deref(), Some("alice"));
        assert_eq!(settings.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_prepare_for_new_disables_autoconnect_for_adhoc() {
        let mut adhoc = ap("/ap/1", "Party", 40);
        adhoc.mode = ApMode::Adhoc;
        let mut settings = ConnectionSettings::for_access_point(&adhoc);
        settings.prepare_for_new();
        assert_eq!(settings.autoconnect, Some(false));

        let mut infra = ConnectionSettings::for_access_point(&ap("/ap/2", "Home", 40));
        infra.prepare_for_new();
        assert_eq!(infra.autoconnect, None);
    }

    #[test]
    fn test_fuzzy_match_ignores_identity_and_secrets() {
        let access_point = ap("/ap/1", "Home", 40);
        let mut candidate = ConnectionSettings::for_access_point(&access_point);
        candidate.apply_credentials(Credentials::Psk("new-password".to_string()));

        let mut existing = ConnectionSettings::for_access_point(&access_point);
        existing.id = "Home network".to_string();
        existing.psk = Some("old-password".to_string());
        existing.autoconnect = Some(false);
        existing.mode = None;

        assert_ne!(candidate.uuid, existing.uuid);
        assert!(candidate.fuzzy_matches(&existing));
    }

    #[test]
    fn test_fuzzy_match_rejects_different_network() {
        let candidate = ConnectionSettings::for_access_point(&ap("/ap/1", "Home", 40));

        let other_ssid = ConnectionSettings::for_access_point(&ap("/ap/2", "Office", 40));
        assert!(!candidate.fuzzy_matches(&other_ssid));

        let mut other_security = candidate.clone();
        other_security.key_mgmt = Some("sae".to_string());
        assert!(!candidate.fuzzy_matches(&other_security));

        let mut locked = ConnectionSettings::for_access_point(&ap("/ap/3", "linksys", 40));
        let mut elsewhere = locked.clone();
        elsewhere.bssid = Some([1, 2, 3, 4, 5, 6]);
        assert!(!locked.fuzzy_matches(&elsewhere));
        locked.bssid = None;
        assert!(locked.fuzzy_matches(&elsewhere));
    }

    #[test]
    fn test_plan_activation_prefers_saved_profile() {
        let candidate = ConnectionSettings::for_access_point(&ap("/ap/1", "Home", 40));
        let profiles = vec![
            saved(
                "/settings/1",
                ConnectionSettings::for_access_point(&ap("/ap/9", "Office", 40)),
            ),
            saved(
                "/settings/2",
                ConnectionSettings::for_access_point(&ap("/ap/8", "Home", 10)),
            ),
        ];

        assert_eq!(
            plan_activation(&candidate, &profiles),
            ActivationPlan::ActivateExisting {
                connection_path: "/settings/2".to_string()
            }
        );
    }

    #[test]
    fn test_plan_activation_skips_port_connections() {
        let candidate = ConnectionSettings::for_access_point(&ap("/ap/1", "Home", 40));
        let mut port = candidate.clone();
        port.conn_type = "802-3-ethernet".to_string();
        port.master = Some("bond0".to_string());

        match plan_activation(&candidate, &[saved("/settings/1", port)]) {
            ActivationPlan::AddAndActivate(settings) => assert_eq!(settings.id, "Home"),
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_plan_activation_creates_adhoc_without_autoconnect() {
        let mut adhoc = ap("/ap/1", "Party", 40);
        adhoc.mode = ApMode::Adhoc;
        let candidate = ConnectionSettings::for_access_point(&adhoc);

        match plan_activation(&candidate, &[]) {
            ActivationPlan::AddAndActivate(settings) => {
                assert_eq!(settings.autoconnect, Some(false));
            }
            other => panic!("unexpected plan: {:?}", other),
        }
    }

    #[test]
    fn test_from_dbus_reads_nm_settings() {
        fn ov<'a>(value: impl Into<Value<'a>>) -> OwnedValue {
            OwnedValue::try_from(value.into()).unwrap()
        }

        let mut connection = HashMap::new();
        connection.insert("id".to_string(), ov("Home"));
        connection.insert("uuid".to_string(), ov("4d7f9a0e-5b1c-4c57-9d2a-1b5f0e1c2d3e"));
        connection.insert("type".to_string(), ov(WIRELESS_TYPE));
        connection.insert("autoconnect".to_string(), ov(false));

        let mut wireless = HashMap::new();
        wireless.insert("ssid".to_string(), ov(b"Home".to_vec()));
        wireless.insert("mode".to_string(), ov("infrastructure"));
        wireless.insert("bssid".to_string(), ov(vec![1u8, 2, 3, 4, 5, 6]));

        let mut security = HashMap::new();
        security.insert("key-mgmt".to_string(), ov("wpa-psk"));

        let mut dbus: DbusSettings = HashMap::new();
        dbus.insert("connection".to_string(), connection);
        dbus.insert("802-11-wireless".to_string(), wireless);
        dbus.insert("802-11-wireless-security".to_string(), security);

        let settings = ConnectionSettings::from_dbus(&dbus);
        assert_eq!(settings.id, "Home");
        assert_eq!(settings.autoconnect, Some(false));
        assert_eq!(settings.ssid.as_deref(), Some(&b"Home"[..]));
        assert_eq!(settings.bssid, Some([1, 2, 3, 4, 5, 6]));
        assert_eq!(settings.key_mgmt.as_deref(), Some("wpa-psk"));
        assert_eq!(settings.master, None);
        assert!(settings.eap.is_empty());
    }

    #[test]
    fn test_to_dbus_sections() {
        let mut enterprise = ap("/ap/1", "Campus", 40);
        enterprise.rsn_flags = NM_802_11_AP_SEC_KEY_MGMT_802_1X;
        let settings = ConnectionSettings::for_access_point(&enterprise);

        let dbus = settings.to_dbus();
        assert!(dbus.contains_key("connection"));
        assert!(dbus.contains_key("802-11-wireless"));
        assert!(dbus.contains_key("802-11-wireless-security"));
        assert!(dbus.contains_key("802-1x"));
        assert!(!dbus["connection"].contains_key("autoconnect"));

        let open = ConnectionSettings::for_access_point(&AccessPoint {
            flags: 0,
            rsn_flags: 0,
            ..ap("/ap/2", "Cafe", 40)
        });
        let dbus = open.to_dbus();
        assert!(!dbus.contains_key("802-11-wireless-security"));
        assert!(!dbus.contains_key("802-1x"));
    }
}
