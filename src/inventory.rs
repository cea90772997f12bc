//! Device Inventory (§4.A). Loads device records from an external YAML descriptor, merges each
//! against a `defaults` record, and exposes lookups plus a best-effort reachability probe.

use std::collections::HashMap;
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use device_api::error::{CoreError, InventoryError, ReportError};
use device_api::model::Device;
use serde::Deserialize;

const DEFAULTS_KEY: &str = "defaults";

/// One inventory record as it appears in the YAML document, before merging with `defaults`.
/// Field names mirror the document format (§6), which differs from `Device`'s field names.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawRecord {
    #[serde(default)]
    mgmt_ip: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    ssh_port: Option<u16>,
    #[serde(default)]
    device_type: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// The loaded, merged device set. Read-only once constructed (§3 "Devices are loaded once per
/// run and treated as read-only").
pub struct Inventory {
    devices: HashMap<String, Device>,
}

impl Inventory {
    /// Loads and merges the inventory document at `path`. A missing file is fatal; a malformed
    /// top-level structure is fatal; a malformed individual record is skipped with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).structured(InventoryError::ReadFile {
            path: path.display().to_string(),
        })?;
        Self::parse(&contents)
    }

    /// Parses an already-read inventory document. Split out from [`Self::load`] so tests can
    /// exercise merge/skip behavior without touching the filesystem.
    pub fn parse(contents: &str) -> Result<Self, CoreError> {
        let raw: serde_yaml::Value =
            serde_yaml::from_str(contents).structured(InventoryError::MalformedTopLevel)?;
        let mapping = raw
            .as_mapping()
            .ok_or(())
            .structured(InventoryError::MalformedTopLevel)?;

        let defaults: RawRecord = mapping
            .get(DEFAULTS_KEY)
            .map(|v| serde_yaml::from_value(v.clone()))
            .transpose()
            .unwrap_or(None)
            .unwrap_or_default();

        let mut devices = HashMap::new();
        for (key, value) in mapping {
            let Some(name) = key.as_str() else {
                log::warn!("skipping inventory entry with non-string key: {key:?}");
                continue;
            };
            if name == DEFAULTS_KEY {
                continue;
            }

            match serde_yaml::from_value::<RawRecord>(value.clone()) {
                Ok(record) => devices.insert(name.to_string(), merge(name, &defaults, &record)),
                Err(e) => {
                    log::warn!("skipping malformed inventory record '{name}': {e}");
                    continue;
                }
            };
        }

        Ok(Inventory { devices })
    }

    /// Returns the merged record for `name`, if present.
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Returns every device with a usable management address, sorted by name for a stable order.
    pub fn list_usable(&self) -> Vec<&Device> {
        let mut usable: Vec<&Device> = self.devices.values().filter(|d| d.is_usable()).collect();
        usable.sort_by(|a, b| a.name.cmp(&b.name));
        usable
    }

    /// Returns every device, sorted by name.
    pub fn list_all(&self) -> Vec<&Device> {
        let mut all: Vec<&Device> = self.devices.values().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Performs a best-effort TCP reachability probe for each of `candidates` in parallel, bounded
    /// to [`device_api::constants::REACHABILITY_CONCURRENCY`] concurrent attempts. Never raises for
    /// an individual failure; devices not found in the inventory are reported unreachable.
    pub fn reachable_subset(&self, candidates: &[&str]) -> HashMap<String, bool> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(device_api::constants::REACHABILITY_CONCURRENCY)
            .build()
            .expect("failed to build reachability thread pool");

        pool.install(|| {
            use rayon::prelude::*;
            candidates
                .par_iter()
                .map(|name| {
                    let reachable = self
                        .get(name)
                        .map(|device| probe_tcp(&device.mgmt_address, device.port))
                        .unwrap_or(false);
                    (name.to_string(), reachable)
                })
                .collect()
        })
    }
}

fn probe_tcp(host: &str, port: u16) -> bool {
    let Ok(addr) = format!("{host}:{port}").parse() else {
        return false;
    };
    TcpStream::connect_timeout(&addr, Duration::from_secs(3)).is_ok()
}

fn merge(name: &str, defaults: &RawRecord, specific: &RawRecord) -> Device {
    Device {
        name: name.to_string(),
        mgmt_address: specific
            .mgmt_ip
            .clone()
            .or_else(|| defaults.mgmt_ip.clone())
            .unwrap_or_default(),
        username: specific
            .username
            .clone()
            .or_else(|| defaults.username.clone())
            .unwrap_or_default(),
        password: specific
            .password
            .clone()
            .or_else(|| defaults.password.clone())
            .unwrap_or_default(),
        port: specific.ssh_port.or(defaults.ssh_port).unwrap_or(22),
        device_type: specific.device_type.clone().or_else(|| defaults.device_type.clone()),
        status: specific.status.clone().or_else(|| defaults.status.clone()),
        location: specific.location.clone().or_else(|| defaults.location.clone()),
        role: specific.role.clone().or_else(|| defaults.role.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn merges_defaults_with_device_specific_overrides() {
        let doc = indoc! {"
            defaults:
              username: admin
              password: secret
              ssh_port: 22
            LEAF-A:
              mgmt_ip: 10.0.0.1
            LEAF-B:
              mgmt_ip: 10.0.0.2
              username: other
              ssh_port: 2222
        "};
        let inventory = Inventory::parse(doc).unwrap();
        let a = inventory.get("LEAF-A").unwrap();
        assert_eq!(a.username, "admin");
        assert_eq!(a.port, 22);
        let b = inventory.get("LEAF-B").unwrap();
        assert_eq!(b.username, "other");
        assert_eq!(b.port, 2222);
        assert_eq!(b.password, "secret");
    }

    #[test]
    fn placeholder_mgmt_address_is_not_usable() {
        let doc = indoc! {"
            defaults: {}
            LEAF-A:
              mgmt_ip: TBD
            LEAF-B:
              mgmt_ip: 10.0.0.2
        "};
        let inventory = Inventory::parse(doc).unwrap();
        let usable: Vec<&str> = inventory.list_usable().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(usable, vec!["LEAF-B"]);
    }

    #[test]
    fn malformed_record_is_skipped_not_fatal() {
        let doc = indoc! {"
            defaults: {}
            LEAF-A:
              mgmt_ip: 10.0.0.1
            LEAF-B: this is not a mapping
        "};
        let inventory = Inventory::parse(doc).unwrap();
        assert_eq!(inventory.len(), 1);
        assert!(inventory.get("LEAF-A").is_some());
        assert!(inventory.get("LEAF-B").is_none());
    }

    #[test]
    fn malformed_top_level_is_fatal() {
        let err = Inventory::parse("- just\n- a\n- list\n").unwrap_err();
        assert!(matches!(err.kind(), device_api::error::ErrorKind::Inventory(_)));
    }

    #[test]
    fn unreachable_device_is_reported_false_without_panicking() {
        let doc = indoc! {"
            defaults: {}
            LEAF-A:
              mgmt_ip: 203.0.113.1
              ssh_port: 1
        "};
        let inventory = Inventory::parse(doc).unwrap();
        let result = inventory.reachable_subset(&["LEAF-A", "NOT-IN-INVENTORY"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result["NOT-IN-INVENTORY"], false);
    }
}
