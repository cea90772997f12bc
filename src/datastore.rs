//! Database Updater (§4.H). Wraps a `sqlite` connection holding three tables: interface records,
//! bridge-domain rows with a JSON discovery blob, and bridge-domain/interface associations.
//! Shape only — this is not the NOS's real schema, just the surface §6's store contract names.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use device_api::error::{CoreError, ReportError, StoreError};
use device_api::model::{DeviceConfigSnapshot, InterfaceRecord, SyncResult};
use serde::{Deserialize, Serialize};

const SYNC_ANNOTATION: &str = "updated by drift sync";

pub struct Store {
    db: sqlite::Connection,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let db = sqlite::open(path).structured(StoreError::Open {
            path: path.display().to_string(),
        })?;
        Self::init_schema(&db)?;
        Ok(Store { db })
    }

    /// Opens an in-memory store, used by tests and by one-shot CLI invocations that don't need
    /// a persistent file.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        let db = sqlite::open(":memory:").structured(StoreError::Open {
            path: ":memory:".to_string(),
        })?;
        Self::init_schema(&db)?;
        Ok(Store { db })
    }

    fn init_schema(db: &sqlite::Connection) -> Result<(), CoreError> {
        db.execute(
            "CREATE TABLE IF NOT EXISTS interface_records (
                device_name TEXT NOT NULL,
                interface_name TEXT NOT NULL,
                vlan_id INTEGER,
                admin_status TEXT,
                oper_status TEXT,
                l2_service_enabled INTEGER NOT NULL DEFAULT 0,
                description TEXT,
                raw_cli_lines TEXT NOT NULL DEFAULT '[]',
                updated_at TEXT NOT NULL,
                PRIMARY KEY (device_name, interface_name)
            )",
        )
        .structured(StoreError::Unavailable)?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS bridge_domains (
                name TEXT PRIMARY KEY,
                discovery_data TEXT NOT NULL DEFAULT '{}',
                updated_at TEXT NOT NULL
            )",
        )
        .structured(StoreError::Unavailable)?;

        db.execute(
            "CREATE TABLE IF NOT EXISTS bridge_domain_interfaces (
                bridge_domain_name TEXT NOT NULL,
                device_name TEXT NOT NULL,
                interface_name TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (bridge_domain_name, device_name, interface_name)
            )",
        )
        .structured(StoreError::Unavailable)?;

        Ok(())
    }

    /// Upserts each record by (device-name, interface-name). Per-record failures are
    /// accumulated in the result rather than raised; only a connection-level failure raises.
    pub fn update_interface_records(&mut self, records: &[InterfaceRecord]) -> SyncResult {
        let start = Instant::now();
        let mut added = 0;
        let mut updated = 0;
        let mut skipped = 0;
        let mut per_record_errors = Vec::new();

        for record in records {
            match self.upsert_interface_record(record) {
                Ok(true) => added += 1,
                Ok(false) => updated += 1,
                Err(e) => {
                    skipped += 1;
                    per_record_errors.push(format!("{}/{}: {e}", record.device_name, record.interface_name));
                }
            }
        }

        SyncResult {
            ok: per_record_errors.is_empty(),
            added,
            updated,
            skipped,
            per_record_errors,
            duration: start.elapsed(),
        }
    }

    /// Returns `Ok(true)` if the record was newly inserted, `Ok(false)` if an existing row was
    /// updated.
    fn upsert_interface_record(&self, record: &InterfaceRecord) -> Result<bool, CoreError> {
        let existed = self.interface_record_exists(&record.device_name, &record.interface_name)?;
        let err = || StoreError::UpsertInterface {
            device: record.device_name.clone(),
            interface: record.interface_name.clone(),
        };
        let description = match &record.description {
            Some(d) if !d.is_empty() => format!("{d} ({SYNC_ANNOTATION})"),
            _ => SYNC_ANNOTATION.to_string(),
        };
        let raw_cli_lines = serde_json::to_string(&record.raw_cli_lines).structured(err())?;

        let mut statement = self
            .db
            .prepare(
                "INSERT INTO interface_records
                    (device_name, interface_name, vlan_id, admin_status, oper_status,
                     l2_service_enabled, description, raw_cli_lines, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))
                 ON CONFLICT(device_name, interface_name) DO UPDATE SET
                    vlan_id = excluded.vlan_id,
                    admin_status = excluded.admin_status,
                    oper_status = excluded.oper_status,
                    l2_service_enabled = excluded.l2_service_enabled,
                    description = excluded.description,
                    raw_cli_lines = excluded.raw_cli_lines,
                    updated_at = datetime('now')",
            )
            .structured(err())?;

        statement.bind((1, record.device_name.as_str())).structured(err())?;
        statement.bind((2, record.interface_name.as_str())).structured(err())?;
        statement.bind((3, record.vlan_id.map(i64::from))).structured(err())?;
        statement.bind((4, record.admin_status.as_deref())).structured(err())?;
        statement.bind((5, record.oper_status.as_deref())).structured(err())?;
        statement.bind((6, record.l2_service_enabled as i64)).structured(err())?;
        statement.bind((7, description.as_str())).structured(err())?;
        statement.bind((8, raw_cli_lines.as_str())).structured(err())?;
        statement.next().structured(err())?;

        Ok(!existed)
    }

    fn interface_record_exists(&self, device_name: &str, interface_name: &str) -> Result<bool, CoreError> {
        let err = || StoreError::UpsertInterface {
            device: device_name.to_string(),
            interface: interface_name.to_string(),
        };
        let mut statement = self
            .db
            .prepare("SELECT 1 FROM interface_records WHERE device_name = ? AND interface_name = ?")
            .structured(err())?;
        statement.bind((1, device_name)).structured(err())?;
        statement.bind((2, interface_name)).structured(err())?;
        Ok(statement.next().structured(err())? == sqlite::State::Row)
    }

    /// Loads `bd_name`'s discovery blob, updates (or adds) `new_interface`'s section under its
    /// device, and writes the blob back with a refreshed timestamp. Idempotent: re-applying the
    /// same interface yields the same blob contents.
    pub fn update_bridge_domain_discovery_blob(&mut self, bd_name: &str, new_interface: &InterfaceRecord) -> bool {
        let mut blob = match self.load_discovery_blob(bd_name) {
            Ok(blob) => blob,
            Err(e) => {
                log::warn!("failed to load discovery blob for {bd_name}: {e}");
                return false;
            }
        };

        let device_section = blob
            .by_device
            .entry(new_interface.device_name.clone())
            .or_default();

        match device_section.iter_mut().find(|i| i.interface_name == new_interface.interface_name) {
            Some(existing) => {
                existing.vlan_id = new_interface.vlan_id;
                existing.admin_status = new_interface.admin_status.clone();
                existing.raw_cli_lines = new_interface.raw_cli_lines.clone();
            }
            None => device_section.push(BlobInterface {
                interface_name: new_interface.interface_name.clone(),
                vlan_id: new_interface.vlan_id,
                admin_status: new_interface.admin_status.clone(),
                raw_cli_lines: new_interface.raw_cli_lines.clone(),
            }),
        }

        self.save_discovery_blob(bd_name, &blob).is_ok()
    }

    fn load_discovery_blob(&self, bd_name: &str) -> Result<DiscoveryBlob, CoreError> {
        let err = || StoreError::DiscoveryBlob { name: bd_name.to_string() };
        let mut statement = self
            .db
            .prepare("SELECT discovery_data FROM bridge_domains WHERE name = ?")
            .structured(err())?;
        statement.bind((1, bd_name)).structured(err())?;

        if statement.next().structured(err())? == sqlite::State::Row {
            let raw: String = statement.read(0).structured(err())?;
            serde_json::from_str(&raw).structured(err())
        } else {
            Ok(DiscoveryBlob::default())
        }
    }

    fn save_discovery_blob(&self, bd_name: &str, blob: &DiscoveryBlob) -> Result<(), CoreError> {
        let err = || StoreError::DiscoveryBlob { name: bd_name.to_string() };
        let raw = serde_json::to_string(blob).structured(err())?;
        let mut statement = self
            .db
            .prepare(
                "INSERT INTO bridge_domains (name, discovery_data, updated_at)
                 VALUES (?, ?, datetime('now'))
                 ON CONFLICT(name) DO UPDATE SET
                    discovery_data = excluded.discovery_data,
                    updated_at = datetime('now')",
            )
            .structured(err())?;
        statement.bind((1, bd_name)).structured(err())?;
        statement.bind((2, raw.as_str())).structured(err())?;
        statement.next().structured(err())?;
        Ok(())
    }

    /// Validates `snapshot` carries a name and at least one bridge domain, inserts/updates the
    /// bridge-domain row and its interface associations, then synchronizes `interface_records`
    /// for coherence.
    pub fn populate_bridge_domain(&mut self, snapshot: &DeviceConfigSnapshot) -> SyncResult {
        let start = Instant::now();
        if snapshot.device_name.is_empty() || snapshot.bridge_domains.is_empty() {
            return SyncResult {
                ok: false,
                added: 0,
                updated: 0,
                skipped: 0,
                per_record_errors: vec!["snapshot missing device name or bridge-domain data".to_string()],
                duration: start.elapsed(),
            };
        }

        let mut added = 0;
        let mut updated = 0;
        let mut per_record_errors = Vec::new();

        for bd in &snapshot.bridge_domains {
            let bd_existed = match self.load_discovery_blob(&bd.name) {
                Ok(blob) => !blob.by_device.is_empty(),
                Err(_) => false,
            };

            for (device_name, interface_name) in &bd.interfaces {
                if device_name != &snapshot.device_name {
                    continue;
                }
                if let Err(e) = self.upsert_bd_interface_association(&bd.name, device_name, interface_name) {
                    per_record_errors.push(format!("{}/{}: {e}", bd.name, interface_name));
                    continue;
                }

                let record = InterfaceRecord {
                    device_name: device_name.clone(),
                    interface_name: interface_name.clone(),
                    interface_kind: device_api::model::InterfaceKind::Unknown,
                    vlan_id: bd.primary_vlan,
                    admin_status: None,
                    oper_status: None,
                    bundle_id: None,
                    subinterface_id: None,
                    l2_service_enabled: true,
                    description: None,
                    raw_cli_lines: Vec::new(),
                    source: device_api::model::DiscoverySource::Merged,
                };
                self.update_bridge_domain_discovery_blob(&bd.name, &record);
                match self.upsert_interface_record(&record) {
                    Ok(true) => added += 1,
                    Ok(false) => updated += 1,
                    Err(e) => per_record_errors.push(format!("{}/{}: {e}", device_name, interface_name)),
                }
            }

            if !bd_existed {
                added += 1;
            } else {
                updated += 1;
            }
        }

        SyncResult {
            ok: per_record_errors.is_empty(),
            added,
            updated,
            skipped: 0,
            per_record_errors,
            duration: start.elapsed(),
        }
    }

    fn upsert_bd_interface_association(
        &self,
        bd_name: &str,
        device_name: &str,
        interface_name: &str,
    ) -> Result<(), CoreError> {
        let err = || StoreError::UpsertBridgeDomain { name: bd_name.to_string() };
        let mut statement = self
            .db
            .prepare(
                "INSERT INTO bridge_domain_interfaces
                    (bridge_domain_name, device_name, interface_name, updated_at)
                 VALUES (?, ?, ?, datetime('now'))
                 ON CONFLICT(bridge_domain_name, device_name, interface_name) DO UPDATE SET
                    updated_at = datetime('now')",
            )
            .structured(err())?;
        statement.bind((1, bd_name)).structured(err())?;
        statement.bind((2, device_name)).structured(err())?;
        statement.bind((3, interface_name)).structured(err())?;
        statement.next().structured(err())?;
        Ok(())
    }
}

/// Rust resolves `self.update_interface_records(records)` below to the inherent method above,
/// which takes a slice; inherent methods always win over trait methods of the same name, so this
/// does not recurse.
impl crate::resolver::InterfaceUpdater for Store {
    fn update_interface_records(&mut self, records: Vec<InterfaceRecord>) -> SyncResult {
        self.update_interface_records(&records)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DiscoveryBlob {
    #[serde(default)]
    by_device: HashMap<String, Vec<BlobInterface>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct BlobInterface {
    interface_name: String,
    #[serde(default)]
    vlan_id: Option<u16>,
    #[serde(default)]
    admin_status: Option<String>,
    #[serde(default)]
    raw_cli_lines: Vec<String>,
}
