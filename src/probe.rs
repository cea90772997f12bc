//! Probe & Parse Pipeline (§4.D). Phase 1 collects raw artifacts from every usable device in
//! parallel; Phase 2 walks the raw tree by naming convention and parses each artifact.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use device_api::constants::{
    CMD_SHOW_BD_INSTANCES, CMD_SHOW_LACP_XML, CMD_SHOW_LLDP_NEIGHBORS, CMD_SHOW_VLAN_CONFIG,
    DEFAULT_PROMPT_TIMEOUT_SECS, DEFAULT_XML_TIMEOUT_SECS, PROBE_CONCURRENCY, PROBE_INTER_COMMAND_SETTLE_MS,
};
use device_api::error::CoreError;
use device_api::model::{ArtifactCounts, Device, DeviceOutcome, DeviceOutcomeStatus, ProbeSummary};
use device_session::{Session, ShellTransport};
use serde::Serialize;

use crate::inventory::Inventory;

/// The four artifacts Phase 1 collects, in collection order. Bridge-domain and VLAN artifacts
/// land under `raw/bridge_domain_raw/` per §6.
const ARTIFACTS: &[&str] = &["lacp_xml", "lldp", "bridge_domain", "vlan"];

/// What Phase 1 needs from a device conversation.
pub trait ProbeSession {
    fn collect_xml(&mut self, command: &str) -> Result<String, CoreError>;
    fn send_until_prompt(&mut self, command: &str) -> Result<String, CoreError>;
}

impl<T: ShellTransport> ProbeSession for Session<T> {
    fn collect_xml(&mut self, command: &str) -> Result<String, CoreError> {
        Ok(self
            .collect_xml(command, Duration::from_secs(DEFAULT_XML_TIMEOUT_SECS))?
            .output)
    }

    fn send_until_prompt(&mut self, command: &str) -> Result<String, CoreError> {
        self.send_until_prompt(command, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))
    }
}

pub struct ProbeConfig {
    pub raw_dir: PathBuf,
    pub parsed_dir: PathBuf,
}

impl ProbeConfig {
    pub fn bridge_domain_raw_dir(&self) -> PathBuf {
        self.raw_dir.join("bridge_domain_raw")
    }
}

/// Runs Phase 1 against every usable device in `inventory`, then Phase 2 over the resulting raw
/// tree, and returns the combined `ProbeSummary`. Clears the raw directory before Phase 1 so each
/// run starts from a clean slate.
pub fn run(inventory: &Inventory, config: &ProbeConfig) -> Result<ProbeSummary, CoreError> {
    let start = Utc::now();
    let usable = inventory.list_usable();

    clear_raw_directory(&config.raw_dir)?;
    fs::create_dir_all(config.bridge_domain_raw_dir()).ok();
    fs::create_dir_all(&config.parsed_dir).ok();

    let timestamp = start.format("%Y%m%dT%H%M%SZ").to_string();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(PROBE_CONCURRENCY)
        .build()
        .expect("failed to build probe thread pool");

    let mut outcomes: HashMap<String, DeviceOutcome> = pool.install(|| {
        use rayon::prelude::*;
        usable
            .par_iter()
            .map(|device| {
                let outcome = probe_one_device(device, config, &timestamp);
                (device.name.clone(), outcome)
            })
            .collect()
    });

    for device in inventory.list_all() {
        if !device.is_usable() {
            outcomes.insert(device.name.clone(), DeviceOutcome::invalid("device is not usable: placeholder or missing management address"));
        }
    }

    parse_raw_artifacts(&config.raw_dir, &config.parsed_dir, &mut outcomes);

    Ok(ProbeSummary {
        start,
        end: Utc::now(),
        total_devices: inventory.len(),
        usable_devices: usable.len(),
        per_device_outcomes: outcomes,
    })
}

fn clear_raw_directory(raw_dir: &Path) -> Result<(), CoreError> {
    if raw_dir.exists() {
        fs::remove_dir_all(raw_dir).ok();
    }
    fs::create_dir_all(raw_dir).ok();
    Ok(())
}

/// Opens a real session to `device` and runs the fixed Phase 1 command set, settling briefly
/// between commands. Never panics on a connection or command failure — the failure is captured
/// in the returned `DeviceOutcome`.
fn probe_one_device(device: &Device, config: &ProbeConfig, timestamp: &str) -> DeviceOutcome {
    match Session::connect(device) {
        Ok(mut session) => collect_with_session(&mut session, device, config, timestamp),
        Err(e) => DeviceOutcome {
            status: DeviceOutcomeStatus::Failed,
            collected: ARTIFACTS.iter().map(|a| (a.to_string(), false)).collect(),
            parsed: HashMap::new(),
            counts: HashMap::new(),
            errors: vec![format!("connection failed: {e}")],
            warnings: Vec::new(),
        },
    }
}

fn collect_with_session(
    session: &mut impl ProbeSession,
    device: &Device,
    config: &ProbeConfig,
    timestamp: &str,
) -> DeviceOutcome {
    let mut collected = HashMap::new();
    let mut errors = Vec::new();

    let lacp_xml = session.collect_xml(CMD_SHOW_LACP_XML);
    collected.insert(
        "lacp_xml".to_string(),
        write_artifact_result(&lacp_xml, &config.raw_dir, &device.name, "lacp_xml", timestamp, "xml", &mut errors),
    );
    settle();

    let lldp = session.send_until_prompt(CMD_SHOW_LLDP_NEIGHBORS);
    collected.insert(
        "lldp".to_string(),
        write_artifact_result(&lldp, &config.raw_dir, &device.name, "lldp", timestamp, "txt", &mut errors),
    );
    settle();

    let bridge_domain = session.send_until_prompt(CMD_SHOW_BD_INSTANCES);
    collected.insert(
        "bridge_domain".to_string(),
        write_artifact_result(
            &bridge_domain,
            &config.bridge_domain_raw_dir(),
            &device.name,
            "bridge_domain",
            timestamp,
            "txt",
            &mut errors,
        ),
    );
    settle();

    let vlan = session.send_until_prompt(CMD_SHOW_VLAN_CONFIG);
    collected.insert(
        "vlan".to_string(),
        write_artifact_result(
            &vlan,
            &config.bridge_domain_raw_dir(),
            &device.name,
            "vlan",
            timestamp,
            "txt",
            &mut errors,
        ),
    );

    let status = if collected.values().any(|ok| *ok) {
        DeviceOutcomeStatus::Successful
    } else {
        DeviceOutcomeStatus::Failed
    };

    DeviceOutcome {
        status,
        collected,
        parsed: HashMap::new(),
        counts: HashMap::new(),
        errors,
        warnings: Vec::new(),
    }
}

fn settle() {
    std::thread::sleep(Duration::from_millis(PROBE_INTER_COMMAND_SETTLE_MS));
}

fn write_artifact_result(
    result: &Result<String, CoreError>,
    dir: &Path,
    device_name: &str,
    artifact: &str,
    timestamp: &str,
    extension: &str,
    errors: &mut Vec<String>,
) -> bool {
    match result {
        Ok(output) => match write_raw_artifact(dir, device_name, artifact, timestamp, extension, output) {
            Ok(()) => true,
            Err(e) => {
                errors.push(format!("{artifact}: failed to write raw artifact: {e}"));
                false
            }
        },
        Err(e) => {
            errors.push(format!("{artifact}: {e}"));
            false
        }
    }
}

fn write_raw_artifact(
    dir: &Path,
    device_name: &str,
    artifact: &str,
    timestamp: &str,
    extension: &str,
    contents: &str,
) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(raw_artifact_name(device_name, artifact, timestamp, extension));
    fs::write(path, contents)
}

fn raw_artifact_name(device_name: &str, artifact: &str, timestamp: &str, extension: &str) -> String {
    format!("{device_name}_{artifact}_raw_{timestamp}.{extension}")
}

/// Parsed artifact file name: one parsed file per device per artifact, overwritten each run.
fn parsed_artifact_name(device_name: &str, artifact: &str) -> String {
    format!("{device_name}_{artifact}_parsed.json")
}

/// Phase 2: walks `raw_dir` (and its `bridge_domain_raw/` subdirectory) by naming convention,
/// dispatches each file to the matching parser, and writes a parsed JSON artifact. Continues even
/// when some devices produced no raw artifact.
pub fn parse_raw_artifacts(raw_dir: &Path, parsed_dir: &Path, outcomes: &mut HashMap<String, DeviceOutcome>) {
    fs::create_dir_all(parsed_dir).ok();

    for artifact in ARTIFACTS {
        let search_dir = if *artifact == "bridge_domain" || *artifact == "vlan" {
            raw_dir.join("bridge_domain_raw")
        } else {
            raw_dir.to_path_buf()
        };
        let pattern = format!("{}/*_{}_raw_*.*", search_dir.display(), artifact);

        let Ok(paths) = glob::glob(&pattern) else { continue };
        for entry in paths.flatten() {
            let Some(device_name) = device_name_from_raw_path(&entry, artifact) else {
                continue;
            };
            let Ok(contents) = fs::read_to_string(&entry) else {
                continue;
            };

            let (count, parsed_json) = parse_artifact(artifact, &device_name, &contents);
            let parsed_path = parsed_dir.join(parsed_artifact_name(&device_name, artifact));
            let parse_ok = fs::write(&parsed_path, parsed_json).is_ok();

            let outcome = outcomes.entry(device_name.clone()).or_insert_with(|| DeviceOutcome {
                status: DeviceOutcomeStatus::Successful,
                collected: HashMap::new(),
                parsed: HashMap::new(),
                counts: HashMap::new(),
                errors: Vec::new(),
                warnings: Vec::new(),
            });
            outcome.parsed.insert(artifact.to_string(), parse_ok);
            outcome.counts.insert(
                artifact.to_string(),
                ArtifactCounts {
                    collected: 1,
                    parsed: count,
                },
            );
        }
    }
}

fn device_name_from_raw_path(path: &Path, artifact: &str) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let marker = format!("_{artifact}_raw_");
    let idx = file_name.find(&marker)?;
    Some(file_name[..idx].to_string())
}

fn parse_artifact(artifact: &str, device_name: &str, contents: &str) -> (usize, String) {
    match artifact {
        "lacp_xml" => {
            let bundles = device_parsers::xml::parse_lacp_xml(device_name, contents);
            (bundles.len(), serde_json::to_string_pretty(&bundles).unwrap_or_default())
        }
        "lldp" => {
            let neighbors = device_parsers::lldp::parse_lldp_neighbors(device_name, contents);
            (neighbors.len(), serde_json::to_string_pretty(&neighbors).unwrap_or_default())
        }
        "bridge_domain" => {
            let instances = device_parsers::bridge_domain::parse_bridge_domain_instances(device_name, contents);
            (instances.len(), serde_json::to_string_pretty(&instances).unwrap_or_default())
        }
        "vlan" => {
            let configs = device_parsers::vlan::parse_vlan_config(device_name, contents);
            (configs.len(), serde_json::to_string_pretty(&configs).unwrap_or_default())
        }
        _ => (0, "[]".to_string()),
    }
}

/// Renders the human-readable text summary (§6 "Probe summary outputs").
pub fn render_text_summary(summary: &ProbeSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Probe run {} -> {}\n",
        summary.start.to_rfc3339(),
        summary.end.to_rfc3339()
    ));
    out.push_str(&format!(
        "devices: {} total, {} usable, {} successful, {} failed, {} invalid\n",
        summary.total_devices,
        summary.usable_devices,
        summary.successful(),
        summary.failed(),
        summary.invalid()
    ));
    let mut names: Vec<&String> = summary.per_device_outcomes.keys().collect();
    names.sort();
    for name in names {
        let outcome = &summary.per_device_outcomes[name];
        out.push_str(&format!("  {name}: {:?}\n", outcome.status));
        for error in &outcome.errors {
            out.push_str(&format!("    error: {error}\n"));
        }
    }
    out
}

/// Counts section of the machine-readable status document (§6 "a `summary` object (counts as
/// defined in §3)").
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_devices: usize,
    pub usable_devices: usize,
    pub successful: usize,
    pub failed: usize,
    pub invalid: usize,
}

/// The machine-readable probe status document (§6): a `summary` object plus a `devices` map from
/// device name to its full `DeviceOutcome`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusDocument {
    pub summary: StatusSummary,
    pub devices: HashMap<String, DeviceOutcome>,
}

/// Builds the machine-readable status document from a `ProbeSummary`.
pub fn status_document(summary: &ProbeSummary) -> StatusDocument {
    StatusDocument {
        summary: StatusSummary {
            start: summary.start,
            end: summary.end,
            total_devices: summary.total_devices,
            usable_devices: summary.usable_devices,
            successful: summary.successful(),
            failed: summary.failed(),
            invalid: summary.invalid(),
        },
        devices: summary.per_device_outcomes.clone(),
    }
}

/// Renders the status document as pretty JSON, the form written to disk by the probe entry point.
pub fn render_status_document(summary: &ProbeSummary) -> Result<String, anyhow::Error> {
    Ok(serde_json::to_string_pretty(&status_document(summary))?)
}

/// Writes the status document to `path`, creating parent directories as needed.
pub fn write_status_document(summary: &ProbeSummary, path: &Path) -> Result<(), anyhow::Error> {
    let rendered = render_status_document(summary)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    fs::write(path, rendered)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedSession {
        responses: HashMap<&'static str, &'static str>,
    }

    impl ProbeSession for FixedSession {
        fn collect_xml(&mut self, command: &str) -> Result<String, CoreError> {
            Ok(self.responses.get(command).copied().unwrap_or_default().to_string())
        }

        fn send_until_prompt(&mut self, command: &str) -> Result<String, CoreError> {
            Ok(self.responses.get(command).copied().unwrap_or_default().to_string())
        }
    }

    fn sample_device() -> Device {
        Device {
            name: "LEAF-A".to_string(),
            mgmt_address: "10.0.0.1".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            port: 22,
            device_type: None,
            status: None,
            location: None,
            role: None,
        }
    }

    #[test]
    fn collect_with_session_writes_all_four_artifacts() {
        let dir = tempdir().unwrap();
        let config = ProbeConfig {
            raw_dir: dir.path().join("raw"),
            parsed_dir: dir.path().join("parsed"),
        };
        let mut session = FixedSession {
            responses: HashMap::from([
                (CMD_SHOW_LACP_XML, "<config></config>"),
                (CMD_SHOW_LLDP_NEIGHBORS, "Interface | Neighbor\n"),
                (CMD_SHOW_BD_INSTANCES, "network-services bridge-domain instance g_v300\n"),
                (CMD_SHOW_VLAN_CONFIG, "interfaces ge100-0/0/5.300 vlan-id 300\n"),
            ]),
        };
        let outcome = collect_with_session(&mut session, &sample_device(), &config, "20260101T000000Z");
        assert_eq!(outcome.status, DeviceOutcomeStatus::Successful);
        assert!(outcome.collected.values().all(|ok| *ok));
        assert!(dir
            .path()
            .join("raw")
            .join("LEAF-A_lacp_xml_raw_20260101T000000Z.xml")
            .exists());
        assert!(dir
            .path()
            .join("raw")
            .join("bridge_domain_raw")
            .join("LEAF-A_vlan_raw_20260101T000000Z.txt")
            .exists());
    }

    #[test]
    fn raw_artifact_naming_matches_convention() {
        assert_eq!(
            raw_artifact_name("LEAF-A", "lldp", "20260101T000000Z", "txt"),
            "LEAF-A_lldp_raw_20260101T000000Z.txt"
        );
    }

    #[test]
    fn parse_raw_artifacts_populates_counts_from_glob_matches() {
        let dir = tempdir().unwrap();
        let raw_dir = dir.path().join("raw");
        let bd_dir = raw_dir.join("bridge_domain_raw");
        fs::create_dir_all(&bd_dir).unwrap();
        fs::write(
            raw_dir.join("LEAF-A_lldp_raw_20260101T000000Z.txt"),
            "Interface | Neighbor\nge0 | LEAF-B | ge1 | 120\n",
        )
        .unwrap();
        fs::write(
            bd_dir.join("LEAF-A_vlan_raw_20260101T000000Z.txt"),
            "interfaces ge100-0/0/5.300 vlan-id 300\n",
        )
        .unwrap();

        let parsed_dir = dir.path().join("parsed");
        let mut outcomes = HashMap::new();
        parse_raw_artifacts(&raw_dir, &parsed_dir, &mut outcomes);

        let outcome = outcomes.get("LEAF-A").unwrap();
        assert_eq!(outcome.parsed.get("lldp"), Some(&true));
        assert_eq!(outcome.parsed.get("vlan"), Some(&true));
        assert!(parsed_dir.join("LEAF-A_lldp_parsed.json").exists());
    }

    #[test]
    fn device_name_is_recovered_from_raw_file_name() {
        let path = Path::new("raw/LEAF-A_lacp_xml_raw_20260101T000000Z.xml");
        assert_eq!(device_name_from_raw_path(path, "lacp_xml"), Some("LEAF-A".to_string()));
    }

    /// S4 / §8 property 5 — probe summary totals are conserved: every device in the inventory
    /// ends up counted as exactly one of successful/failed/invalid, including devices never probed
    /// because they had no usable management address.
    #[test]
    fn probe_run_accounts_for_every_device_including_placeholders() {
        let inventory = Inventory::parse(indoc::indoc! {"
            defaults:
              username: admin
              password: secret
            LEAF-PLACEHOLDER:
              mgmt_ip: TBD
        "})
        .unwrap();
        let dir = tempdir().unwrap();
        let config = ProbeConfig {
            raw_dir: dir.path().join("raw"),
            parsed_dir: dir.path().join("parsed"),
        };

        let summary = run(&inventory, &config).unwrap();

        assert_eq!(summary.total_devices, 1);
        assert_eq!(summary.usable_devices, 0);
        assert_eq!(summary.invalid(), 1);
        assert_eq!(summary.successful() + summary.failed() + summary.invalid(), summary.total_devices);
    }

    fn sample_summary() -> ProbeSummary {
        let mut per_device_outcomes = HashMap::new();
        per_device_outcomes.insert(
            "LEAF-A".to_string(),
            DeviceOutcome {
                status: DeviceOutcomeStatus::Successful,
                collected: HashMap::from([("lacp_xml".to_string(), true)]),
                parsed: HashMap::from([("lacp_xml".to_string(), true)]),
                counts: HashMap::from([("lacp_xml".to_string(), ArtifactCounts { collected: 1, parsed: 2 })]),
                errors: Vec::new(),
                warnings: Vec::new(),
            },
        );
        ProbeSummary {
            start: Utc::now(),
            end: Utc::now(),
            total_devices: 1,
            usable_devices: 1,
            per_device_outcomes,
        }
    }

    #[test]
    fn status_document_carries_summary_counts_and_device_map() {
        let doc = status_document(&sample_summary());
        assert_eq!(doc.summary.total_devices, 1);
        assert_eq!(doc.summary.successful, 1);
        assert_eq!(doc.summary.failed, 0);
        assert!(doc.devices.contains_key("LEAF-A"));
    }

    #[test]
    fn status_document_renders_as_json_with_summary_and_devices_keys() {
        let rendered = render_status_document(&sample_summary()).unwrap();
        assert!(rendered.contains("\"summary\""));
        assert!(rendered.contains("\"devices\""));
        assert!(rendered.contains("LEAF-A"));
    }

    #[test]
    fn write_status_document_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("status").join("probe_status.json");
        write_status_document(&sample_summary(), &path).unwrap();
        assert!(path.exists());
    }
}
