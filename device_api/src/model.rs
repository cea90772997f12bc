//! The data model shared by every component (§3). Plain value types; no component-specific
//! logic lives here beyond small, obviously-total helpers (e.g. `Device::is_usable`).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::{is_placeholder, validate_vlan_range};

/// A single fleet device, merged from its inventory record and the `defaults` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(default)]
    pub mgmt_address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

fn default_ssh_port() -> u16 {
    22
}

impl Device {
    /// A device is usable only if its management address is present and not a placeholder.
    pub fn is_usable(&self) -> bool {
        !is_placeholder(&self.mgmt_address)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceKind {
    Physical,
    Bundle,
    Subinterface,
    Unknown,
}

impl Default for InterfaceKind {
    fn default() -> Self {
        InterfaceKind::Unknown
    }
}

/// Which discovery path produced a record, so downstream consumers can break ties (§4.E).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoverySource {
    RunningConfig,
    InterfaceTable,
    /// Merged from both streams, running-config preferred.
    Merged,
    InterfaceNameSuffix,
    BridgeDomainName,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub device_name: String,
    pub interface_name: String,
    #[serde(default)]
    pub interface_kind: InterfaceKind,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub admin_status: Option<String>,
    #[serde(default)]
    pub oper_status: Option<String>,
    #[serde(default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub subinterface_id: Option<String>,
    #[serde(default)]
    pub l2_service_enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub raw_cli_lines: Vec<String>,
    pub source: DiscoverySource,
}

impl InterfaceRecord {
    /// Sets `vlan_id`, discarding (and signalling) any out-of-range value rather than letting it
    /// override an existing value. See the VLAN range invariant in §3.
    pub fn set_vlan_checked(&mut self, vlan: u16) -> bool {
        if validate_vlan_range(vlan) {
            self.vlan_id = Some(vlan);
            true
        } else {
            log::warn!(
                "discarding out-of-range vlan id {vlan} for {}/{}",
                self.device_name,
                self.interface_name
            );
            false
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LacpStatus {
    Active,
    Standby,
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LacpBundle {
    pub bundle_name: String,
    pub device_name: String,
    #[serde(default)]
    pub local_key: Option<String>,
    #[serde(default)]
    pub peer_key: Option<String>,
    #[serde(default)]
    pub peer_system_id: Option<String>,
    pub member_interfaces: Vec<String>,
    pub status: LacpStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LldpNeighbor {
    pub local_device: String,
    pub local_interface: String,
    pub neighbor_system_name: String,
    pub neighbor_interface: String,
    pub ttl: Option<String>,
}

impl LldpNeighbor {
    /// The unordered endpoint pair identifying the physical link this neighbor record implies.
    /// Two records with swapped endpoints produce the same key (§8, property 4).
    pub fn link_key(&self) -> ((String, String), (String, String)) {
        let a = (self.local_device.clone(), self.local_interface.clone());
        let b = (
            self.neighbor_system_name.clone(),
            self.neighbor_interface.clone(),
        );
        if a <= b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyType {
    P2p,
    P2mp,
    Unknown,
}

impl Default for TopologyType {
    fn default() -> Self {
        TopologyType::Unknown
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgeDomainScope {
    Global,
    Local,
    Unknown,
}

impl Default for BridgeDomainScope {
    fn default() -> Self {
        BridgeDomainScope::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BridgeDomainInstance {
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub primary_vlan: Option<u16>,
    #[serde(default)]
    pub dnaas_type: Option<String>,
    #[serde(default)]
    pub topology_type: TopologyType,
    #[serde(default)]
    pub scope: BridgeDomainScope,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<(String, String)>,
    #[serde(default)]
    pub admin_state_enabled: Option<bool>,
}

impl BridgeDomainInstance {
    /// Adds an interface to the instance, deduplicating by (device, interface).
    pub fn add_interface(&mut self, device_name: impl Into<String>, interface_name: impl Into<String>) {
        let entry = (device_name.into(), interface_name.into());
        if !self.interfaces.contains(&entry) {
            if !self.devices.contains(&entry.0) {
                self.devices.push(entry.0.clone());
            }
            self.interfaces.push(entry);
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VlanKind {
    Subinterface,
    Manipulation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanConfig {
    pub device_name: String,
    pub interface_name: String,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    pub kind: VlanKind,
    pub raw_line: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Query,
    CommitCheck,
    Commit,
    Immediate,
    DryRun,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub deployment_id: String,
    pub per_device_commands: HashMap<String, Vec<String>>,
    pub execution_mode: ExecutionMode,
    pub parallel: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl DeploymentPlan {
    /// Replaces a device's command list with the empty sequence, as drift resolution's `skip`
    /// effect requires (§4.I Stage 1.5).
    pub fn clear_device_commands(&mut self, device_name: &str) {
        if let Some(commands) = self.per_device_commands.get_mut(device_name) {
            commands.clear();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub command: String,
    pub success: bool,
    pub output: String,
    pub duration: Duration,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub device_name: String,
    pub execution_mode: ExecutionMode,
    pub success: bool,
    #[serde(default)]
    pub per_command_results: Vec<CommandOutcome>,
    pub total_duration: Duration,
    #[serde(default)]
    pub aggregated_output: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub connection_ok: bool,
    #[serde(default)]
    pub commit_check_passed: Option<bool>,
    #[serde(default)]
    pub configuration_applied: bool,
}

impl ExecutionResult {
    pub fn failed(device_name: impl Into<String>, mode: ExecutionMode, error_message: impl Into<String>) -> Self {
        ExecutionResult {
            device_name: device_name.into(),
            execution_mode: mode,
            success: false,
            per_command_results: Vec::new(),
            total_duration: Duration::default(),
            aggregated_output: String::new(),
            error_message: Some(error_message.into()),
            connection_ok: false,
            commit_check_passed: None,
            configuration_applied: false,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftType {
    InterfaceAlreadyConfigured,
    BridgeDomainAlreadyExists,
    VlanConflict,
    ConfigurationMismatch,
    Unknown,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    CommitCheck,
    DeploymentResult,
    ValidationFailure,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub drift_type: DriftType,
    pub device_name: String,
    #[serde(default)]
    pub interface_name: Option<String>,
    #[serde(default)]
    pub expected_config: String,
    #[serde(default)]
    pub actual_config: String,
    pub detection_source: DetectionSource,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Skip,
    Override,
    Synced,
    Abort,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResolution {
    pub action: SyncAction,
    #[serde(default)]
    pub discovered_records: Vec<InterfaceRecord>,
    #[serde(default)]
    pub sync_result: Option<SyncResult>,
    pub operator_choice: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub ok: bool,
    pub added: usize,
    pub updated: usize,
    pub skipped: usize,
    #[serde(default)]
    pub per_record_errors: Vec<String>,
    pub duration: Duration,
}

impl SyncResult {
    pub fn empty_ok() -> Self {
        SyncResult {
            ok: true,
            added: 0,
            updated: 0,
            skipped: 0,
            per_record_errors: Vec::new(),
            duration: Duration::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceOutcomeStatus {
    Successful,
    Failed,
    Invalid,
}

/// The orchestrator's final result for one deployment run (§3, §4.I).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub deployment_id: String,
    pub success: bool,
    #[serde(default)]
    pub execution_results: HashMap<String, ExecutionResult>,
    #[serde(default)]
    pub commit_check_map: HashMap<String, bool>,
    #[serde(default)]
    pub validation_map: HashMap<String, bool>,
    #[serde(default)]
    pub drift_events: Vec<DriftEvent>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub total_duration: Duration,
}

impl DeploymentResult {
    pub fn aborted(deployment_id: impl Into<String>, reason: impl Into<String>) -> Self {
        DeploymentResult {
            deployment_id: deployment_id.into(),
            success: false,
            execution_results: HashMap::new(),
            commit_check_map: HashMap::new(),
            validation_map: HashMap::new(),
            drift_events: Vec::new(),
            errors: vec![reason.into()],
            warnings: Vec::new(),
            total_duration: Duration::default(),
        }
    }
}

/// A single device's full bridge-domain inventory, as produced by `discover_device_full` (§4.E).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DeviceConfigSnapshot {
    pub device_name: String,
    pub bridge_domains: Vec<BridgeDomainInstance>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ArtifactCounts {
    pub collected: usize,
    pub parsed: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceOutcome {
    pub status: DeviceOutcomeStatus,
    #[serde(default)]
    pub collected: HashMap<String, bool>,
    #[serde(default)]
    pub parsed: HashMap<String, bool>,
    #[serde(default)]
    pub counts: HashMap<String, ArtifactCounts>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DeviceOutcome {
    pub fn invalid(reason: impl Into<String>) -> Self {
        DeviceOutcome {
            status: DeviceOutcomeStatus::Invalid,
            collected: HashMap::new(),
            parsed: HashMap::new(),
            counts: HashMap::new(),
            errors: vec![reason.into()],
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_devices: usize,
    pub usable_devices: usize,
    pub per_device_outcomes: HashMap<String, DeviceOutcome>,
}

impl ProbeSummary {
    pub fn successful(&self) -> usize {
        self.count_status(DeviceOutcomeStatus::Successful)
    }

    pub fn failed(&self) -> usize {
        self.count_status(DeviceOutcomeStatus::Failed)
    }

    pub fn invalid(&self) -> usize {
        self.count_status(DeviceOutcomeStatus::Invalid)
    }

    fn count_status(&self, status: DeviceOutcomeStatus) -> usize {
        self.per_device_outcomes
            .values()
            .filter(|outcome| outcome.status == status)
            .count()
    }
}
