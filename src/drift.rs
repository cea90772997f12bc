//! Drift Detector (§4.F). Pure-function surface operating on strings and structured results —
//! never touches the network, never constructs a `Session`.

use std::collections::HashMap;

use chrono::Utc;
use device_api::model::{DeploymentResult, DetectionSource, DriftEvent, DriftType, Severity};

/// Primary commit-check drift signals: any one of these, matched case-insensitively, indicates
/// the device already carries the intended configuration.
const ALREADY_CONFIGURED_PATTERNS: &[&str] = &[
    "no configuration changes were made",
    "no changes needed",
    "already configured",
    "commit action is not applicable",
];

/// Secondary signal: a bridge-domain instance collides with one already present.
const BRIDGE_DOMAIN_EXISTS_PATTERN: &str = "configuration already exists";

/// VLAN-level conflicts, checked in both commit-check and deployment-result contexts.
const CONFLICT_PATTERNS: &[&str] = &["vlan conflict", "already assigned"];

/// Inspects a commit-check's captured output against `expected_commands`, matching (case
/// -insensitive) a small ordered pattern set. Returns `None` if no drift pattern is recognized.
pub fn from_commit_check(
    device_name: &str,
    commit_check_output: &str,
    expected_commands: &[String],
) -> Option<DriftEvent> {
    let lower = commit_check_output.to_lowercase();

    if ALREADY_CONFIGURED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(DriftEvent {
            drift_type: DriftType::InterfaceAlreadyConfigured,
            device_name: device_name.to_string(),
            interface_name: extract_interface_name(expected_commands),
            expected_config: expected_commands.join("; "),
            actual_config: commit_check_output.to_string(),
            detection_source: DetectionSource::CommitCheck,
            severity: Severity::Medium,
            timestamp: Utc::now(),
        });
    }

    if lower.contains(BRIDGE_DOMAIN_EXISTS_PATTERN) {
        return Some(DriftEvent {
            drift_type: DriftType::BridgeDomainAlreadyExists,
            device_name: device_name.to_string(),
            interface_name: extract_interface_name(expected_commands),
            expected_config: expected_commands.join("; "),
            actual_config: commit_check_output.to_string(),
            detection_source: DetectionSource::CommitCheck,
            severity: Severity::Medium,
            timestamp: Utc::now(),
        });
    }

    if CONFLICT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return Some(DriftEvent {
            drift_type: DriftType::VlanConflict,
            device_name: device_name.to_string(),
            interface_name: extract_interface_name(expected_commands),
            expected_config: expected_commands.join("; "),
            actual_config: commit_check_output.to_string(),
            detection_source: DetectionSource::CommitCheck,
            severity: Severity::Medium,
            timestamp: Utc::now(),
        });
    }

    None
}

/// Inspects a completed deployment's per-device failures for drift signals that only surface once
/// commit has actually been attempted.
pub fn from_deployment_result(result: &DeploymentResult) -> Vec<DriftEvent> {
    let mut events = Vec::new();

    for (device_name, exec) in &result.execution_results {
        if exec.success {
            continue;
        }
        let Some(ref error_message) = exec.error_message else {
            continue;
        };
        let lower = error_message.to_lowercase();

        if ALREADY_CONFIGURED_PATTERNS.iter().any(|p| lower.contains(p)) {
            events.push(DriftEvent {
                drift_type: DriftType::InterfaceAlreadyConfigured,
                device_name: device_name.clone(),
                interface_name: None,
                expected_config: String::new(),
                actual_config: error_message.clone(),
                detection_source: DetectionSource::DeploymentResult,
                severity: Severity::High,
                timestamp: Utc::now(),
            });
        } else if CONFLICT_PATTERNS.iter().any(|p| lower.contains(p)) {
            events.push(DriftEvent {
                drift_type: DriftType::VlanConflict,
                device_name: device_name.clone(),
                interface_name: None,
                expected_config: String::new(),
                actual_config: error_message.clone(),
                detection_source: DetectionSource::DeploymentResult,
                severity: Severity::High,
                timestamp: Utc::now(),
            });
        }
    }

    events
}

/// Inspects a post-deployment validation failure. Supplements §4.I Stage 3's own VLAN-marker
/// check with a classified `DriftEvent` a caller can feed into [`analyze`].
pub fn from_validation_failure(
    device_name: &str,
    interface_name: &str,
    validation_output: &str,
) -> Option<DriftEvent> {
    let lower = validation_output.to_lowercase();

    if lower.contains("not found") {
        return Some(DriftEvent {
            drift_type: DriftType::ConfigurationMismatch,
            device_name: device_name.to_string(),
            interface_name: Some(interface_name.to_string()),
            expected_config: String::new(),
            actual_config: validation_output.to_string(),
            detection_source: DetectionSource::ValidationFailure,
            severity: Severity::High,
            timestamp: Utc::now(),
        });
    }

    if lower.contains("vlan-id") {
        return Some(DriftEvent {
            drift_type: DriftType::VlanConflict,
            device_name: device_name.to_string(),
            interface_name: Some(interface_name.to_string()),
            expected_config: String::new(),
            actual_config: validation_output.to_string(),
            detection_source: DetectionSource::ValidationFailure,
            severity: Severity::High,
            timestamp: Utc::now(),
        });
    }

    None
}

/// Rolled-up counts and heuristic recommendations over a batch of drift events. The orchestrator
/// sums per-component counts into one value rather than mutating a shared stats dict (§9).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DriftAnalysis {
    pub total_events: usize,
    pub by_type: HashMap<DriftType, usize>,
    pub by_device: HashMap<String, usize>,
    pub by_source: HashMap<DetectionSource, usize>,
    pub severity_distribution: HashMap<Severity, usize>,
    pub recommendations: Vec<String>,
}

/// Recommendation thresholds, named constants per §9's note that stats should be computed, not
/// mutated from many call sites.
const MANY_ALREADY_CONFIGURED_THRESHOLD: usize = 5;
const MANY_DEVICES_THRESHOLD: usize = 10;

pub fn analyze(events: &[DriftEvent]) -> DriftAnalysis {
    let mut analysis = DriftAnalysis {
        total_events: events.len(),
        ..Default::default()
    };

    for event in events {
        *analysis.by_type.entry(event.drift_type).or_default() += 1;
        *analysis.by_device.entry(event.device_name.clone()).or_default() += 1;
        *analysis.by_source.entry(event.detection_source).or_default() += 1;
        *analysis.severity_distribution.entry(event.severity).or_default() += 1;
    }

    if analysis
        .by_type
        .get(&DriftType::InterfaceAlreadyConfigured)
        .is_some_and(|n| *n > MANY_ALREADY_CONFIGURED_THRESHOLD)
    {
        analysis
            .recommendations
            .push("more than five already-configured interfaces — consider a full device discovery".to_string());
    }

    if analysis.by_device.len() > MANY_DEVICES_THRESHOLD {
        analysis
            .recommendations
            .push("drift detected across many devices — consider a systematic sync".to_string());
    }

    analysis
}

/// Extracts the interface name from the first `interfaces <name> …` token found among
/// `commands`, per §4.F.
fn extract_interface_name(commands: &[String]) -> Option<String> {
    for command in commands {
        let mut tokens = command.split_whitespace();
        while let Some(token) = tokens.next() {
            if token == "interfaces" {
                return tokens.next().map(str::to_string);
            }
        }
    }
    None
}
