//! Deployment Orchestrator (§4.I). Drives the "stop-and-sync at commit-check" model: Stage 1
//! commit-check with drift detection, Stage 1.5 drift resolution, Stage 2 parallel commit,
//! Stage 3 post-deployment VLAN validation.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use device_api::constants::{cmd_show_interfaces_filtered, DEPLOY_CONCURRENCY};
use device_api::error::CoreError;
use device_api::model::{
    CommandOutcome, DeploymentPlan, DeploymentResult, DriftEvent, ExecutionMode, ExecutionResult, SyncAction,
};
use device_session::session::CommitCheckOutcome;
use device_session::{Session, ShellTransport};

use crate::drift;
use crate::inventory::Inventory;

/// What Stage 1/2/3 need from a device conversation.
pub trait DeploySession {
    fn commit_check(&mut self, commands: &[String]) -> Result<CommitCheckOutcome, CoreError>;
    fn configure(&mut self, commands: &[String]) -> Result<bool, CoreError>;
    fn query(&mut self, command: &str) -> Result<String, CoreError>;
}

impl<T: ShellTransport> DeploySession for Session<T> {
    fn commit_check(&mut self, commands: &[String]) -> Result<CommitCheckOutcome, CoreError> {
        Session::commit_check(self, commands)
    }

    fn configure(&mut self, commands: &[String]) -> Result<bool, CoreError> {
        Session::configure(self, commands, true)
    }

    fn query(&mut self, command: &str) -> Result<String, CoreError> {
        self.send_until_prompt(command, Duration::from_secs(device_api::constants::DEFAULT_PROMPT_TIMEOUT_SECS))
    }
}

/// Resolves a single drift event to one of the five `SyncAction`s (§4.G). The orchestrator only
/// needs the action; `resolver::resolve_interactive`/`resolver::resolve` produce the full
/// `SyncResolution` this trait is expected to wrap.
pub trait DriftResolver {
    fn resolve(&mut self, event: &DriftEvent) -> SyncAction;
}

/// What every stage needs to obtain a device conversation by name. `Sync` so a shared reference
/// can be fanned out across Stage 2's thread pool.
pub trait SessionProvider: Sync {
    fn open(&self, device_name: &str) -> Result<Box<dyn DeploySession>, CoreError>;
}

/// Opens a fresh `Session<Ssh2Transport>` per call, used by Stage 1 and Stage 2 against real
/// devices. Looked up by device name each time so the orchestrator never holds more than one
/// session per device at once.
pub struct InventorySessions<'a> {
    pub inventory: &'a Inventory,
}

impl SessionProvider for InventorySessions<'_> {
    fn open(&self, device_name: &str) -> Result<Box<dyn DeploySession>, CoreError> {
        let device = self
            .inventory
            .get(device_name)
            .ok_or(())
            .map_err(|_| device_api::error::CoreError::new(device_api::error::SessionError::Unreachable {
                device: device_name.to_string(),
            }))?;
        Ok(Box::new(Session::connect(device)?))
    }
}

/// Runs the full four-stage deployment (§4.I). `resolver` is consulted for each drift event
/// raised in Stage 1; see [`DriftResolver`].
pub fn run(plan: &mut DeploymentPlan, sessions: &dyn SessionProvider, resolver: &mut impl DriftResolver) -> DeploymentResult {
    let start = Instant::now();
    let deployment_id = plan.deployment_id.clone();

    let (commit_check_map, drift_events, hard_failure) = stage1_commit_check(plan, sessions);
    if let Some(device_name) = hard_failure {
        return DeploymentResult::aborted(
            deployment_id,
            format!("commit-check hard error on {device_name}; no device committed"),
        );
    }

    if !drift_events.is_empty() {
        if let Some(result) = stage1_5_resolve_drift(plan, &drift_events, resolver, &deployment_id) {
            return result;
        }
    }

    let execution_results = stage2_parallel_commit(plan, sessions);
    let validation_map = stage3_validate(plan, &execution_results, sessions);

    let success = plan.per_device_commands.iter().all(|(device, commands)| {
        if commands.is_empty() {
            return true;
        }
        execution_results.get(device).is_some_and(|r| r.success) && validation_map.get(device).copied().unwrap_or(false)
    });

    DeploymentResult {
        deployment_id,
        success,
        execution_results,
        commit_check_map,
        validation_map,
        drift_events,
        errors: Vec::new(),
        warnings: Vec::new(),
        total_duration: start.elapsed(),
    }
}

/// Fast path used for trivial operations where the caller asserts no drift risk: skips Stage 1
/// and 1.5 and runs Stage 2 directly.
pub fn deploy_immediate(
    deployment_id: impl Into<String>,
    per_device_commands: HashMap<String, Vec<String>>,
    sessions: &dyn SessionProvider,
) -> DeploymentResult {
    let start = Instant::now();
    let mut plan = DeploymentPlan {
        deployment_id: deployment_id.into(),
        per_device_commands,
        execution_mode: ExecutionMode::Immediate,
        parallel: true,
        metadata: HashMap::new(),
    };

    let execution_results = stage2_parallel_commit(&mut plan, sessions);
    let validation_map = stage3_validate(&plan, &execution_results, sessions);
    let success = execution_results.values().all(|r| r.success)
        && validation_map.values().all(|ok| *ok);

    DeploymentResult {
        deployment_id: plan.deployment_id,
        success,
        execution_results,
        commit_check_map: HashMap::new(),
        validation_map,
        drift_events: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
        total_duration: start.elapsed(),
    }
}

/// Static validation only, no device I/O: every device in `per_device_commands` is reported
/// successful with an explanatory message, the way the original `UniversalCommandExecutor`'s
/// dry-run mode behaves (`SPEC_FULL.md` §C.1).
pub fn deploy_dry_run(deployment_id: impl Into<String>, per_device_commands: HashMap<String, Vec<String>>) -> DeploymentResult {
    let start = Instant::now();
    let execution_results = per_device_commands
        .iter()
        .map(|(device_name, commands)| {
            let per_command_results = commands
                .iter()
                .map(|command| CommandOutcome {
                    command: command.clone(),
                    success: true,
                    output: String::new(),
                    duration: Duration::default(),
                    error_message: None,
                })
                .collect();
            (
                device_name.clone(),
                ExecutionResult {
                    device_name: device_name.clone(),
                    execution_mode: ExecutionMode::DryRun,
                    success: true,
                    per_command_results,
                    total_duration: Duration::default(),
                    aggregated_output: String::new(),
                    error_message: Some("dry run: no device connection attempted".to_string()),
                    connection_ok: false,
                    commit_check_passed: None,
                    configuration_applied: false,
                },
            )
        })
        .collect::<HashMap<_, _>>();

    DeploymentResult {
        deployment_id: deployment_id.into(),
        success: true,
        execution_results,
        commit_check_map: HashMap::new(),
        validation_map: HashMap::new(),
        drift_events: Vec::new(),
        errors: Vec::new(),
        warnings: Vec::new(),
        total_duration: start.elapsed(),
    }
}

/// Stage 1: per-device commit-check with drift detection. Returns the commit-check pass/fail map,
/// the accumulated drift events, and — if any device's commit-check hit a hard error — that
/// device's name, which aborts the whole deployment before any commit is attempted.
fn stage1_commit_check(
    plan: &DeploymentPlan,
    sessions: &dyn SessionProvider,
) -> (HashMap<String, bool>, Vec<DriftEvent>, Option<String>) {
    let mut commit_check_map = HashMap::new();
    let mut drift_events = Vec::new();

    for (device_name, commands) in &plan.per_device_commands {
        if commands.is_empty() {
            continue;
        }

        let mut session = match sessions.open(device_name) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("commit-check could not open session for {device_name}: {e}");
                commit_check_map.insert(device_name.clone(), false);
                continue;
            }
        };

        match session.commit_check(commands) {
            Ok(outcome) => {
                if outcome.hard_error {
                    commit_check_map.insert(device_name.clone(), false);
                    return (commit_check_map, drift_events, Some(device_name.clone()));
                }
                commit_check_map.insert(device_name.clone(), true);
                if let Some(event) = drift::from_commit_check(device_name, &outcome.check_output, commands) {
                    drift_events.push(event);
                }
            }
            Err(e) => {
                log::warn!("commit-check failed for {device_name}: {e}");
                commit_check_map.insert(device_name.clone(), false);
            }
        }
    }

    (commit_check_map, drift_events, None)
}

/// Stage 1.5: dispatches each drift event to `resolver` and applies its effect on `plan`.
fn stage1_5_resolve_drift(
    plan: &mut DeploymentPlan,
    drift_events: &[DriftEvent],
    resolver: &mut impl DriftResolver,
    deployment_id: &str,
) -> Option<DeploymentResult> {
    let mut failed = false;

    for event in drift_events {
        match resolver.resolve(event) {
            SyncAction::Abort => {
                return Some(DeploymentResult::aborted(
                    deployment_id.to_string(),
                    format!("operator aborted deployment on drift for {}", event.device_name),
                ));
            }
            SyncAction::Skip => plan.clear_device_commands(&event.device_name),
            SyncAction::Override | SyncAction::Synced => {}
            SyncAction::Failed => failed = true,
        }
    }

    if failed {
        let mut result = DeploymentResult::aborted(
            deployment_id.to_string(),
            "drift resolution failed for one or more devices".to_string(),
        );
        result.drift_events = drift_events.to_vec();
        Some(result)
    } else {
        None
    }
}

/// Stage 2: parallel commit, bounded to [`DEPLOY_CONCURRENCY`] concurrent sessions.
fn stage2_parallel_commit(
    plan: &DeploymentPlan,
    sessions: &dyn SessionProvider,
) -> HashMap<String, ExecutionResult> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(DEPLOY_CONCURRENCY)
        .build()
        .expect("failed to build deploy thread pool");

    let candidates: Vec<(&String, &Vec<String>)> = plan
        .per_device_commands
        .iter()
        .filter(|(_, commands)| !commands.is_empty())
        .collect();

    pool.install(|| {
        use rayon::prelude::*;
        candidates
            .par_iter()
            .map(|(device_name, commands)| {
                let start = Instant::now();
                let result = match sessions.open(device_name) {
                    Ok(mut session) => match session.configure(commands) {
                        Ok(true) => ExecutionResult {
                            device_name: (*device_name).clone(),
                            execution_mode: ExecutionMode::Commit,
                            success: true,
                            per_command_results: commands
                                .iter()
                                .map(|c| CommandOutcome {
                                    command: c.clone(),
                                    success: true,
                                    output: String::new(),
                                    duration: Duration::default(),
                                    error_message: None,
                                })
                                .collect(),
                            total_duration: start.elapsed(),
                            aggregated_output: String::new(),
                            error_message: None,
                            connection_ok: true,
                            commit_check_passed: None,
                            configuration_applied: true,
                        },
                        Ok(false) => ExecutionResult::failed(
                            (*device_name).clone(),
                            ExecutionMode::Commit,
                            "configuration rejected by device",
                        ),
                        Err(e) => ExecutionResult::failed((*device_name).clone(), ExecutionMode::Commit, e.to_string()),
                    },
                    Err(e) => ExecutionResult::failed((*device_name).clone(), ExecutionMode::Commit, e.to_string()),
                };
                ((*device_name).clone(), result)
            })
            .collect()
    })
}

/// Stage 3: for each device whose commit succeeded, re-queries every `interfaces <name> vlan-id
/// <v>` assignment it deployed and checks for a recognizable VLAN marker.
fn stage3_validate(
    plan: &DeploymentPlan,
    execution_results: &HashMap<String, ExecutionResult>,
    sessions: &dyn SessionProvider,
) -> HashMap<String, bool> {
    let mut validation_map = HashMap::new();

    for (device_name, commands) in &plan.per_device_commands {
        let Some(exec) = execution_results.get(device_name) else { continue };
        if !exec.success {
            continue;
        }

        let assignments = extract_vlan_assignments(commands);
        if assignments.is_empty() {
            validation_map.insert(device_name.clone(), true);
            continue;
        }

        let mut session = match sessions.open(device_name) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("validation could not open session for {device_name}: {e}");
                validation_map.insert(device_name.clone(), false);
                continue;
            }
        };

        let mut passed = true;
        for (interface_name, vlan) in &assignments {
            let output = match session.query(&cmd_show_interfaces_filtered(interface_name)) {
                Ok(output) => output,
                Err(e) => {
                    log::warn!("validation query failed for {interface_name} on {device_name}: {e}");
                    passed = false;
                    continue;
                }
            };
            if !validates_interface(&output, interface_name, *vlan) {
                passed = false;
            }
        }

        validation_map.insert(device_name.clone(), passed);
    }

    validation_map
}

/// Scans `commands` for `interfaces <name> vlan-id <v>` assignments.
fn extract_vlan_assignments(commands: &[String]) -> Vec<(String, u16)> {
    let mut assignments = Vec::new();
    for command in commands {
        let tokens: Vec<&str> = command.split_whitespace().collect();
        for window in tokens.windows(4) {
            if window[0] == "interfaces" && window[2] == "vlan-id" {
                if let Ok(vlan) = window[3].parse::<u16>() {
                    assignments.push((window[1].to_string(), vlan));
                }
            }
        }
    }
    assignments
}

/// A device passes validation for one interface/VLAN pair iff the output mentions the interface
/// and carries a recognizable VLAN marker for it: `Vlan-Id: <V>`, `vlan-id <V>`, or a dotted
/// `.<V>` suffix on the interface name.
fn validates_interface(output: &str, interface_name: &str, expected_vlan: u16) -> bool {
    if !output.contains(interface_name) {
        return false;
    }
    let markers = [
        format!("Vlan-Id: {expected_vlan}"),
        format!("vlan-id {expected_vlan}"),
        format!(".{expected_vlan}"),
    ];
    markers.iter().any(|m| output.contains(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use device_api::model::{DetectionSource, DriftType, Severity};

    struct AutoApprove;
    impl DriftResolver for AutoApprove {
        fn resolve(&mut self, _event: &DriftEvent) -> SyncAction {
            SyncAction::Synced
        }
    }

    struct AutoAbort;
    impl DriftResolver for AutoAbort {
        fn resolve(&mut self, _event: &DriftEvent) -> SyncAction {
            SyncAction::Abort
        }
    }

    /// Per-device scripted responses for a fake device conversation, used to drive `deploy::run`
    /// end to end without a real SSH session (§8 scenarios S1/S2/S3/S6).
    #[derive(Clone)]
    struct ScriptedDeviceSession {
        commit_check_hard_error: bool,
        commit_check_output: String,
        configure_result: bool,
        query_response: String,
    }

    impl DeploySession for ScriptedDeviceSession {
        fn commit_check(&mut self, _commands: &[String]) -> Result<CommitCheckOutcome, CoreError> {
            Ok(CommitCheckOutcome {
                hard_error: self.commit_check_hard_error,
                offending_command: None,
                check_output: self.commit_check_output.clone(),
            })
        }

        fn configure(&mut self, _commands: &[String]) -> Result<bool, CoreError> {
            Ok(self.configure_result)
        }

        fn query(&mut self, _command: &str) -> Result<String, CoreError> {
            Ok(self.query_response.clone())
        }
    }

    /// Hands out a clone of the scripted session registered under each device name; fails to open
    /// a session for any name it wasn't told about.
    struct ScriptedSessions {
        by_device: HashMap<String, ScriptedDeviceSession>,
    }

    impl SessionProvider for ScriptedSessions {
        fn open(&self, device_name: &str) -> Result<Box<dyn DeploySession>, CoreError> {
            self.by_device
                .get(device_name)
                .cloned()
                .map(|session| Box::new(session) as Box<dyn DeploySession>)
                .ok_or_else(|| CoreError::new(device_api::error::SessionError::Unreachable {
                    device: device_name.to_string(),
                }))
        }
    }

    fn plan_for(devices: &[(&str, &[&str])]) -> DeploymentPlan {
        DeploymentPlan {
            deployment_id: "d1".to_string(),
            per_device_commands: devices
                .iter()
                .map(|(name, commands)| (name.to_string(), commands.iter().map(|c| c.to_string()).collect()))
                .collect(),
            execution_mode: ExecutionMode::Commit,
            parallel: true,
            metadata: HashMap::new(),
        }
    }

    fn sample_event() -> DriftEvent {
        DriftEvent {
            drift_type: DriftType::InterfaceAlreadyConfigured,
            device_name: "LEAF-A".to_string(),
            interface_name: Some("ge100-0/0/5".to_string()),
            expected_config: String::new(),
            actual_config: String::new(),
            detection_source: DetectionSource::CommitCheck,
            severity: Severity::Medium,
            timestamp: chrono::Utc::now(),
        }
    }

    #[test]
    fn stage1_5_skip_clears_device_commands() {
        struct AutoSkip;
        impl DriftResolver for AutoSkip {
            fn resolve(&mut self, _event: &DriftEvent) -> SyncAction {
                SyncAction::Skip
            }
        }

        let mut plan = DeploymentPlan {
            deployment_id: "d1".to_string(),
            per_device_commands: HashMap::from([(
                "LEAF-A".to_string(),
                vec!["interfaces ge100-0/0/5 vlan-id 300".to_string()],
            )]),
            execution_mode: ExecutionMode::Commit,
            parallel: true,
            metadata: HashMap::new(),
        };
        let result = stage1_5_resolve_drift(&mut plan, &[sample_event()], &mut AutoSkip, "d1");
        assert!(result.is_none());
        assert!(plan.per_device_commands["LEAF-A"].is_empty());
    }

    #[test]
    fn stage1_5_abort_returns_aborted_result() {
        let mut plan = DeploymentPlan {
            deployment_id: "d1".to_string(),
            per_device_commands: HashMap::new(),
            execution_mode: ExecutionMode::Commit,
            parallel: true,
            metadata: HashMap::new(),
        };
        let result = stage1_5_resolve_drift(&mut plan, &[sample_event()], &mut AutoAbort, "d1").unwrap();
        assert!(!result.success);
    }

    #[test]
    fn stage1_5_failed_carries_all_events() {
        struct AutoFail;
        impl DriftResolver for AutoFail {
            fn resolve(&mut self, _event: &DriftEvent) -> SyncAction {
                SyncAction::Failed
            }
        }
        let mut plan = DeploymentPlan {
            deployment_id: "d1".to_string(),
            per_device_commands: HashMap::new(),
            execution_mode: ExecutionMode::Commit,
            parallel: true,
            metadata: HashMap::new(),
        };
        let result = stage1_5_resolve_drift(&mut plan, &[sample_event()], &mut AutoFail, "d1").unwrap();
        assert!(!result.success);
        assert_eq!(result.drift_events.len(), 1);
    }

    #[test]
    fn stage1_5_override_and_synced_leave_plan_unchanged() {
        let mut plan = DeploymentPlan {
            deployment_id: "d1".to_string(),
            per_device_commands: HashMap::from([(
                "LEAF-A".to_string(),
                vec!["interfaces ge100-0/0/5 vlan-id 300".to_string()],
            )]),
            execution_mode: ExecutionMode::Commit,
            parallel: true,
            metadata: HashMap::new(),
        };
        let result = stage1_5_resolve_drift(&mut plan, &[sample_event()], &mut AutoApprove, "d1");
        assert!(result.is_none());
        assert_eq!(plan.per_device_commands["LEAF-A"].len(), 1);
    }

    #[test]
    fn vlan_assignment_extraction_reads_interfaces_commands() {
        let commands = vec![
            "interfaces ge100-0/0/5.300 vlan-id 300".to_string(),
            "interfaces ge100-0/0/5.300 l2-service enabled".to_string(),
        ];
        let assignments = extract_vlan_assignments(&commands);
        assert_eq!(assignments, vec![("ge100-0/0/5.300".to_string(), 300)]);
    }

    #[test]
    fn validates_interface_accepts_any_recognized_marker() {
        assert!(validates_interface("ge100-0/0/5.300 | Vlan-Id: 300 |", "ge100-0/0/5.300", 300));
        assert!(validates_interface("interfaces ge100-0/0/5.300 vlan-id 300", "ge100-0/0/5.300", 300));
        assert!(validates_interface("ge100-0/0/5.300 up up", "ge100-0/0/5.300", 300));
        assert!(!validates_interface("ge100-0/0/6.400 up up", "ge100-0/0/5.300", 300));
    }

    /// S1 — clean deployment: normal commit-check output, no drift, commit succeeds, validation
    /// query confirms the deployed VLAN.
    #[test]
    fn s1_clean_deployment_succeeds_end_to_end() {
        let mut plan = plan_for(&[(
            "LEAF-A",
            &["interfaces ge100-0/0/5 vlan-id 300", "interfaces ge100-0/0/5 l2-service enabled"],
        )]);
        let sessions = ScriptedSessions {
            by_device: HashMap::from([(
                "LEAF-A".to_string(),
                ScriptedDeviceSession {
                    commit_check_hard_error: false,
                    commit_check_output: "commit check succeeded\n".to_string(),
                    configure_result: true,
                    query_response: "ge100-0/0/5 | Vlan-Id: 300 |".to_string(),
                },
            )]),
        };

        let result = run(&mut plan, &sessions, &mut AutoApprove);

        assert!(result.success);
        assert_eq!(result.commit_check_map.get("LEAF-A"), Some(&true));
        assert_eq!(result.validation_map.get("LEAF-A"), Some(&true));
        assert!(result.drift_events.is_empty());
    }

    /// S2 — interface already configured: commit-check reports no changes, drift detector raises
    /// one event, the resolver reports it synced, Stage 2 still runs (a no-op on the device) and
    /// the deployment is reported successful.
    #[test]
    fn s2_interface_already_configured_resolves_and_commits() {
        let mut plan = plan_for(&[("LEAF-A", &["interfaces ge100-0/0/5 vlan-id 300"])]);
        let sessions = ScriptedSessions {
            by_device: HashMap::from([(
                "LEAF-A".to_string(),
                ScriptedDeviceSession {
                    commit_check_hard_error: false,
                    commit_check_output: "no configuration changes were made\n".to_string(),
                    configure_result: true,
                    query_response: "ge100-0/0/5 | Vlan-Id: 300 |".to_string(),
                },
            )]),
        };

        let result = run(&mut plan, &sessions, &mut AutoApprove);

        assert!(result.success);
        assert_eq!(result.drift_events.len(), 1);
        assert_eq!(result.drift_events[0].drift_type, DriftType::InterfaceAlreadyConfigured);
        assert_eq!(result.execution_results.get("LEAF-A").map(|r| r.success), Some(true));
    }

    /// S3 — commit-check hard error on one device aborts the fleet: Stage 2 must never run, so no
    /// device's `execution_results` entry exists, even for the device whose commit-check was clean
    /// (§8 property 7, drift safety).
    #[test]
    fn s3_hard_error_on_one_device_aborts_before_any_commit() {
        let mut plan = plan_for(&[
            ("LEAF-A", &["interfaces ge100-0/0/5 vlan-id 300"]),
            ("LEAF-B", &["interfaces ge100-0/0/6 vlan-id 400"]),
        ]);
        let sessions = ScriptedSessions {
            by_device: HashMap::from([
                (
                    "LEAF-A".to_string(),
                    ScriptedDeviceSession {
                        commit_check_hard_error: false,
                        commit_check_output: "commit check succeeded\n".to_string(),
                        configure_result: true,
                        query_response: String::new(),
                    },
                ),
                (
                    "LEAF-B".to_string(),
                    ScriptedDeviceSession {
                        commit_check_hard_error: true,
                        commit_check_output: "ERROR: syntax error\n".to_string(),
                        configure_result: true,
                        query_response: String::new(),
                    },
                ),
            ]),
        };

        let result = run(&mut plan, &sessions, &mut AutoApprove);

        assert!(!result.success);
        assert!(result.execution_results.is_empty());
        assert!(!result.errors.is_empty());
    }

    /// S6 — validation detects a silent mismatch: commit succeeds but the device's running state
    /// disagrees with what was deployed.
    #[test]
    fn s6_validation_detects_silent_mismatch() {
        let mut plan = plan_for(&[("LEAF-A", &["interfaces ge100-0/0/5 vlan-id 300"])]);
        let sessions = ScriptedSessions {
            by_device: HashMap::from([(
                "LEAF-A".to_string(),
                ScriptedDeviceSession {
                    commit_check_hard_error: false,
                    commit_check_output: "commit check succeeded\n".to_string(),
                    configure_result: true,
                    query_response: "ge100-0/0/5 | Vlan-Id: 301 |".to_string(),
                },
            )]),
        };

        let result = run(&mut plan, &sessions, &mut AutoApprove);

        assert!(!result.success);
        assert_eq!(result.validation_map.get("LEAF-A"), Some(&false));
        assert_eq!(result.execution_results.get("LEAF-A").map(|r| r.success), Some(true));
    }

    #[test]
    fn dry_run_performs_no_device_io_and_succeeds() {
        let commands = HashMap::from([
            ("LEAF-A".to_string(), vec!["interfaces ge100-0/0/5 vlan-id 300".to_string()]),
            ("LEAF-B".to_string(), vec![]),
        ]);

        let result = deploy_dry_run("d1", commands);

        assert!(result.success);
        assert!(result.commit_check_map.is_empty());
        assert!(result.validation_map.is_empty());
        let leaf_a = &result.execution_results["LEAF-A"];
        assert_eq!(leaf_a.execution_mode, ExecutionMode::DryRun);
        assert!(leaf_a.success);
        assert!(!leaf_a.connection_ok);
        assert_eq!(leaf_a.per_command_results.len(), 1);
        assert!(leaf_a.per_command_results[0].success);
    }
}
