//! Sync Resolver (§4.G). Presents a fixed four-option choice to the operator and returns one
//! `SyncResolution`. Discovery and update are capability traits so this component, like the
//! detector, stays decoupled from any concrete `Session` or store (§9).

use std::collections::VecDeque;

use chrono::Utc;
use device_api::error::CoreError;
use device_api::model::{DriftEvent, InterfaceRecord, SyncAction, SyncResolution, SyncResult};

/// What Targeted Discovery (§4.E) contributes to drift resolution: a narrow VLAN-configuration
/// scan for one device, optionally restricted to a base interface pattern.
pub trait InterfaceDiscovery {
    fn discover_interface_vlans(
        &mut self,
        device_name: &str,
        base_pattern: Option<&str>,
    ) -> Result<Vec<InterfaceRecord>, CoreError>;
}

/// What the Database Updater (§4.H) contributes to drift resolution.
pub trait InterfaceUpdater {
    fn update_interface_records(&mut self, records: Vec<InterfaceRecord>) -> SyncResult;
}

/// The operator-facing prompt boundary. `StdinPrompt` is the production implementation;
/// `ScriptedPrompt` drives tests without touching a real terminal.
pub trait PromptReader {
    /// Prints `message` and returns the operator's trimmed response, or `None` on cancellation
    /// (EOF / Ctrl-D / Ctrl-C).
    fn prompt(&mut self, message: &str) -> Option<String>;
}

pub struct StdinPrompt;

impl PromptReader for StdinPrompt {
    fn prompt(&mut self, message: &str) -> Option<String> {
        println!("{message}");
        let mut line = String::new();
        match std::io::stdin().read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => Some(line.trim().to_string()),
            Err(e) => {
                log::warn!("failed to read operator input: {e}");
                None
            }
        }
    }
}

/// A scripted prompt for tests: each call to `prompt` pops the next queued response.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    responses: VecDeque<Option<String>>,
}

impl ScriptedPrompt {
    pub fn new(responses: impl IntoIterator<Item = Option<&'static str>>) -> Self {
        ScriptedPrompt {
            responses: responses.into_iter().map(|r| r.map(str::to_string)).collect(),
        }
    }
}

impl PromptReader for ScriptedPrompt {
    fn prompt(&mut self, _message: &str) -> Option<String> {
        self.responses.pop_front().flatten()
    }
}

const PROMPT_TEXT: &str = "Select resolution option [1-4]: 1) discover-and-sync  2) skip  3) override  4) abort";

/// Presents the fixed four-option choice for `event` and returns the resulting `SyncResolution`.
pub fn resolve_interactive(
    event: &DriftEvent,
    discovery: &mut impl InterfaceDiscovery,
    updater: &mut impl InterfaceUpdater,
    prompt: &mut impl PromptReader,
) -> SyncResolution {
    match prompt.prompt(PROMPT_TEXT).as_deref() {
        Some("1") => discover_and_sync(event, discovery, updater, "1"),
        Some("2") => resolution(SyncAction::Skip, "2", None),
        Some("3") => resolution(SyncAction::Override, "3", None),
        Some("4") => resolution(SyncAction::Abort, "4", None),
        Some(other) => resolution(SyncAction::Abort, other, Some("invalid selection, aborting deployment")),
        None => resolution(SyncAction::Abort, "cancelled", Some("user cancelled drift resolution")),
    }
}

/// Policy values accepted by the non-interactive variant.
pub const POLICY_CONSERVATIVE: &str = "conservative";
pub const POLICY_PERMISSIVE: &str = "permissive";
pub const POLICY_AGGRESSIVE: &str = "aggressive";

/// Non-interactive resolution: `conservative` maps to discover-and-sync, `permissive` to skip,
/// `aggressive` to override. Any other policy value yields `failed`.
pub fn resolve(
    event: &DriftEvent,
    policy: &str,
    discovery: &mut impl InterfaceDiscovery,
    updater: &mut impl InterfaceUpdater,
) -> SyncResolution {
    match policy {
        POLICY_CONSERVATIVE => discover_and_sync(event, discovery, updater, policy),
        POLICY_PERMISSIVE => {
            resolution(SyncAction::Skip, policy, Some("automatic resolution: skipped conflicting interface"))
        }
        POLICY_AGGRESSIVE => resolution(
            SyncAction::Override,
            policy,
            Some("automatic resolution: overriding existing configuration"),
        ),
        other => resolution(
            SyncAction::Failed,
            other,
            Some(&format!("unknown automatic resolution policy: {other}")),
        ),
    }
}

fn discover_and_sync(
    event: &DriftEvent,
    discovery: &mut impl InterfaceDiscovery,
    updater: &mut impl InterfaceUpdater,
    operator_choice: &str,
) -> SyncResolution {
    let base_pattern = event.interface_name.as_deref().map(base_interface_pattern);

    let records = match discovery.discover_interface_vlans(&event.device_name, base_pattern) {
        Ok(records) => records,
        Err(e) => {
            return resolution(
                SyncAction::Failed,
                operator_choice,
                Some(&format!("discovery failed: {e}")),
            )
        }
    };

    if records.is_empty() {
        return SyncResolution {
            action: SyncAction::Failed,
            discovered_records: Vec::new(),
            sync_result: None,
            operator_choice: operator_choice.to_string(),
            timestamp: Utc::now(),
            message: Some("no configurations discovered".to_string()),
        };
    }

    let sync_result = updater.update_interface_records(records.clone());
    if sync_result.ok {
        SyncResolution {
            action: SyncAction::Synced,
            discovered_records: records,
            sync_result: Some(sync_result),
            operator_choice: operator_choice.to_string(),
            timestamp: Utc::now(),
            message: None,
        }
    } else {
        SyncResolution {
            action: SyncAction::Failed,
            discovered_records: records,
            sync_result: Some(sync_result),
            operator_choice: operator_choice.to_string(),
            timestamp: Utc::now(),
            message: Some("database update failed".to_string()),
        }
    }
}

fn resolution(action: SyncAction, operator_choice: &str, message: Option<&str>) -> SyncResolution {
    SyncResolution {
        action,
        discovered_records: Vec::new(),
        sync_result: None,
        operator_choice: operator_choice.to_string(),
        timestamp: Utc::now(),
        message: message.map(str::to_string),
    }
}

/// Derives a discovery scope by splitting a drifted interface name on `.` to get the base
/// physical/bundle interface before calling targeted discovery (§4.G, grounded on
/// `sync_resolver.py`'s `base_interface` derivation).
fn base_interface_pattern(interface_name: &str) -> &str {
    interface_name.split('.').next().unwrap_or(interface_name)
}
