//! The NOS CLI/XML dialect this core depends on (§6). Centralized here so that the session,
//! probe pipeline, and targeted discovery components agree on the exact command strings.

/// Valid VLAN id range, inclusive on both ends.
pub const VLAN_ID_MIN: u16 = 1;
pub const VLAN_ID_MAX: u16 = 4094;

/// Returns `true` iff `vlan` falls inside the persisted-record VLAN range.
pub fn validate_vlan_range(vlan: u16) -> bool {
    (VLAN_ID_MIN..=VLAN_ID_MAX).contains(&vlan)
}

/// Sentinel values that mark an inventory field as "not actually set".
pub const PLACEHOLDER_SENTINELS: &[&str] = &["TBD", "unknown", ""];

pub fn is_placeholder(value: &str) -> bool {
    PLACEHOLDER_SENTINELS
        .iter()
        .any(|sentinel| sentinel.eq_ignore_ascii_case(value))
}

/// Config-mode verbs.
pub const CMD_CONFIGURE: &str = "configure";
pub const CMD_COMMIT_AND_EXIT: &str = "commit and-exit";
pub const CMD_COMMIT: &str = "commit";
pub const CMD_COMMIT_CHECK: &str = "commit check";
pub const CMD_EXIT: &str = "exit";

/// Full config as XML, ending at `</config>`.
pub const CMD_SHOW_CONFIG_XML: &str = "show config | display-xml | no-more";

/// LACP XML subset.
pub const CMD_SHOW_LACP_XML: &str = "show config protocols lacp | display-xml | no-more";

/// Pipe-delimited LLDP neighbor table.
pub const CMD_SHOW_LLDP_NEIGHBORS: &str = "show lldp neighbors | no-more";

/// Interactive LACP bundle table.
pub const CMD_SHOW_LACP_INTERFACES: &str = "show lacp interfaces | no-more";

/// Flat config lines mentioning `bridge-domain instance`.
pub const CMD_SHOW_BD_INSTANCES: &str = "show config | fl | i \"bridge-domain instance\"";

/// Flat config lines mentioning `vlan`.
pub const CMD_SHOW_VLAN_CONFIG: &str = "show config | fl | i vlan";

/// Bridge-domain enumeration, a table whose body rows are `| <name> |`.
pub const CMD_SHOW_BRIDGE_DOMAINS: &str = "show network-services bridge-domain | no-more";

/// Returns the flat-config command selecting a single bridge-domain instance by name.
pub fn cmd_show_bd_instance(bd_name: &str) -> String {
    format!("show config | fl | i \"bridge-domain instance {bd_name}\"")
}

/// Returns the interface table command filtered to a pattern.
pub fn cmd_show_interfaces_filtered(pattern: &str) -> String {
    format!("show interfaces | no-more | i {pattern}")
}

/// Returns the flat-config command filtered to a pattern.
pub fn cmd_show_config_filtered(pattern: &str) -> String {
    format!("show config | fl | i {pattern}")
}

/// Markers that classify a command's stdout as a hard failure.
pub const ERROR_MARKERS: &[&str] = &["ERROR:", "error:"];

pub fn contains_error_marker(output: &str) -> bool {
    ERROR_MARKERS.iter().any(|marker| output.contains(marker))
}

/// Returns the first line in `output` containing an error marker, if any.
pub fn first_error_line(output: &str) -> Option<&str> {
    output
        .lines()
        .find(|line| ERROR_MARKERS.iter().any(|marker| line.contains(marker)))
}

/// XML collection sentinel.
pub const XML_CLOSING_TAG: &str = "</config>";

/// Retry budget for XML collection when the sentinel is not observed (§4.B, §7).
pub const XML_COLLECTION_MAX_RETRIES: u32 = 3;

/// Default wall-clock timeout for prompt-based reads.
pub const DEFAULT_PROMPT_TIMEOUT_SECS: u64 = 30;

/// Default wall-clock timeout for XML collection.
pub const DEFAULT_XML_TIMEOUT_SECS: u64 = 180;

/// Settling delay between commands issued in the same probe run (§4.D). The NOS needs a moment
/// to flush output between unrelated commands on one shell.
pub const PROBE_INTER_COMMAND_SETTLE_MS: u64 = 300;

/// Fleet probe concurrency bound (§4.D, §5).
pub const PROBE_CONCURRENCY: usize = 15;

/// Deployment commit-stage concurrency bound (§4.I, §5).
pub const DEPLOY_CONCURRENCY: usize = 10;

/// Reachability-probe concurrency bound (§4.A).
pub const REACHABILITY_CONCURRENCY: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlan_range_boundaries() {
        assert!(!validate_vlan_range(0));
        assert!(validate_vlan_range(1));
        assert!(validate_vlan_range(4094));
        assert!(!validate_vlan_range(4095));
    }

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder("TBD"));
        assert!(is_placeholder("unknown"));
        assert!(is_placeholder(""));
        assert!(!is_placeholder("10.0.0.1"));
    }

    #[test]
    fn error_marker_detection() {
        assert!(contains_error_marker("line one\nERROR: bad syntax\n"));
        assert!(contains_error_marker("error: lowercase too"));
        assert!(!contains_error_marker("all clear"));
        assert_eq!(
            first_error_line("ok\nERROR: syntax error near 'foo'\nmore"),
            Some("ERROR: syntax error near 'foo'")
        );
    }
}
