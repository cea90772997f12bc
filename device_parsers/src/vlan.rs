//! VLAN configuration line parser (§4.C). Recognizes `interfaces <name> vlan-id <N>` and
//! `interfaces <name> vlan-manipulation …` lines from a flat-config dump.

use lazy_static::lazy_static;
use regex::Regex;

use device_api::constants::validate_vlan_range;
use device_api::model::{VlanConfig, VlanKind};

lazy_static! {
    static ref VLAN_ID_LINE: Regex = Regex::new(r"interfaces\s+(\S+)\s+vlan-id\s+(\d+)").unwrap();
    static ref VLAN_MANIPULATION_LINE: Regex = Regex::new(r"interfaces\s+(\S+)\s+vlan-manipulation").unwrap();
}

/// Parses flat-config lines into VLAN subinterface assignments and manipulation records.
/// Unparseable lines are skipped individually; no single bad line invalidates the output.
pub fn parse_vlan_config(device_name: &str, output: &str) -> Vec<VlanConfig> {
    let mut configs = Vec::new();

    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(captures) = VLAN_ID_LINE.captures(line) {
            let interface_name = captures[1].to_string();
            match captures[2].parse::<u16>() {
                Ok(vlan) if validate_vlan_range(vlan) => {
                    configs.push(VlanConfig {
                        device_name: device_name.to_string(),
                        interface_name,
                        vlan_id: Some(vlan),
                        kind: VlanKind::Subinterface,
                        raw_line: line.to_string(),
                    });
                }
                Ok(vlan) => log::warn!(
                    "discarding out-of-range vlan id {vlan} on {device_name}/{interface_name}"
                ),
                Err(_) => log::debug!("skipping unparseable vlan-id line on {device_name}: {line}"),
            }
            continue;
        }

        if line.contains("vlan-manipulation") {
            if let Some(captures) = VLAN_MANIPULATION_LINE.captures(line) {
                configs.push(VlanConfig {
                    device_name: device_name.to_string(),
                    interface_name: captures[1].to_string(),
                    vlan_id: None,
                    kind: VlanKind::Manipulation,
                    raw_line: line.to_string(),
                });
            } else {
                log::debug!("skipping unparseable vlan-manipulation line on {device_name}: {line}");
            }
        }
    }

    configs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_vlan_id_assignment() {
        let configs = parse_vlan_config("LEAF-A", "interfaces bundle-447.447 vlan-id 447\n");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].vlan_id, Some(447));
        assert_eq!(configs[0].kind, VlanKind::Subinterface);
    }

    #[test]
    fn parses_vlan_manipulation() {
        let configs =
            parse_vlan_config("LEAF-A", "interfaces bundle-1204 vlan-manipulation egress-mapping action pop\n");
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].kind, VlanKind::Manipulation);
        assert_eq!(configs[0].vlan_id, None);
    }

    #[test]
    fn discards_out_of_range_vlan_id() {
        let configs = parse_vlan_config("LEAF-A", "interfaces ge100-0/0/5 vlan-id 4095\n");
        assert!(configs.is_empty());
    }

    #[test]
    fn ignores_unrelated_lines() {
        let configs = parse_vlan_config("LEAF-A", "interfaces ge100-0/0/5 description uplink\n");
        assert!(configs.is_empty());
    }
}
