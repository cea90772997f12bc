//! Bridge-domain instance line parser (§4.C). Recognizes flat-config lines of the form
//! `network-services bridge-domain instance <NAME> …` with optional trailing
//! `admin-state <enabled|disabled>` and/or `interface <name>` on the same or a following line.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use device_api::model::BridgeDomainInstance;

use crate::naming::{scope_from_bridge_domain_name, username_from_bridge_domain_name, vlan_from_bridge_domain_name};

const INSTANCE_MARKER: &str = "network-services bridge-domain instance";

lazy_static! {
    static ref INTERFACE_TOKEN: Regex = Regex::new(r"interface (\S+)").unwrap();
}

/// Parses flat-config lines mentioning bridge-domain instances, maintaining a "current
/// bridge-domain" cursor so follow-on `interface …` / `admin-state …` lines attach to the most
/// recently seen instance. Interface membership is deduplicated per bridge-domain.
pub fn parse_bridge_domain_instances(device_name: &str, output: &str) -> Vec<BridgeDomainInstance> {
    let mut instances: Vec<BridgeDomainInstance> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    let mut current: Option<String> = None;

    for raw_line in output.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.split(INSTANCE_MARKER).nth(1) {
            let rest = rest.trim();
            let Some(name) = rest.split_whitespace().next() else {
                log::debug!("could not parse bridge-domain name on {device_name} from: {line}");
                continue;
            };
            let name = name.to_string();

            let index = *by_name.entry(name.clone()).or_insert_with(|| {
                instances.push(BridgeDomainInstance {
                    name: name.clone(),
                    username: username_from_bridge_domain_name(&name),
                    primary_vlan: vlan_from_bridge_domain_name(&name),
                    scope: scope_from_bridge_domain_name(&name),
                    admin_state_enabled: Some(true),
                    devices: vec![device_name.to_string()],
                    ..Default::default()
                });
                instances.len() - 1
            });
            current = Some(name);

            apply_attributes(&mut instances[index], device_name, line);
            continue;
        }

        let Some(ref name) = current else {
            continue;
        };
        let index = by_name[name];

        if line.contains("interface ") || line.contains("admin-state ") {
            apply_attributes(&mut instances[index], device_name, line);
        }
    }

    instances
}

fn apply_attributes(instance: &mut BridgeDomainInstance, device_name: &str, line: &str) {
    if line.contains("admin-state enabled") {
        instance.admin_state_enabled = Some(true);
    } else if line.contains("admin-state disabled") {
        instance.admin_state_enabled = Some(false);
    }

    if let Some(captures) = INTERFACE_TOKEN.captures(line) {
        let interface_name = captures[1].trim_end_matches('^').to_string();
        instance.add_interface(device_name, interface_name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn attaches_interface_on_same_line() {
        let output =
            "network-services bridge-domain instance DLITVI_V1555_IX_IX interface ge100-0/0/21.1555 ^\n";
        let instances = parse_bridge_domain_instances("LEAF-A", output);
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].name, "DLITVI_V1555_IX_IX");
        assert_eq!(
            instances[0].interfaces,
            vec![("LEAF-A".to_string(), "ge100-0/0/21.1555".to_string())]
        );
    }

    #[test]
    fn attaches_interface_on_following_line() {
        let output = indoc! {"
            network-services bridge-domain instance DLITVI_V1555_IX_IX
            network-services bridge-domain instance DLITVI_V1555_IX_IX interface ge100-0/0/21.1556 ^
            network-services bridge-domain instance DLITVI_V3180_IX_SL2_B51 admin-state enabled
        "};
        let instances = parse_bridge_domain_instances("LEAF-A", output);
        assert_eq!(instances.len(), 2);
        assert_eq!(instances[0].interfaces.len(), 1);
        assert_eq!(instances[1].admin_state_enabled, Some(true));
    }

    #[test]
    fn dedups_interfaces_within_instance() {
        let output = indoc! {"
            network-services bridge-domain instance g_service_v300 interface ge1 ^
            network-services bridge-domain instance g_service_v300 interface ge1 ^
        "};
        let instances = parse_bridge_domain_instances("LEAF-A", output);
        assert_eq!(instances[0].interfaces.len(), 1);
    }

    #[test]
    fn derives_scope_username_and_primary_vlan_from_name() {
        use device_api::model::BridgeDomainScope;

        let output = "network-services bridge-domain instance g_visaev_v251 interface ge100-0/0/21.251 ^\n";
        let instances = parse_bridge_domain_instances("LEAF-A", output);
        assert_eq!(instances[0].scope, BridgeDomainScope::Global);
        assert_eq!(instances[0].username, Some("visaev".to_string()));
        assert_eq!(instances[0].primary_vlan, Some(251));
    }

    #[test]
    fn unrecognized_name_leaves_metadata_unset() {
        let output = "network-services bridge-domain instance bundle-961 interface ge1 ^\n";
        let instances = parse_bridge_domain_instances("LEAF-A", output);
        assert_eq!(instances[0].scope, device_api::model::BridgeDomainScope::Unknown);
        assert_eq!(instances[0].username, None);
        assert_eq!(instances[0].primary_vlan, Some(961));
    }
}
