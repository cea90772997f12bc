//! Targeted Discovery (§4.E). On-demand, narrow queries to one device, used on the drift path
//! where a full fleet probe would be too slow. Depends only on a small command-running
//! capability so it can be driven by a real `Session` or a scripted fake.

use std::collections::HashMap;
use std::time::Duration;

use device_api::constants::{
    cmd_show_bd_instance, cmd_show_config_filtered, cmd_show_interfaces_filtered, DEFAULT_PROMPT_TIMEOUT_SECS,
    CMD_SHOW_BRIDGE_DOMAINS,
};
use device_api::error::CoreError;
use device_api::model::{DeviceConfigSnapshot, DiscoverySource, InterfaceKind, InterfaceRecord};
use device_parsers::bridge_domain::parse_bridge_domain_instances;
use device_parsers::naming::vlan_from_interface_name;
use device_session::{ShellTransport, Session};

/// What Targeted Discovery needs from a device conversation. `Session<T>` implements this for
/// any transport; tests drive it with a hand-rolled fake that returns fixed command output.
pub trait CommandRunner {
    fn run(&mut self, command: &str) -> Result<String, CoreError>;
}

impl<T: ShellTransport> CommandRunner for Session<T> {
    fn run(&mut self, command: &str) -> Result<String, CoreError> {
        self.send_until_prompt(command, Duration::from_secs(DEFAULT_PROMPT_TIMEOUT_SECS))
    }
}

/// The result of [`discover_bridge_domain`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeDomainDiscovery {
    pub bd_name: String,
    pub device_name: String,
    pub interfaces: Vec<String>,
    pub success: bool,
    pub error_message: Option<String>,
}

/// Discovers a bridge domain instance's interface list, then resolves each interface's VLAN/L2
/// state in context. A bridge domain absent on this device is not an error: `success` is `false`
/// with an explanatory message, not a `CoreError`.
pub fn discover_bridge_domain(
    runner: &mut impl CommandRunner,
    device_name: &str,
    bd_name: &str,
) -> Result<(BridgeDomainDiscovery, Vec<InterfaceRecord>), CoreError> {
    let output = runner.run(&cmd_show_bd_instance(bd_name))?;
    let instances = parse_bridge_domain_instances(device_name, &output);

    let Some(instance) = instances.into_iter().find(|i| i.name == bd_name) else {
        return Ok((
            BridgeDomainDiscovery {
                bd_name: bd_name.to_string(),
                device_name: device_name.to_string(),
                interfaces: Vec::new(),
                success: false,
                error_message: Some("bridge domain not found on device".to_string()),
            },
            Vec::new(),
        ));
    };

    let interfaces: Vec<String> = instance
        .interfaces
        .iter()
        .filter(|(dev, _)| dev == device_name)
        .map(|(_, iface)| iface.clone())
        .collect();

    let mut records = Vec::new();
    for interface in &interfaces {
        let base_pattern = base_interface_pattern(interface);
        records.extend(discover_interface_in_context(runner, device_name, base_pattern, interface)?);
    }

    Ok((
        BridgeDomainDiscovery {
            bd_name: bd_name.to_string(),
            device_name: device_name.to_string(),
            interfaces,
            success: true,
            error_message: None,
        },
        records,
    ))
}

/// Runs the interface-table and running-config queries for `base_interface_pattern`, merges the
/// two streams by normalized interface name, and returns records for every interface that matched
/// `base_interface_pattern` — ordered as the interface table presented them.
pub fn discover_interface_in_context(
    runner: &mut impl CommandRunner,
    device_name: &str,
    base_interface_pattern: &str,
    target_interface: &str,
) -> Result<Vec<InterfaceRecord>, CoreError> {
    let table_output = runner.run(&cmd_show_interfaces_filtered(base_interface_pattern))?;
    let config_output = runner.run(&cmd_show_config_filtered(base_interface_pattern))?;

    let table_records = parse_interface_table(device_name, &table_output);
    let config_by_interface = parse_running_config(device_name, &config_output);

    let mut merged = Vec::new();
    for mut record in table_records {
        if record.interface_name != target_interface && !record.interface_name.starts_with(base_interface_pattern) {
            continue;
        }

        if let Some(config) = config_by_interface.get(&record.interface_name) {
            if let Some(vlan) = config.vlan_id {
                record.set_vlan_checked(vlan);
            }
            record.l2_service_enabled = config.l2_service_enabled;
            record.raw_cli_lines = config.raw_cli_lines.clone();
            record.source = DiscoverySource::Merged;
        }

        merged.push(record);
    }

    Ok(merged)
}

/// A broader variant of [`discover_interface_in_context`] that returns every
/// `interfaces … vlan-id …` record, optionally restricted to `pattern`.
pub fn discover_interface_vlans(
    runner: &mut impl CommandRunner,
    device_name: &str,
    pattern: Option<&str>,
) -> Result<Vec<InterfaceRecord>, CoreError> {
    let command = match pattern {
        Some(pattern) => cmd_show_config_filtered(pattern),
        None => device_api::constants::CMD_SHOW_VLAN_CONFIG.to_string(),
    };
    let output = runner.run(&command)?;
    let config_by_interface = parse_running_config(device_name, &output);
    Ok(config_by_interface.into_values().collect())
}

/// Enumerates every bridge domain on `device_name` and discovers each in turn.
pub fn discover_device_full(
    runner: &mut impl CommandRunner,
    device_name: &str,
) -> Result<DeviceConfigSnapshot, CoreError> {
    let listing = runner.run(CMD_SHOW_BRIDGE_DOMAINS)?;
    let mut bridge_domains = Vec::new();
    for bd_name in bridge_domain_names(&listing) {
        let output = runner.run(&cmd_show_bd_instance(&bd_name))?;
        if let Some(instance) = parse_bridge_domain_instances(device_name, &output)
            .into_iter()
            .find(|i| i.name == bd_name)
        {
            bridge_domains.push(instance);
        }
    }
    Ok(DeviceConfigSnapshot {
        device_name: device_name.to_string(),
        bridge_domains,
    })
}

/// Thin wrapper: derives the base interface pattern and filters for an exact match, falling back
/// to the closest VLAN match if no exact name is present.
pub fn discover_specific_interface(
    runner: &mut impl CommandRunner,
    device_name: &str,
    interface_name: &str,
) -> Result<Option<InterfaceRecord>, CoreError> {
    let base = base_interface_pattern(interface_name);
    let records = discover_interface_in_context(runner, device_name, base, interface_name)?;

    if let Some(exact) = records.iter().find(|r| r.interface_name == interface_name) {
        return Ok(Some(exact.clone()));
    }

    let target_vlan = vlan_from_interface_name(interface_name);
    Ok(records
        .into_iter()
        .min_by_key(|r| match (r.vlan_id, target_vlan) {
            (Some(found), Some(target)) => (found as i32 - target as i32).unsigned_abs(),
            _ => u32::MAX,
        }))
}

fn base_interface_pattern(interface_name: &str) -> &str {
    interface_name.split('.').next().unwrap_or(interface_name)
}

/// Parses `network-services bridge-domain | no-more` table rows into bridge-domain names.
fn bridge_domain_names(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
            let name = cols.first()?;
            if name.starts_with('-') || name.eq_ignore_ascii_case("name") {
                None
            } else {
                Some(name.to_string())
            }
        })
        .collect()
}

/// Parses `show interfaces | no-more | i <pattern>` table output. Strips the table-form ` (L2)`
/// marker for matching but remembers it implied a subinterface.
fn parse_interface_table(device_name: &str, output: &str) -> Vec<InterfaceRecord> {
    let mut records = Vec::new();

    for line in output.lines() {
        if !line.contains('|') {
            continue;
        }
        let columns: Vec<&str> = line.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
        if columns.len() < 2 {
            continue;
        }

        let raw_name = columns[0];
        if raw_name.eq_ignore_ascii_case("interface") {
            continue;
        }
        let is_l2 = raw_name.contains("(L2)");
        let interface_name = raw_name.replace(" (L2)", "").trim().to_string();
        if interface_name.is_empty() {
            continue;
        }

        let admin_status = columns.get(1).map(|s| s.to_string());
        let oper_status = columns.get(2).map(|s| s.to_string());
        let vlan_id = vlan_from_interface_name(&interface_name);
        let kind = if interface_name.contains('.') || is_l2 {
            InterfaceKind::Subinterface
        } else if interface_name.starts_with("bundle-") {
            InterfaceKind::Bundle
        } else {
            InterfaceKind::Physical
        };

        records.push(InterfaceRecord {
            device_name: device_name.to_string(),
            interface_name,
            interface_kind: kind,
            vlan_id,
            admin_status,
            oper_status,
            bundle_id: None,
            subinterface_id: None,
            l2_service_enabled: false,
            description: None,
            raw_cli_lines: Vec::new(),
            source: DiscoverySource::InterfaceTable,
        });
    }

    records
}

/// Parses `show config | fl | i <pattern>` output for per-interface vlan-id / l2-service /
/// admin-state lines, keyed by interface name.
fn parse_running_config(device_name: &str, output: &str) -> HashMap<String, InterfaceRecord> {
    let mut by_interface: HashMap<String, InterfaceRecord> = HashMap::new();

    for line in output.lines() {
        let line = line.trim();
        let mut tokens = line.split_whitespace();
        let Some(first) = tokens.next() else { continue };
        if first != "interfaces" {
            continue;
        }
        let Some(interface_name) = tokens.next() else { continue };
        let Some(attribute) = tokens.next() else { continue };
        let Some(value) = tokens.next() else { continue };

        let record = by_interface
            .entry(interface_name.to_string())
            .or_insert_with(|| InterfaceRecord {
                device_name: device_name.to_string(),
                interface_name: interface_name.to_string(),
                interface_kind: if interface_name.contains('.') {
                    InterfaceKind::Subinterface
                } else {
                    InterfaceKind::Physical
                },
                vlan_id: None,
                admin_status: None,
                oper_status: None,
                bundle_id: None,
                subinterface_id: None,
                l2_service_enabled: false,
                description: None,
                raw_cli_lines: Vec::new(),
                source: DiscoverySource::RunningConfig,
            });

        match attribute {
            "vlan-id" => {
                if let Ok(vlan) = value.parse::<u16>() {
                    record.set_vlan_checked(vlan);
                }
            }
            "l2-service" => record.l2_service_enabled = value == "enabled",
            "admin-state" => record.admin_status = Some(value.to_string()),
            _ => {}
        }
        record.raw_cli_lines.push(line.to_string());
    }

    by_interface
}

/// Opens a fresh session against a device looked up from the inventory for each discovery call.
/// The sync resolver (§4.G) is kept agnostic of how a device is reached; this is the real-device
/// implementation of its `InterfaceDiscovery` capability.
pub struct SessionBackedDiscovery<'a> {
    pub inventory: &'a crate::inventory::Inventory,
}

impl crate::resolver::InterfaceDiscovery for SessionBackedDiscovery<'_> {
    fn discover_interface_vlans(
        &mut self,
        device_name: &str,
        base_pattern: Option<&str>,
    ) -> Result<Vec<InterfaceRecord>, CoreError> {
        let device = self.inventory.get(device_name).ok_or_else(|| {
            CoreError::new(device_api::error::SessionError::Unreachable {
                device: device_name.to_string(),
            })
        })?;
        let mut session = Session::connect(device)?;
        discover_interface_vlans(&mut session, device_name, base_pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::collections::VecDeque;

    struct ScriptedRunner {
        outputs: VecDeque<&'static str>,
    }

    impl ScriptedRunner {
        fn new(outputs: impl IntoIterator<Item = &'static str>) -> Self {
            ScriptedRunner {
                outputs: outputs.into_iter().collect(),
            }
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&mut self, _command: &str) -> Result<String, CoreError> {
            Ok(self.outputs.pop_front().unwrap_or_default().to_string())
        }
    }

    #[test]
    fn discover_bridge_domain_merges_table_and_config() {
        let bd_output = indoc! {r#"
            network-services bridge-domain instance g_visaev_v251 interface ge100-0/0/31.251
        "#};
        let table_output = indoc! {"
            | Interface | Admin | Oper |
            | ge100-0/0/31.251 (L2) | up | up |
        "};
        let config_output = indoc! {"
            interfaces ge100-0/0/31.251 vlan-id 251
            interfaces ge100-0/0/31.251 l2-service enabled
        "};

        let mut runner = ScriptedRunner::new([bd_output, table_output, config_output]);
        let (discovery, records) = discover_bridge_domain(&mut runner, "LEAF-A", "g_visaev_v251").unwrap();

        assert!(discovery.success);
        assert_eq!(discovery.interfaces, vec!["ge100-0/0/31.251".to_string()]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].vlan_id, Some(251));
        assert!(records[0].l2_service_enabled);
        assert_eq!(records[0].source, DiscoverySource::Merged);
    }

    #[test]
    fn bridge_domain_not_found_is_reported_not_raised() {
        let mut runner = ScriptedRunner::new(["no matching configuration\n"]);
        let (discovery, records) = discover_bridge_domain(&mut runner, "LEAF-A", "g_missing").unwrap();
        assert!(!discovery.success);
        assert!(records.is_empty());
        assert_eq!(discovery.error_message.as_deref(), Some("bridge domain not found on device"));
    }

    #[test]
    fn interface_in_context_tolerates_empty_config_output() {
        let table_output = indoc! {"
            | Interface | Admin | Oper |
            | ge100-0/0/31.251 | up | up |
        "};
        let mut runner = ScriptedRunner::new([table_output, ""]);
        let records =
            discover_interface_in_context(&mut runner, "LEAF-A", "ge100-0/0/31", "ge100-0/0/31.251").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, DiscoverySource::InterfaceTable);
    }

    #[test]
    fn discover_specific_interface_falls_back_to_closest_vlan() {
        let table_output = indoc! {"
            | Interface | Admin | Oper |
            | ge100-0/0/31.250 | up | up |
            | ge100-0/0/31.252 | up | up |
        "};
        let mut runner = ScriptedRunner::new([table_output, "", table_output, ""]);
        let record = discover_specific_interface(&mut runner, "LEAF-A", "ge100-0/0/31.251")
            .unwrap()
            .unwrap();
        assert!(record.interface_name == "ge100-0/0/31.250" || record.interface_name == "ge100-0/0/31.252");
    }

    #[test]
    fn discover_device_full_enumerates_and_collects_each_instance() {
        let listing = indoc! {"
            | Name |
            | g_visaev_v251 |
        "};
        let bd_output = "network-services bridge-domain instance g_visaev_v251 interface ge100-0/0/31.251\n";
        let mut runner = ScriptedRunner::new([listing, bd_output]);
        let snapshot = discover_device_full(&mut runner, "LEAF-A").unwrap();
        assert_eq!(snapshot.bridge_domains.len(), 1);
        assert_eq!(snapshot.bridge_domains[0].name, "g_visaev_v251");
    }
}
