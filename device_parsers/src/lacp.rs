//! LACP parsers (§4.C): the interactive `show lacp interfaces` bundle parser and the two-line
//! `show lacp interfaces` counters parser that maps physical members to their bundle.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use device_api::model::{LacpBundle, LacpStatus};

lazy_static! {
    static ref LOCAL_KEY: Regex = Regex::new(r"Key:\s*(\d+)").unwrap();
    static ref PEER_KEY: Regex = Regex::new(r"Key:\s*(\d+|N/A)").unwrap();
    static ref PEER_SYSTEM_ID: Regex = Regex::new(r"System-id:\s*([a-fA-F0-9:]+|N/A)").unwrap();
}

/// Parses the interactive `show lacp interfaces` output: scans sections delimited by
/// `Aggregate Interface: <name>`, extracts `Local Key`, `Peer Key`, `Peer System-id` from header
/// lines, then parses the tabular body, yielding one member-interface per `actor` row (ignoring
/// `partner` rows to avoid duplication). Status defaults to `active`; a `standby` actor row
/// demotes the whole bundle to `standby`.
pub fn parse_lacp_interfaces(device_name: &str, output: &str) -> HashMap<String, LacpBundle> {
    let mut bundles = HashMap::new();
    let mut current: Option<String> = None;
    let mut in_table = false;

    for raw_line in output.lines() {
        let line = raw_line.trim();

        if let Some(name) = line.strip_prefix("Aggregate Interface:") {
            let bundle_name = name.trim().to_string();
            bundles.insert(
                bundle_name.clone(),
                LacpBundle {
                    bundle_name: bundle_name.clone(),
                    device_name: device_name.to_string(),
                    local_key: None,
                    peer_key: None,
                    peer_system_id: None,
                    member_interfaces: Vec::new(),
                    status: LacpStatus::Active,
                },
            );
            current = Some(bundle_name);
            in_table = false;
            continue;
        }

        let Some(bundle_name) = current.clone() else {
            continue;
        };

        if line.contains("Key:") && line.contains("Local:") {
            if let Some(c) = LOCAL_KEY.captures(line) {
                bundles.get_mut(&bundle_name).unwrap().local_key = Some(c[1].to_string());
            }
            continue;
        }
        if line.contains("Key:") && line.contains("Peer:") {
            if let Some(c) = PEER_KEY.captures(line) {
                if &c[1] != "N/A" {
                    bundles.get_mut(&bundle_name).unwrap().peer_key = Some(c[1].to_string());
                }
            }
            continue;
        }
        if line.contains("System-id:") && line.contains("Peer:") {
            if let Some(c) = PEER_SYSTEM_ID.captures(line) {
                if &c[1] != "N/A" {
                    bundles.get_mut(&bundle_name).unwrap().peer_system_id = Some(c[1].to_string());
                }
            }
            continue;
        }

        if line.contains("| Interface") && line.contains("| Role") {
            in_table = true;
            continue;
        }

        if in_table && (line.is_empty() || line.starts_with("Aggregate Interface:")) {
            in_table = false;
            continue;
        }

        if in_table && line.starts_with('|') && !line.starts_with("|--") {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 7 {
                log::debug!("skipping short LACP table line on {device_name}: {line}");
                continue;
            }
            let interface_name = parts[1];
            let role = parts[2];
            let port_state = parts[3];

            if role == "actor" {
                let bundle = bundles.get_mut(&bundle_name).unwrap();
                bundle.member_interfaces.push(interface_name.to_string());
                if port_state == "standby" {
                    bundle.status = LacpStatus::Standby;
                }
            }
        }
    }

    bundles
}

/// Parses the two-line-per-record `show lacp interfaces` counters table: the first line names
/// the interface (bundle or physical), the second, indented continuation line carries the
/// Bundle-Id column. Emits member→bundle mappings by pairing a physical-interface line with the
/// bundle id on its continuation.
pub fn parse_lacp_counters(device_name: &str, output: &str) -> HashMap<String, LacpBundle> {
    let mut bundles: HashMap<String, LacpBundle> = HashMap::new();
    let lines: Vec<&str> = output.lines().collect();

    for (idx, raw_line) in lines.iter().enumerate() {
        let line = raw_line.trim();

        if line.starts_with('|') && line.contains("bundle-") {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 4 {
                continue;
            }
            let interface_name = parts[1];
            let oper_status = parts[3];
            let bundle_name = interface_name
                .split(' ')
                .next()
                .unwrap_or(interface_name)
                .split('.')
                .next()
                .unwrap_or(interface_name)
                .to_string();
            if !bundle_name.starts_with("bundle-") {
                continue;
            }
            let entry = bundles.entry(bundle_name.clone()).or_insert_with(|| LacpBundle {
                bundle_name: bundle_name.clone(),
                device_name: device_name.to_string(),
                local_key: None,
                peer_key: None,
                peer_system_id: None,
                member_interfaces: Vec::new(),
                status: status_from_str(oper_status),
            });
            if !interface_name.contains('.') {
                entry.status = status_from_str(oper_status);
            }
            continue;
        }

        if line.starts_with('|') && line.contains("ge") && !line.contains("bundle-") {
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 2 {
                continue;
            }
            let interface_name = parts[1];
            if !interface_name.starts_with("ge") || interface_name == "Interface" {
                continue;
            }

            let bundle_id = lines.get(idx + 1).and_then(|next_line| {
                if !next_line.contains('|') || !next_line.starts_with(' ') {
                    return None;
                }
                let next_parts: Vec<&str> = next_line.split('|').map(str::trim).collect();
                next_parts.get(7).and_then(|id| {
                    id.chars()
                        .all(|c| c.is_ascii_digit())
                        .then(|| format!("bundle-{id}"))
                        .filter(|_| !id.is_empty())
                })
            });

            if let Some(bundle_id) = bundle_id {
                if let Some(bundle) = bundles.get_mut(&bundle_id) {
                    bundle.member_interfaces.push(interface_name.to_string());
                } else {
                    log::debug!(
                        "interface {interface_name} on {device_name} has bundle id {bundle_id} but bundle not found"
                    );
                }
            }
        }
    }

    bundles
}

fn status_from_str(s: &str) -> LacpStatus {
    match s.to_lowercase().as_str() {
        "standby" => LacpStatus::Standby,
        "down" => LacpStatus::Down,
        "up" => LacpStatus::Up,
        _ => LacpStatus::Active,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_bundle_headers_and_actor_members() {
        let output = indoc! {"
            Aggregate Interface: bundle-60000
                    Local:
                            Mode: active, Period: short, Key: 60000
                    Peer:
                            Mode: active, Key: 60003
                            System-priority: 1, System-id: 84:40:76:1e:e5:35

            | Interface    | Role    | Port State   | Protocol State   | Port Priority   | Port Id   | Period   |
            |--------------+---------+--------------+------------------+-----------------+-----------+----------|
            | ge100-0/0/36 | actor   | active       | ascd             | 32768           | 37        | short    |
            | ge100-0/0/36 | partner | active       | ascd             | 32768           | 9         | short    |
        "};
        let bundles = parse_lacp_interfaces("LEAF-B14", output);
        let bundle = &bundles["bundle-60000"];
        assert_eq!(bundle.member_interfaces, vec!["ge100-0/0/36".to_string()]);
        assert_eq!(bundle.local_key, Some("60000".to_string()));
        assert_eq!(bundle.peer_key, Some("60003".to_string()));
        assert_eq!(bundle.peer_system_id, Some("84:40:76:1e:e5:35".to_string()));
        assert_eq!(bundle.status, LacpStatus::Active);
    }

    #[test]
    fn standby_actor_demotes_bundle_status() {
        let output = indoc! {"
            Aggregate Interface: bundle-445
                    Peer:
                            Mode: N/A, Key: N/A

            | Interface    | Role    | Port State   | Protocol State   | Port Priority   | Port Id   | Period   |
            |--------------+---------+--------------+------------------+-----------------+-----------+----------|
            | ge100-0/0/9  | actor   | standby      | N/A              | 32768           | 10        | short    |
            | ge100-0/0/9  | partner |              |                  |                 |           |          |
        "};
        let bundles = parse_lacp_interfaces("LEAF-B14", output);
        assert_eq!(bundles["bundle-445"].status, LacpStatus::Standby);
        assert_eq!(bundles["bundle-445"].peer_key, None);
    }

    #[test]
    fn counters_pair_physical_interface_with_continuation_bundle_id() {
        let output = concat!(
            "| bundle-60000 | enabled | up |  |\n",
            "| ge100-0/0/36 | enabled | up |  |\n",
            " | a | b | c | d | e | f | 60000 |\n",
        );
        let bundles = parse_lacp_counters("LEAF-B14", output);
        assert_eq!(
            bundles["bundle-60000"].member_interfaces,
            vec!["ge100-0/0/36".to_string()]
        );
    }
}
