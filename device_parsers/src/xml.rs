//! LACP/LLDP XML parsers (§4.C). Each walks a `<config>…</config>` subtree namespace-agnostically
//! (matching on tag local-name, ignoring any `prefix:` before it) to extract bundle membership or
//! per-interface neighbor elements. Malformed XML yields the empty result with a warning; it
//! never raises, per the parser error policy.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use device_api::model::{DiscoverySource, LacpBundle, LacpStatus, LldpNeighbor};

/// Returns the tag's local name, stripping any `prefix:` namespace qualifier.
fn local_name(tag: &[u8]) -> String {
    let s = String::from_utf8_lossy(tag);
    s.rsplit(':').next().unwrap_or(&s).to_string()
}

/// Walks a LACP `<config>` subtree and extracts one [`LacpBundle`] per `interface`/`bundle`
/// element found, using child element text for the bundle name and nested `member`/`interface`
/// children for membership. Returns the empty map on malformed XML.
pub fn parse_lacp_xml(device_name: &str, xml: &str) -> HashMap<String, LacpBundle> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut bundles = HashMap::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current_bundle: Option<String> = None;
    let mut current_member: Option<String> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "lag" || name == "bundle" || name == "aggregate" {
                    current_bundle = None;
                }
                if name == "member" || name == "interface" {
                    current_member = None;
                }
                stack.push(name);
                text_buf.clear();
            }
            Ok(Event::Text(e)) => {
                text_buf = e.unescape().unwrap_or_default().trim().to_string();
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "name" | "lag-id" | "bundle-name" if in_bundle_context(&stack) => {
                        if !text_buf.is_empty() && current_bundle.is_none() {
                            current_bundle = Some(text_buf.clone());
                            bundles.entry(text_buf.clone()).or_insert_with(|| LacpBundle {
                                bundle_name: text_buf.clone(),
                                device_name: device_name.to_string(),
                                local_key: None,
                                peer_key: None,
                                peer_system_id: None,
                                member_interfaces: Vec::new(),
                                status: LacpStatus::Active,
                            });
                        }
                    }
                    "member" | "interface" | "port" if in_member_context(&stack) => {
                        if !text_buf.is_empty() {
                            current_member = Some(text_buf.clone());
                        }
                    }
                    _ => {}
                }

                if (name == "member" || name == "port") && stack.len() >= 2 {
                    if let (Some(bundle), Some(member)) = (&current_bundle, current_member.take()) {
                        if let Some(b) = bundles.get_mut(bundle) {
                            if !b.member_interfaces.contains(&member) {
                                b.member_interfaces.push(member);
                            }
                        }
                    }
                }

                stack.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("malformed LACP XML on {device_name}: {e}");
                return HashMap::new();
            }
        }
    }

    bundles
}

fn in_bundle_context(stack: &[String]) -> bool {
    stack
        .iter()
        .rev()
        .nth(1)
        .is_some_and(|p| p == "lag" || p == "bundle" || p == "aggregate")
}

fn in_member_context(stack: &[String]) -> bool {
    stack
        .iter()
        .rev()
        .nth(1)
        .is_some_and(|p| p == "members" || p == "member-interfaces" || p == "member")
}

/// Walks an LLDP `<config>` subtree, yielding one [`LldpNeighbor`] per per-interface neighbor
/// sub-element. Returns the empty vec on malformed XML.
pub fn parse_lldp_xml(device_name: &str, xml: &str) -> Vec<LldpNeighbor> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut neighbors = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut local_interface = String::new();
    let mut neighbor_system_name = String::new();
    let mut neighbor_interface = String::new();
    let mut ttl: Option<String> = None;
    let mut text_buf = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "interface" {
                    local_interface.clear();
                    neighbor_system_name.clear();
                    neighbor_interface.clear();
                    ttl = None;
                }
                stack.push(name);
                text_buf.clear();
            }
            Ok(Event::Text(e)) => {
                text_buf = e.unescape().unwrap_or_default().trim().to_string();
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.name().as_ref());
                match name.as_str() {
                    "name" if stack.iter().rev().nth(1).is_some_and(|p| p == "interface") => {
                        local_interface = text_buf.clone();
                    }
                    "system-name" => neighbor_system_name = text_buf.clone(),
                    "port-id" | "remote-interface" => neighbor_interface = text_buf.clone(),
                    "ttl" => ttl = Some(text_buf.clone()),
                    "interface" => {
                        if !neighbor_system_name.is_empty() {
                            neighbors.push(LldpNeighbor {
                                local_device: device_name.to_string(),
                                local_interface: local_interface.clone(),
                                neighbor_system_name: neighbor_system_name.clone(),
                                neighbor_interface: neighbor_interface.clone(),
                                ttl: ttl.clone(),
                            });
                        }
                    }
                    _ => {}
                }
                stack.pop();
                text_buf.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::warn!("malformed LLDP XML on {device_name}: {e}");
                return Vec::new();
            }
        }
    }

    neighbors
}

/// Tag applied to records parsed from XML, for provenance tracking during merge (§4.E).
pub const XML_SOURCE: DiscoverySource = DiscoverySource::RunningConfig;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lacp_bundle_with_members() {
        let xml = r#"<config>
            <lacp xmlns="urn:dnos:lacp">
                <lag>
                    <name>bundle-60000</name>
                    <members>
                        <member><interface>ge100-0/0/36</interface></member>
                        <member><interface>ge100-0/0/37</interface></member>
                    </members>
                </lag>
            </lacp>
        </config>"#;
        let bundles = parse_lacp_xml("LEAF-A", xml);
        let bundle = &bundles["bundle-60000"];
        assert_eq!(bundle.member_interfaces.len(), 2);
    }

    #[test]
    fn malformed_lacp_xml_yields_empty_map() {
        let bundles = parse_lacp_xml("LEAF-A", "<config><lag><name>oops</lag></config>");
        assert!(bundles.is_empty());
    }

    #[test]
    fn parses_lldp_neighbor_per_interface() {
        let xml = r#"<config>
            <lldp:interface xmlns:lldp="urn:dnos:lldp">
                <lldp:name>ge100-0/0/0</lldp:name>
                <lldp:system-name>ARIEL-Metropolis</lldp:system-name>
                <lldp:port-id>ge100-0/0/2</lldp:port-id>
                <lldp:ttl>120</lldp:ttl>
            </lldp:interface>
        </config>"#;
        let neighbors = parse_lldp_xml("LEAF-A", xml);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].neighbor_system_name, "ARIEL-Metropolis");
        assert_eq!(neighbors[0].local_interface, "ge100-0/0/0");
    }

    #[test]
    fn malformed_lldp_xml_yields_empty_vec() {
        let neighbors = parse_lldp_xml("LEAF-A", "<config><interface></config>");
        assert!(neighbors.is_empty());
    }
}
