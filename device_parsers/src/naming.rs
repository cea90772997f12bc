//! VLAN id derivation from interface and bridge-domain names (§4.C "VLAN derivation from names").

use lazy_static::lazy_static;
use regex::Regex;

use device_api::constants::validate_vlan_range;
use device_api::model::BridgeDomainScope;

lazy_static! {
    /// Matches the trailing dotted subinterface component, e.g. `...ge100-0/0/5.300`.
    static ref TRAILING_DOT_SUFFIX: Regex = Regex::new(r"\.(\d+)$").unwrap();
}

/// Extracts a VLAN id from an interface name by reading the trailing dotted component
/// (`…-<chassis>/<slot>/<port>.<vlan>`). Returns `None` if absent or out of range.
pub fn vlan_from_interface_name(interface_name: &str) -> Option<u16> {
    let captures = TRAILING_DOT_SUFFIX.captures(interface_name)?;
    let vlan: u16 = captures[1].parse().ok()?;
    validate_vlan_range(vlan).then_some(vlan)
}

lazy_static! {
    /// Tried in order; the first pattern to match a bridge-domain name wins (§4.C).
    static ref BD_NAME_VLAN_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"_v(\d+)_").unwrap(),
        Regex::new(r"_v(\d+)$").unwrap(),
        Regex::new(r"-(\d+)$").unwrap(),
        Regex::new(r"_(\d+)_").unwrap(),
        Regex::new(r"_(\d+)$").unwrap(),
    ];
}

/// Extracts a VLAN id from a bridge-domain service name by trying a small ordered list of
/// patterns. Returns `None` if no pattern matches or the extracted id is out of range.
pub fn vlan_from_bridge_domain_name(bd_name: &str) -> Option<u16> {
    for pattern in BD_NAME_VLAN_PATTERNS.iter() {
        if let Some(captures) = pattern.captures(bd_name) {
            if let Ok(vlan) = captures[1].parse::<u16>() {
                if validate_vlan_range(vlan) {
                    return Some(vlan);
                }
            }
        }
    }
    None
}

/// A bridge-domain name's leading scope letter (`g` global, `l` local) followed by `_`, if
/// present. Best-effort metadata, never a substitute for the external classifier (§1).
pub fn scope_from_bridge_domain_name(bd_name: &str) -> BridgeDomainScope {
    let mut chars = bd_name.chars();
    match (chars.next(), chars.next()) {
        (Some('g'), Some('_')) => BridgeDomainScope::Global,
        (Some('l'), Some('_')) => BridgeDomainScope::Local,
        _ => BridgeDomainScope::Unknown,
    }
}

lazy_static! {
    /// Tried in order: `g_<user>_v251` / `l_<user>_v251`, then `<user>_v251`, then a bare
    /// `g_<user>…` with no VLAN token at all.
    static ref BD_NAME_USERNAME_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"^[gl]_([^_]+)_v\d+").unwrap(),
        Regex::new(r"^([^_]+)_v\d+").unwrap(),
        Regex::new(r"^[gl]_([^_]+)").unwrap(),
    ];
}

/// Extracts the owning username embedded in a bridge-domain service name, trying a small ordered
/// list of patterns (§3 "derivation is best-effort and never overrides explicit values").
pub fn username_from_bridge_domain_name(bd_name: &str) -> Option<String> {
    BD_NAME_USERNAME_PATTERNS
        .iter()
        .find_map(|pattern| pattern.captures(bd_name).map(|c| c[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interface_name_trailing_dot_suffix() {
        assert_eq!(vlan_from_interface_name("ge100-0/0/5.300"), Some(300));
        assert_eq!(vlan_from_interface_name("bundle-447.447"), Some(447));
        assert_eq!(vlan_from_interface_name("ge100-0/0/5"), None);
        assert_eq!(vlan_from_interface_name("ge100-0/0/5.9999"), None);
    }

    #[test]
    fn bridge_domain_name_patterns_in_order() {
        assert_eq!(vlan_from_bridge_domain_name("g_visaev_v251"), Some(251));
        assert_eq!(vlan_from_bridge_domain_name("DLITVI_V1555_IX_IX".to_lowercase().as_str()), Some(1555));
        assert_eq!(vlan_from_bridge_domain_name("bundle-961"), Some(961));
        assert_eq!(vlan_from_bridge_domain_name("g_service_300_east"), Some(300));
        assert_eq!(vlan_from_bridge_domain_name("g_service_300"), Some(300));
        assert_eq!(vlan_from_bridge_domain_name("no_vlan_here"), None);
    }

    #[test]
    fn out_of_range_derived_vlan_is_discarded() {
        assert_eq!(vlan_from_bridge_domain_name("g_service_v9999_east"), None);
    }

    #[test]
    fn scope_letter_recognized_when_followed_by_underscore() {
        assert_eq!(scope_from_bridge_domain_name("g_visaev_v251"), BridgeDomainScope::Global);
        assert_eq!(scope_from_bridge_domain_name("l_visaev_v251"), BridgeDomainScope::Local);
        assert_eq!(scope_from_bridge_domain_name("bundle-961"), BridgeDomainScope::Unknown);
        assert_eq!(scope_from_bridge_domain_name("gigantic_v1"), BridgeDomainScope::Unknown);
    }

    #[test]
    fn username_extracted_in_pattern_order() {
        assert_eq!(username_from_bridge_domain_name("g_visaev_v251"), Some("visaev".to_string()));
        assert_eq!(username_from_bridge_domain_name("visaev_v251"), Some("visaev".to_string()));
        assert_eq!(username_from_bridge_domain_name("g_visaev-legacy"), Some("visaev-legacy".to_string()));
        assert_eq!(username_from_bridge_domain_name("bundle-961"), None);
    }
}
