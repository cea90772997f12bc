//! LLDP neighbor table parser (§4.C). Pure function; never touches the network.

use device_api::model::LldpNeighbor;

/// Parses the textual table produced by `show lldp neighbors`.
///
/// Locates the header row by matching the literal tokens `Interface` and `Neighbor` separated by
/// pipes, then for every subsequent line beginning with a pipe and not a separator, splits on
/// `|`, trims, and yields a neighbor record iff the neighbor-system-name field is non-empty.
pub fn parse_lldp_neighbors(local_device: &str, output: &str) -> Vec<LldpNeighbor> {
    let lines: Vec<&str> = output.lines().collect();

    let Some(header_index) = lines
        .iter()
        .position(|line| line.contains('|') && line.contains("Interface") && line.contains("Neighbor"))
    else {
        log::warn!("could not find LLDP neighbors table header for {local_device}");
        return Vec::new();
    };

    let mut neighbors = Vec::new();
    for line in &lines[header_index + 1..] {
        let line = line.trim();
        if line.is_empty() || !line.starts_with('|') || line.starts_with("|--") {
            continue;
        }

        let parts: Vec<&str> = line.split('|').map(str::trim).collect();
        if parts.len() < 4 {
            log::debug!("skipping short LLDP line on {local_device}: {line}");
            continue;
        }

        let local_interface = parts[1];
        let neighbor_system_name = parts[2];
        let neighbor_interface = parts[3];
        let ttl = parts.get(4).filter(|s| !s.is_empty()).map(|s| s.to_string());

        if neighbor_system_name.is_empty() {
            continue;
        }

        neighbors.push(LldpNeighbor {
            local_device: local_device.to_string(),
            local_interface: local_interface.to_string(),
            neighbor_system_name: neighbor_system_name.to_string(),
            neighbor_interface: neighbor_interface.to_string(),
            ttl,
        });
    }

    neighbors
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn parses_table_and_skips_empty_neighbors() {
        let output = indoc! {"
            | Interface    | Neighbor System Name    | Neighbor interface   | Neighbor TTL   |
            |--------------+-------------------------+----------------------+----------------|
            | ge100-0/0/0  | ARIEL-Metropolis        | ge100-0/0/2          | 120            |
            | ge100-0/0/5  |                         |                      |                |
            | ge100-0/0/36 | DNAAS-SPINE-B09         | ge100-0/0/8          | 120            |
        "};
        let neighbors = parse_lldp_neighbors("LEAF-B14", output);
        assert_eq!(neighbors.len(), 2);
        assert_eq!(neighbors[0].neighbor_system_name, "ARIEL-Metropolis");
        assert_eq!(neighbors[0].local_interface, "ge100-0/0/0");
        assert_eq!(neighbors[1].neighbor_system_name, "DNAAS-SPINE-B09");
    }

    #[test]
    fn missing_header_yields_empty_result() {
        assert!(parse_lldp_neighbors("LEAF-B14", "no table here\n").is_empty());
    }

    #[test]
    fn accepts_placeholder_ttl() {
        let output = indoc! {"
            | Interface   | Neighbor System Name | Neighbor interface | Neighbor TTL |
            |-------------+----------------------+---------------------+--------------|
            | ge100-0/0/0 | PEER-A               | ge1                 |              |
        "};
        let neighbors = parse_lldp_neighbors("LEAF-A", output);
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].ttl, None);
    }
}
