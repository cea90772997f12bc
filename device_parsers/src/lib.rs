pub mod bridge_domain;
pub mod lacp;
pub mod lldp;
pub mod naming;
pub mod vlan;
pub mod xml;
