use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::LevelFilter;

pub const NETDRIFT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[clap(version = NETDRIFT_VERSION)]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(global = true, short, long, default_value_t = LevelFilter::Info)]
    pub verbosity: LevelFilter,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Connect to every usable device in the inventory and collect LACP, LLDP, bridge-domain and
    /// VLAN artifacts
    Probe {
        /// Path to the device inventory file (YAML or JSON)
        #[clap(index = 1)]
        inventory: PathBuf,

        /// Directory raw CLI/XML output is written to
        #[clap(long, default_value = "raw")]
        raw_dir: PathBuf,

        /// Directory parsed JSON artifacts are written to
        #[clap(long, default_value = "parsed")]
        parsed_dir: PathBuf,

        /// Path the machine-readable status document (§6) is written to
        #[clap(long, default_value = "probe_status.json")]
        status: PathBuf,
    },

    /// Re-discover and store a bridge domain's configuration across the devices that carry it
    Discover {
        /// Path to the device inventory file
        #[clap(index = 1)]
        inventory: PathBuf,

        /// Device to query
        #[clap(long)]
        device: String,

        /// Bridge domain name
        #[clap(long)]
        bridge_domain: String,

        /// Path to the persistent store
        #[clap(long, default_value = "netdrift.db")]
        store: PathBuf,
    },

    /// Apply a deployment plan with commit-check, drift detection, commit and validation
    Deploy {
        /// Path to the device inventory file
        #[clap(index = 1)]
        inventory: PathBuf,

        /// Path to a deployment plan file (YAML mapping of device name to command list)
        #[clap(long)]
        plan: PathBuf,

        /// Path to the persistent store used to resolve and record drift
        #[clap(long, default_value = "netdrift.db")]
        store: PathBuf,

        /// Resolve drift automatically instead of prompting an operator
        #[clap(long, value_name = "POLICY")]
        auto_resolve: Option<String>,

        /// Validate the plan without opening any device connection
        #[clap(long)]
        dry_run: bool,
    },

    /// Apply a command set directly, skipping commit-check and drift resolution
    DeployImmediate {
        /// Path to the device inventory file
        #[clap(index = 1)]
        inventory: PathBuf,

        /// Path to a deployment plan file (YAML mapping of device name to command list)
        #[clap(long)]
        plan: PathBuf,
    },
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Probe { .. } => "probe",
            Commands::Discover { .. } => "discover",
            Commands::Deploy { .. } => "deploy",
            Commands::DeployImmediate { .. } => "deploy-immediate",
        }
    }
}
