use std::collections::HashMap;
use std::fs;
use std::process::ExitCode;

use anyhow::{Context, Error};
use chrono::Utc;
use clap::Parser;
use log::{error, info};

use device_api::error::CoreResultExt;
use netdrift::cli::{Cli, Commands};
use netdrift::datastore::Store;
use netdrift::deploy::{self, DriftResolver, InventorySessions};
use netdrift::discovery::{self, SessionBackedDiscovery};
use netdrift::inventory::Inventory;
use netdrift::resolver::{self, StdinPrompt};
use device_api::model::{DeploymentPlan, DriftEvent, ExecutionMode, SyncAction};

/// Prompts on stdin for interactive drift events, discovering and syncing against the live
/// device and persisting the result to the store.
struct InteractiveResolver<'a> {
    discovery: SessionBackedDiscovery<'a>,
    store: &'a mut Store,
    prompt: StdinPrompt,
}

impl DriftResolver for InteractiveResolver<'_> {
    fn resolve(&mut self, event: &DriftEvent) -> SyncAction {
        resolver::resolve_interactive(event, &mut self.discovery, self.store, &mut self.prompt).action
    }
}

/// Resolves drift non-interactively according to a fixed policy (§4.G).
struct AutomaticResolver<'a> {
    discovery: SessionBackedDiscovery<'a>,
    store: &'a mut Store,
    policy: String,
}

impl DriftResolver for AutomaticResolver<'_> {
    fn resolve(&mut self, event: &DriftEvent) -> SyncAction {
        resolver::resolve(event, &self.policy, &mut self.discovery, self.store).action
    }
}

fn load_plan(path: &std::path::Path, mode: ExecutionMode) -> Result<DeploymentPlan, Error> {
    let contents = fs::read_to_string(path).with_context(|| format!("failed to read plan file {}", path.display()))?;
    let per_device_commands: HashMap<String, Vec<String>> =
        serde_yaml::from_str(&contents).with_context(|| format!("failed to parse plan file {}", path.display()))?;
    Ok(DeploymentPlan {
        deployment_id: format!("deploy-{}", Utc::now().format("%Y%m%dT%H%M%SZ")),
        per_device_commands,
        execution_mode: mode,
        parallel: true,
        metadata: HashMap::new(),
    })
}

fn run_probe(
    inventory: &std::path::Path,
    raw_dir: std::path::PathBuf,
    parsed_dir: std::path::PathBuf,
    status_path: &std::path::Path,
) -> Result<(), Error> {
    let inventory = Inventory::load(inventory).unstructured("failed to load inventory")?;
    let config = netdrift::probe::ProbeConfig { raw_dir, parsed_dir };
    let summary = netdrift::probe::run(&inventory, &config).unstructured("probe run failed")?;
    println!("{}", netdrift::probe::render_text_summary(&summary));
    netdrift::probe::write_status_document(&summary, status_path)
        .with_context(|| format!("failed to write status document to {}", status_path.display()))?;
    Ok(())
}

fn run_discover(inventory: &std::path::Path, device: &str, bridge_domain: &str, store_path: &std::path::Path) -> Result<(), Error> {
    let inventory = Inventory::load(inventory).unstructured("failed to load inventory")?;
    let device = inventory
        .get(device)
        .ok_or_else(|| Error::msg(format!("device '{device}' not found in inventory")))?;
    let mut session = device_session::Session::connect(device).unstructured("failed to connect to device")?;
    let (result, records) = discovery::discover_bridge_domain(&mut session, &device.name, bridge_domain)
        .unstructured("bridge domain discovery failed")?;

    let mut store = Store::open(store_path).unstructured("failed to open store")?;
    if !result.success {
        if let Some(message) = &result.error_message {
            error!("{message}");
        }
        return Ok(());
    }
    let discovered = records.len();
    let sync_result = store.update_interface_records(&records);
    info!(
        "discovered {} interfaces for bridge domain {}: {} added, {} updated, {} skipped",
        discovered,
        bridge_domain,
        sync_result.added,
        sync_result.updated,
        sync_result.skipped
    );
    Ok(())
}

fn run_deploy(
    inventory_path: &std::path::Path,
    plan_path: &std::path::Path,
    store_path: &std::path::Path,
    auto_resolve: Option<&str>,
    dry_run: bool,
) -> Result<(), Error> {
    if dry_run {
        let plan = load_plan(plan_path, ExecutionMode::DryRun)?;
        let result = deploy::deploy_dry_run(plan.deployment_id, plan.per_device_commands);
        println!(
            "deployment {} {} (dry run): {} devices",
            result.deployment_id,
            if result.success { "succeeded" } else { "failed" },
            result.execution_results.len()
        );
        return Ok(());
    }

    let inventory = Inventory::load(inventory_path).unstructured("failed to load inventory")?;
    let mut plan = load_plan(plan_path, ExecutionMode::Commit)?;
    let mut store = Store::open(store_path).unstructured("failed to open store")?;
    let sessions = InventorySessions { inventory: &inventory };

    let result = match auto_resolve {
        Some(policy) => {
            let mut resolver = AutomaticResolver {
                discovery: SessionBackedDiscovery { inventory: &inventory },
                store: &mut store,
                policy: policy.to_string(),
            };
            deploy::run(&mut plan, &sessions, &mut resolver)
        }
        None => {
            let mut resolver = InteractiveResolver {
                discovery: SessionBackedDiscovery { inventory: &inventory },
                store: &mut store,
                prompt: StdinPrompt,
            };
            deploy::run(&mut plan, &sessions, &mut resolver)
        }
    };

    println!(
        "deployment {} {}: {} devices, {} drift events",
        result.deployment_id,
        if result.success { "succeeded" } else { "failed" },
        result.execution_results.len(),
        result.drift_events.len()
    );
    for warning in &result.warnings {
        log::warn!("{warning}");
    }
    for message in &result.errors {
        error!("{message}");
    }

    if result.success {
        Ok(())
    } else {
        Err(Error::msg("deployment did not succeed on every device"))
    }
}

fn run_deploy_immediate(inventory_path: &std::path::Path, plan_path: &std::path::Path) -> Result<(), Error> {
    let inventory = Inventory::load(inventory_path).unstructured("failed to load inventory")?;
    let plan = load_plan(plan_path, ExecutionMode::Immediate)?;
    let sessions = InventorySessions { inventory: &inventory };
    let result = deploy::deploy_immediate(plan.deployment_id, plan.per_device_commands, &sessions);

    println!(
        "deployment {} {}: {} devices",
        result.deployment_id,
        if result.success { "succeeded" } else { "failed" },
        result.execution_results.len()
    );
    if result.success {
        Ok(())
    } else {
        Err(Error::msg("deployment did not succeed on every device"))
    }
}

fn run_netdrift(cli: &Cli) -> Result<(), Error> {
    info!("netdrift version: {}", netdrift::cli::NETDRIFT_VERSION);
    match &cli.command {
        Commands::Probe { inventory, raw_dir, parsed_dir, status } => {
            run_probe(inventory, raw_dir.clone(), parsed_dir.clone(), status)
        }
        Commands::Discover { inventory, device, bridge_domain, store } => {
            run_discover(inventory, device, bridge_domain, store)
        }
        Commands::Deploy { inventory, plan, store, auto_resolve, dry_run } => {
            run_deploy(inventory, plan, store, auto_resolve.as_deref(), *dry_run)
        }
        Commands::DeployImmediate { inventory, plan } => run_deploy_immediate(inventory, plan),
    }
}

fn setup_logging(cli: &Cli) -> Result<(), Error> {
    env_logger::builder().format_timestamp(None).filter_level(cli.verbosity).init();
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_logging(&cli) {
        eprintln!("Failed to initialize logging: {e:?}");
        return ExitCode::from(1);
    }

    match run_netdrift(&cli) {
        Ok(()) => {
            info!("{} completed successfully", cli.command.name());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{} failed: {e:?}", cli.command.name());
            ExitCode::from(2)
        }
    }
}
