//main.rs
//
//Provisions a Windows VM with its network in Azure, tags it, attaches and
//detaches disks, power-cycles it, then deletes everything again.

// ========== General Data ===========
#[macro_use]
mod logger;
#[macro_use]
mod utils;
mod error;
mod paths;
mod auth;
mod shell_tools;
// =========== Azure =============
mod azuresir;
mod cloud_functions;
mod pipelines;

use anyhow::{anyhow, Context, Result};
use cloud_functions::azure::AzureCli;
use cloud_functions::simulated::SimulatedAzure;
use cloud_functions::AzureClient;
use pipelines::confirm::{AutoConfirm, ConsoleConfirm};
use pipelines::{ManageVmPipeline, RunReport};
use std::env;
use utils::global_config::{self, SampleConfig};

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    let assume_yes = args.iter().any(|a| a == "--yes" || a == "-y");
    let command = args.iter()
        .find(|a| !a.starts_with('-'))
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| "run".to_string());

    let res = match command.as_ref() {
        "run" => run_azure(assume_yes),
        "simulate" | "sim" => simulate(),
        "delete" | "remove" | "clean" | "rm" | "del" => clean_azure(),
        other => Err(anyhow!("unknown command '{}', expected one of: run, simulate, clean", other)),
    };

    if let Err(err) = res {
        println_with_time!("Error: {}", err);
        for cause in err.chain().skip(1) {
            println_with_time!("  caused by: {}", cause);
        }
    }
}

fn load_config() -> Result<SampleConfig> {
    let path = global_config::config_path();
    let (config, found) = global_config::load_config(&path)
        .with_context(|| format!("could not load the configuration from {}", path))?;
    if !found {
        println_with_time!("No config file at {}, using the default settings", path);
    }
    Ok(config)
}

/// Azure CLI client, installed and logged in
fn connect(config: &SampleConfig) -> Result<AzureCli> {
    let cli = AzureCli::new(&config.azure.cli_binary);
    cli.check_install().context("the Azure CLI cannot be used")?;

    let auth = auth::auth_file_from_env().context("could not read the Azure credentials")?;
    if auth.is_none() {
        println_with_time!("{} is not set, using the current Azure CLI session", paths::AUTH_LOCATION_ENV);
    }
    let subscription = cli.authenticate(auth.as_ref())?;
    println_with_time!("Selected subscription: {}", subscription);
    Ok(cli)
}

fn run_azure(assume_yes: bool) -> Result<()> {
    let config = load_config()?;
    let cli = connect(&config)?;

    let pipeline = ManageVmPipeline::new(&cli, &config);
    println_with_time!("Virtual machine {} will be created with admin user {}", pipeline.names().vm, pipeline.names().admin_username);
    let report = if config.workflow.pause_for_confirmation && !assume_yes {
        pipeline.run(&mut ConsoleConfirm)
    } else {
        pipeline.run(&mut AutoConfirm::default())
    };
    summarize(&report);
    Ok(())
}

/// Same workflow against the in-memory control plane, no Azure account needed
fn simulate() -> Result<()> {
    let config = load_config()?;
    let azure = SimulatedAzure::new();
    println_with_time!("Simulating on subscription {}", azure.subscription_id()?);

    let report = ManageVmPipeline::new(&azure, &config).run(&mut AutoConfirm::default());
    summarize(&report);
    println_with_time!("{} calls to the simulated control plane", azure.calls().len());
    Ok(())
}

fn clean_azure() -> Result<()> {
    let config = load_config()?;
    let cli = connect(&config)?;
    println_with_time!("Clearing resource group {}, this may take a while...", config.azure.resource_group);
    pipelines::clean_resource_group(&cli, &config.azure.resource_group);
    Ok(())
}

fn summarize(report: &RunReport) {
    match &report.provisioning {
        Ok(provisioned) => {
            println_with_time!("Workflow completed for {}", provisioned.vm_id);
            println_with_time!("VM creation took {} seconds, public IP was {}", provisioned.creation_time.as_secs(), provisioned.public_ip.as_deref().unwrap_or("not allocated"));
        }
        Err(e) => match e.step() {
            Some(step) => println_with_time!("Workflow stopped at step '{}'", step),
            None => println_with_time!("Workflow stopped waiting for confirmation"),
        },
    }
}
