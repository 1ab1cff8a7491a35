use anyhow::{bail, Context, Result};
use clap::Parser;
use salvage_core::{
    logging, write_report, Config, DeviceDescriptor, DeviceReport, DiagnosticsEngine,
    OperationRequest, OperationResult, Orchestrator,
};
use salvage_hal::{LinuxHal, SystemHal};
use std::sync::Arc;

mod cli;

use cli::{Cli, Command};

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading config {}", path.display()))
        }
        None => match Config::default_path() {
            Some(path) => Config::load(&path)
                .with_context(|| format!("loading config {}", path.display())),
            None => Ok(Config::default()),
        },
    }
}

fn print_devices(devices: &[DeviceDescriptor]) {
    println!(
        "{:<16} {:>9}  {:<9} {:<8} {}",
        "DEVICE", "SIZE", "TYPE", "FSTYPE", "MOUNTPOINT"
    );
    for dev in devices {
        println!(
            "{:<16} {:>9}  {:<9} {:<8} {}",
            dev.path,
            dev.size,
            match dev.kind {
                salvage_core::DeviceKind::Disk => "disk",
                salvage_core::DeviceKind::Partition => "partition",
            },
            dev.fstype.as_deref().unwrap_or("-"),
            dev.mount_point.as_deref().unwrap_or("")
        );
    }
}

fn print_report(report: &DeviceReport) {
    println!("Device:          {}", report.device_path);
    if let Some(parent) = &report.parent_disk {
        println!("Parent disk:     {}", parent);
    }
    if let Some(info) = &report.basic_info {
        println!("Size:            {}", info.size);
        if let Some(model) = &info.model {
            println!("Model:           {}", model);
        }
        if let Some(serial) = &info.serial {
            println!("Serial:          {}", serial);
        }
    }

    let smart = &report.smart;
    println!();
    println!("SMART supported: {}", if smart.smart_supported { "yes" } else { "no" });
    println!("Overall health:  {}", smart.overall_health);
    println!("Temperature:     {}", smart.temperature);
    println!("Power-on time:   {}", smart.power_on_hours);
    println!("Error log:       {}", smart.error_log_summary);
    for (attr, value) in &smart.attributes {
        println!("  {:<24} {}", attr.name(), value);
    }
    if let Some(counters) = &smart.sata_phy_errors {
        for (name, value) in counters {
            println!("  SATA PHY {:<15} {}", name, value);
        }
    }
    for note in &smart.notes {
        println!("  note: {}", note);
    }

    let health = &report.health;
    println!();
    println!(
        "Health:          {} ({}) score {}",
        health.status.label(),
        health.status.label_ja(),
        health.score
    );
    for issue in &health.issues {
        println!("  - {}", issue);
    }

    if let Some(fs) = &report.filesystem {
        println!();
        println!(
            "Filesystem:      {} ({})",
            fs.fstype.as_deref().unwrap_or("unformatted"),
            fs.outcome.label()
        );
        if !fs.details.trim().is_empty() {
            println!("{}", fs.details.trim_end());
        }
    }
}

fn finish(result: OperationResult) -> Result<()> {
    if !result.success {
        bail!(result.message);
    }
    println!("{}", result.message);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    logging::init(cli.log_dir.as_deref(), level);

    let config = load_config(&cli)?;
    let hal: Arc<dyn SystemHal> = Arc::new(LinuxHal::new());

    match cli.command {
        Command::List {
            mounted,
            unmounted,
            json,
        } => {
            let orch = Orchestrator::new(hal, config);
            let inventory = orch.inventory();
            let devices = if mounted {
                inventory.list_mounted()?
            } else if unmounted {
                inventory.list_unmounted()?
            } else {
                inventory.list_all()?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else {
                print_devices(&devices);
            }
        }
        Command::Mount {
            device,
            mount_point,
        } => {
            let orch = Orchestrator::new(hal, config);
            finish(orch.execute(OperationRequest::Mount {
                device,
                mount_point,
            }))?;
        }
        Command::Format {
            device,
            fstype,
            yes_i_know,
        } => {
            if !yes_i_know {
                bail!("Missing --yes-i-know flag. Formatting {} is destructive!", device);
            }
            let fstype = fstype.unwrap_or_else(|| config.default_format.clone());
            let orch = Orchestrator::new(hal, config);
            finish(orch.execute(OperationRequest::Format { device, fstype }))?;
        }
        Command::Chmod { path } => {
            let orch = Orchestrator::new(hal, config);
            finish(orch.execute(OperationRequest::SetPermissions { path }))?;
        }
        Command::Open { path } => {
            let orch = Orchestrator::new(hal, config);
            finish(orch.execute(OperationRequest::OpenInManager { path }))?;
        }
        Command::Analyze {
            device,
            json,
            save_dir,
        } => {
            let engine = DiagnosticsEngine::new(hal, config);
            let report = engine
                .analyze(&device)
                .with_context(|| format!("analyzing {}", device))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            if let Some(dir) = save_dir {
                let path = write_report(&report, &dir)?;
                println!("Report saved to {}", path.display());
            }
        }
    }

    Ok(())
}
