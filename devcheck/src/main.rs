//! devcheck: back up and audit every device in an inventory.
//!
//! ```bash
//! devcheck [inventory_file [backup_dir]]
//! ```
//!
//! Defaults are `devices.txt` and `backups`. Set `DEVCHECK_CONFIG` to a JSON
//! file to override [`AuditConfig`] fields, and `RUST_LOG` for verbosity.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

use devcheck::platform::PlatformRegistry;
use devcheck::{
    AuditConfig, BackupWriter, Extractor, FleetOrchestrator, RunResult, RunSummary, SshConnector,
    inventory,
};

const USAGE: &str = "Usage: devcheck [inventory_file [backup_dir]]";

/// Environment variable naming the JSON configuration file.
const CONFIG_ENV: &str = "DEVCHECK_CONFIG";

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            info!("loading configuration from {}", path.display());
            AuditConfig::from_json_file(&path)?
        }
        None => AuditConfig::default(),
    };

    let extractor = match &config.template_dir {
        Some(dir) => Extractor::load(dir)?,
        None => Extractor::builtin()?,
    };

    let devices = inventory::load(&args.inventory)?;
    info!(
        "loaded {} devices from {}",
        devices.len(),
        args.inventory.display()
    );

    let writer = BackupWriter::new(&args.backup_dir);
    writer.ensure_root().await?;

    let orchestrator = FleetOrchestrator::new(
        SshConnector::new(PlatformRegistry::with_builtins(), config.clone()),
        extractor,
        writer,
        config,
    );

    let cancel = orchestrator.cancel_handle();
    tokio::spawn(async move {
        if cancel.cancel_on_interrupt(tokio::signal::ctrl_c).await {
            error!("interrupted twice, abandoning in-flight devices");
            std::process::exit(130);
        }
    });

    let results = orchestrator.run(devices).await;

    println!();
    for result in &results {
        println!("{result}");
        if let RunResult::Completed(report) = result {
            for issue in &report.issues {
                println!("    {issue}");
            }
        }
    }
    println!("{}", RunSummary::from_results(&results));

    Ok(())
}

/// Positional command line arguments.
struct Args {
    inventory: PathBuf,
    backup_dir: PathBuf,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = env::args().skip(1).collect();

        if args.iter().any(|arg| arg == "-h" || arg == "--help") {
            Self::print_help();
            std::process::exit(0);
        }
        if args.len() > 2 {
            eprintln!("{USAGE}");
            std::process::exit(1);
        }

        let mut args = args.into_iter();
        Self {
            inventory: args.next().unwrap_or_else(|| "devices.txt".to_string()).into(),
            backup_dir: args.next().unwrap_or_else(|| "backups".to_string()).into(),
        }
    }

    fn print_help() {
        println!(
            r#"devcheck - back up and audit Cisco IOS devices over SSH

{USAGE}

ARGUMENTS:
    inventory_file    Device list with a header row (default: devices.txt)
                      ip;username;password;device_type;secret
    backup_dir        Root directory for configuration backups (default: backups)

ENVIRONMENT:
    DEVCHECK_CONFIG   JSON file overriding NTP candidates, timezone, concurrency,
                      timeouts, host key policy and template directory
    RUST_LOG          Log filter (default: info)
"#
        );
    }
}
