//! ledger-boot: network bootstrap entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI flags
//!   3. Load config (skipped for `--collections`)
//!   4. Resolve effective log level (CLI `-v` flags > env > config)
//!   5. Init logger once
//!   6. Run the bootstrap sequence, or just load a collections file
//!   7. Print the JSON result to stdout

use std::path::PathBuf;

use tracing::info;

use ledger_boot::collections::load_collections;
use ledger_boot::error::AppError;
use ledger_boot::{config, logger, sequencer};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let args = match parse_cli_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("error: {msg}");
            eprintln!("try 'ledger-boot --help'");
            std::process::exit(2);
        }
    };
    if args.help {
        print_help();
        return Ok(());
    }

    if let Some(dir) = &args.collections_dir {
        logger::init(args.log_level.unwrap_or("warn"), args.log_level.is_some(), None)?;
        let configs = load_collections(dir)?;
        info!(dir = %dir.display(), count = configs.len(), "collections loaded");
        return print_json(&configs);
    }

    let mut config = config::load(args.config_path.as_deref())?;
    if args.dry_run {
        config.platform.provider = "dummy".into();
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some(), config.log_file.as_deref())?;

    info!(
        provider = %config.platform.provider,
        profile = %config.network.connection_profile.display(),
        channel = %config.network.channel_id,
        chaincodes = config.chaincode.packages.len(),
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    let report = sequencer::setup(&config)?;
    info!(channel = %report.channel_id, chaincodes = report.chaincodes.len(), "bootstrap complete");
    print_json(&report)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AppError::Output(e.to_string()))?;
    println!("{json}");
    Ok(())
}

fn print_help() {
    println!("Usage: ledger-boot [OPTIONS]");
    println!();
    println!("Creates and joins a channel, then installs and instantiates the configured chaincodes.");
    println!();
    println!("Options:");
    println!("  -h, --help                 Print help");
    println!("  -f, --config <PATH>        Path to configuration file (default: {})", config::DEFAULT_CONFIG_PATH);
    println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
    println!("      --dry-run              Run against the in-memory platform");
    println!("      --collections <DIR>    Load DIR/collections_config.json, print it as JSON and exit");
}

#[derive(Debug, Default, PartialEq)]
struct CliArgs {
    help: bool,
    log_level: Option<&'static str>,
    config_path: Option<String>,
    collections_dir: Option<PathBuf>,
    dry_run: bool,
}

fn parse_cli_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut verbosity = 0u8;
    let mut out = CliArgs::default();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => out.help = true,
            "-f" | "--config" => {
                let path = iter.next().ok_or("-f/--config requires a path argument")?;
                out.config_path = Some(path);
            }
            "--collections" => {
                let dir = iter.next().ok_or("--collections requires a directory argument")?;
                out.collections_dir = Some(PathBuf::from(dir));
            }
            "--dry-run" => out.dry_run = true,
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            other => return Err(format!("unexpected argument '{other}'")),
        }
    }

    out.log_level = logger::verbosity_level(verbosity);
    Ok(out)
}
