//! UDP repeater binary entry point.
//!
//! Usage: `udp-repeater <rules.json> [repeater.log]`
//!
//! Loads the rules file, applies it, and serves until the process is
//! killed. When a log path is given, output goes there instead of stderr;
//! process supervision and backgrounding are left to the service manager.

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use udp_repeater::config;
use udp_repeater::repeater::Repeater;

fn init_logging(log_path: Option<&str>) -> std::io::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("usage: {} <rules.json> [repeater.log]", args[0]);
        return ExitCode::from(2);
    }

    if let Err(e) = init_logging(args.get(2).map(String::as_str)) {
        eprintln!("could not open log file: {e}");
        return ExitCode::FAILURE;
    }

    let rules = match config::load(&args[1]) {
        Ok(rules) => rules,
        Err(e) => {
            error!(error = %e, "failed to load rules file");
            return ExitCode::FAILURE;
        }
    };

    let mut repeater = Repeater::new();
    if let Err(e) = config::apply(&rules, &mut repeater) {
        error!(error = %e, "invalid configuration");
        return ExitCode::FAILURE;
    }

    debug!("maps:\n{}", repeater.dump_maps());
    debug!("transmitters:\n{}", repeater.dump_transmitters());
    debug!("targets:\n{}", repeater.dump_targets());

    match repeater.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "repeater stopped");
            ExitCode::FAILURE
        }
    }
}
