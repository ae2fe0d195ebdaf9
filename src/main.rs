use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ev3_sim_runtime::config::{RobotConfig, SimSettings};

/// Two-wheeled EV3 robot simulator driven over zenoh
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Robot description (JSON)
    #[arg(long)]
    robot: PathBuf,

    /// Simulation settings (JSON); built-in defaults when omitted
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let loaded = RobotConfig::load(&args.robot).and_then(|robot| {
        let settings = match &args.settings {
            Some(path) => SimSettings::load(path)?,
            None => SimSettings::default(),
        };
        Ok((robot, settings))
    });
    let (robot, settings) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(1);
        }
    };
    info!("Loaded robot description from {}", args.robot.display());

    if let Err(e) = ev3_sim_runtime::runtime::run(robot, settings).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}
