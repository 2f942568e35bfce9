// simulation_main.rs
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tunnel_sim::config::SimulationConfig;
use tunnel_sim::simulation_engine::simulation::run_simulation;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => match SimulationConfig::load(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error loading configuration: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SimulationConfig::default(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl-C received, letting the cars park");
            let _ = shutdown_tx.send(true);
        }
    });

    match run_simulation(config, shutdown_rx).await {
        Ok(summary) => {
            log::info!(
                "Simulation stopped: {} admissions, {} direction flips",
                summary.admissions,
                summary.flips
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
