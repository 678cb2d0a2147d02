use std::process::ExitCode;

use healthgate::config::Config;
use healthgate::{app, logging, system};
use tracing::{error, info};

fn main() -> ExitCode {
    system::mark_process_start();

    // Logging is not up until the config is loaded
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("healthgate: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("healthgate: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Starting healthgate {}", healthgate::VERSION);
    config.log_summary();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(app::run(config))
}
