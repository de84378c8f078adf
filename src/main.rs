use fgbridge::{init_logging, run, BUILD_DATE, VERSION};
use fgbridge_settings::BridgeConfig;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    init_logging()?;
    tracing::info!("fgbridge {} (built {})", VERSION, BUILD_DATE);

    // Optional first argument: configuration file
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match BridgeConfig::load_or_default(config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            return Ok(ExitCode::FAILURE);
        }
    };

    match run(&config) {
        Ok(()) => {
            tracing::info!("Shut down cleanly");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_initialization() => {
            tracing::error!("Startup failed: {}", e);
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!("Bridge stopped: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}
