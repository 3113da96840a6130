use log::error;
use shift_scheduler::config::AppConfig;
use shift_scheduler::server;
use shift_scheduler::store::Store;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            env_logger::init();
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_filter))
        .init();

    let store = match Store::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            error!("Cannot open schedule store {}: {e}", config.database_path);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = server::run_server(&config, store).await {
        error!("Server stopped: {e}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
