// src/main.rs
use std::process::ExitCode;

use quickpoll::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok(); // Load environment variables from .env file

    quickpoll::init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match quickpoll::start_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
