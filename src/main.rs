use clap::Parser;
use env_logger::Env;
use persister::Persister;
use std::process::ExitCode;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // Parse command-line arguments
    let args = Args::parse();

    ::log::info!("Initializing persister");

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            ::log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let persister = Persister::new(config);

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            ::log::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        ::log::info!("Interrupted, finishing in-flight messages");
    };

    match persister.run_until(shutdown).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            ::log::error!("Persister stopped: {}", e);
            ExitCode::FAILURE
        }
    }
}
