use acervo_etl::app::{self, Mode};
use acervo_etl::utils::{logger, shutdown};
use acervo_etl::CliArgs;
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    logger::init(args.verbose, args.json_logs);

    tracing::info!("Starting acervo-api");

    let config = match app::load_config(&args, Mode::Api) {
        Ok(config) => config,
        Err(e) => app::exit_with(e),
    };

    let shutdown = shutdown::spawn_shutdown_listener();
    match app::run_api(&args, config, shutdown).await {
        Ok(()) => tracing::info!("✅ Dashboard stopped"),
        Err(e) => app::exit_with(e),
    }
}
