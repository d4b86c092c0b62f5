use acervo_etl::app::{self, Mode};
use acervo_etl::utils::{logger, shutdown};
use acervo_etl::CliArgs;
use clap::Parser;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    logger::init(args.verbose, args.json_logs);

    tracing::info!("Starting acervo-worker");

    let config = match app::load_config(&args, Mode::Worker) {
        Ok(config) => config,
        Err(e) => app::exit_with(e),
    };

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let shutdown = shutdown::spawn_shutdown_listener();
    match app::run_worker(&args, config, shutdown).await {
        Ok(()) => tracing::info!("✅ Worker stopped"),
        Err(e) => app::exit_with(e),
    }
}
