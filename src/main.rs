use acervo_etl::app::{self, Mode};
use acervo_etl::utils::{logger, shutdown};
use acervo_etl::CliArgs;
use clap::Parser;

#[tokio::main]
async fn main() {
    // .env is optional; real environment variables take precedence
    dotenvy::dotenv().ok();
    let args = CliArgs::parse();

    logger::init(args.verbose, args.json_logs);

    tracing::info!("Starting acervo-etl (dashboard + worker)");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    let config = match app::load_config(&args, Mode::Combined) {
        Ok(config) => config,
        Err(e) => app::exit_with(e),
    };

    if args.monitor {
        tracing::info!("🔍 System monitoring enabled");
    }

    let shutdown = shutdown::spawn_shutdown_listener();
    if let Err(e) = app::run_combined(&args, config, shutdown).await {
        app::exit_with(e);
    }

    tracing::info!("✅ acervo-etl stopped");
}
