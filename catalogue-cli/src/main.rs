use anyhow::Result;
use catalogue_cli::cli::{self, Cli, Commands};
use catalogue_cli::logger;
use catalogue_core::CancellationToken;
use clap::Parser;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Run(args) => {
            let settings = args.settings()?;
            logger::init_logging(settings.json_logs());

            let cancel = CancellationToken::new();
            let signal_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupt received: no new tables will be started");
                    signal_token.cancel();
                }
            });

            cli::run_command(args, settings, cancel).await?
        }
        Commands::Validate { config, data_dir } => {
            logger::init_logging(false);
            cli::validate_command(config, data_dir)?
        }
    };

    std::process::exit(code);
}
