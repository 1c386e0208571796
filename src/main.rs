mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use statepruner::config::Config;
use statepruner::observability::{init_tracing, RunMetrics};
use statepruner::pruner::{tracks, PruneError, RunController, StatePruneSummary};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();
    let log_filter = init_tracing();

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path.clone())?,
        None => Config::load()?,
    };
    cli.command.apply(&mut config);
    config.validate()?;
    log_filter.set_level(&config.log.level);

    let home = cli.command.home().clone();
    match cli.command {
        Commands::CheckStoreVersions(_) => match tracks::check_store_versions(&config, &home)? {
            Some(report) => print!("{}", report),
            None => println!("No store has any versions"),
        },
        Commands::PruneStore(args) => {
            let metrics = RunMetrics::new();
            let summary = tracks::prune_store(&config, &home, &args.name, &metrics)?;
            print_application(&summary);
            if !summary.succeeded() {
                return Err(PruneError::PartialFailure {
                    failed: summary.hard_failures(),
                }
                .into());
            }
        }
        Commands::Prune(_) => {
            config.validate_tracks()?;
            let summary = RunController::new(config, home).run().await?;

            if let Some(application) = &summary.application {
                print_application(application);
            }
            if let Some(history) = &summary.history {
                println!("{}", history);
            }
            if !summary.succeeded() {
                return Err(PruneError::PartialFailure {
                    failed: summary.hard_failures(),
                }
                .into());
            }
        }
    }

    Ok(())
}

fn print_application(summary: &StatePruneSummary) {
    println!("{}", summary);
    for outcome in summary.failed_stores() {
        if let Some(failure) = &outcome.failure {
            println!("  {}: {}", outcome.name, failure.reason);
        }
    }
}
