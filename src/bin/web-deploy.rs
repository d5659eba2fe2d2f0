use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use web_deploy::cli::{
    executor_for, print_release_report, print_slot_status, run_release, run_status, Commands,
    Target, WebDeployCli,
};
use web_deploy::DeployError;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = WebDeployCli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level()).init();

    info!("Starting web-deploy v{}", env!("CARGO_PKG_VERSION"));

    let target = Target::from(&cli);
    let executor = executor_for(&target);
    if target == Target::DryRun {
        info!("Dry run: commands are printed, nothing is executed");
    }

    match &cli.command {
        Commands::Release { config, tag } => {
            match run_release(config, tag.as_deref(), executor).await {
                Ok(report) => print_release_report(&report),
                Err(DeployError::StateInconsistency { live_slot, source }) => {
                    error!(
                        "{} is live but services were not restarted: {}",
                        live_slot.display(),
                        source
                    );
                    anyhow::bail!("manual intervention required on {}", live_slot.display());
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Release from {} failed", config.display()))
                }
            }
        }
        Commands::Status { config } => {
            let status = run_status(config, executor)
                .await
                .with_context(|| format!("Failed to read slot status for {}", config.display()))?;
            print_slot_status(&status);
        }
    }

    Ok(())
}
