//! Satisfaction pipeline - main entry point

use clap::Parser;
use satisfaction_pipeline::cli::{cmd_run_deployment, cmd_train, Cli, Commands, RunDeploymentArgs};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "satisfaction_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunDeployment {
            config,
            min_accuracy,
            data,
            settings,
            workers,
            timeout,
            records,
            sample,
        } => {
            cmd_run_deployment(&RunDeploymentArgs {
                mode: config,
                min_accuracy,
                data,
                settings,
                workers,
                timeout,
                records,
                sample,
            })?;
        }
        Commands::Train { data, settings } => {
            cmd_train(data.as_deref(), settings.as_deref())?;
        }
    }

    Ok(())
}
