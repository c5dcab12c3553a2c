//! model-trainer entry point

use clap::Parser;
use model_trainer::cli::{cmd_info, cmd_predict, cmd_train, resolve_config, Cli, Commands};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "model_trainer=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train { train, test, artifact, min_score, cv_folds, refit, config } => {
            let config = resolve_config(config.as_deref(), artifact, min_score, cv_folds, refit)?;
            cmd_train(&train, &test, config)?;
        }
        Commands::Predict { model, data, output, has_target } => {
            cmd_predict(&model, &data, output.as_deref(), has_target)?;
        }
        Commands::Info { model } => {
            cmd_info(&model)?;
        }
    }

    Ok(())
}
