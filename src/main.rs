//! Salary Predictor - Main Entry Point

use clap::Parser;
use salary_predictor::cli::{
    cmd_evaluate, cmd_info, cmd_predict, cmd_process, cmd_serve, cmd_train, load_config, Cli,
    Commands,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.env)?;

    // Initialize logging
    let default_filter = format!("salary_predictor={}", config.api.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Process => cmd_process(config)?,
        Commands::Train => cmd_train(config)?,
        Commands::Evaluate => cmd_evaluate(config)?,
        Commands::Predict { input, model } => cmd_predict(config, &input, model.as_deref())?,
        Commands::Info { data } => cmd_info(config, data.as_deref())?,
        Commands::Serve { host, port } => cmd_serve(config, host, port).await?,
    }

    Ok(())
}
