use aq_etl::{EtlConfig, EtlError, Pipeline};
use env_logger::{Env, Target};
use log::{error, info};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Stdout)
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), EtlError> {
    let config = EtlConfig::from_env()?;
    info!(
        "Starting air-quality ETL for {}, {} (last {} days)",
        config.region.city, config.region.country, config.history_days
    );
    let pipeline = Pipeline::new(config).await?;
    let summary = pipeline.run().await;
    info!("Run finished: {}", summary);
    Ok(())
}
