use anyhow::{Context, Result};
use build_medic::config::{Cli, MedicConfig};
use build_medic::report::finish_session;
use clap::Parser;
use medic_engine::{ChatCompletionsOracle, CommandBuildRunner, RepairLoop};
use std::process::ExitCode;
use tracing::{error, info};

/// Exit code for configuration errors (terminal session outcomes use 1)
const EXIT_CONFIG_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match MedicConfig::load(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e:#}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    match run(&cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: MedicConfig) -> Result<ExitCode> {
    info!(
        root = %config.repair.project_root.display(),
        max_attempts = config.repair.max_attempts,
        oracle = %config.oracle.endpoint,
        model = %config.oracle.model,
        "build-medic starting"
    );

    let runner = CommandBuildRunner::from_config(&config.repair)
        .context("Failed to prepare build commands")?;
    let oracle = ChatCompletionsOracle::new(config.oracle.clone())
        .context("Failed to create oracle client")?;
    let report_path = config.report_path(cli);
    let repair = RepairLoop::new(config.repair, Box::new(runner), Box::new(oracle));

    if cli.diagnose_only {
        let report = repair.diagnose_only().await?;
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialize diagnosis")?
        );
        return Ok(if report.build.succeeded {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let session = repair.run().await;
    info!("{}", session.summary());

    Ok(if finish_session(&session, &report_path) == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
