use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tenerate::client::RequestClient;
use tenerate::command;
use tenerate::config::{TenerateConfig, ValidationPolicy};
use tenerate::document::{DocumentEditor, FileBuffer};
use tenerate::notify::TracingNotifier;
use tenerate::workflow::{GenerationWorkflow, Outcome, WorkflowSettings};

#[derive(Parser)]
#[command(name = "tenerate", about = "Generate unit tests for the function under the cursor.")]
struct Cli {
    /// Generation service endpoint (overrides config and TENERATE_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Report why nothing happened when the line is not a function definition
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate tests for the function defined on LINE and append them to FILE
    Generate {
        file: PathBuf,
        /// 1-based line the cursor is on
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        line: u32,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tenerate=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = TenerateConfig::load().context("loading configuration")?;
    if let Some(endpoint) = cli.endpoint {
        config.endpoint = endpoint;
    }
    if cli.strict {
        config.validation_policy = ValidationPolicy::Notify;
    }
    config.validate()?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_yaml()?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Generate { file, line } => generate(&config, file, line).await,
    }
}

async fn generate(config: &TenerateConfig, file: PathBuf, line: u32) -> Result<ExitCode> {
    let buffer = FileBuffer::open(&file).with_context(|| format!("opening {}", file.display()))?;
    let editor = DocumentEditor::new(Arc::new(buffer));

    let client = RequestClient::new(config.endpoint.clone(), config.request_timeout())?;
    info!(endpoint = client.endpoint(), "using generation service");

    let workflow = GenerationWorkflow::new(
        Arc::new(client),
        Arc::new(TracingNotifier),
        WorkflowSettings::from(config),
    );

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_ctrl_c.cancel();
        }
    });

    let outcome = command::generate_tests(&workflow, &editor, line as usize - 1, &cancel).await;
    info!(?outcome, "done");

    Ok(match outcome {
        Outcome::Failed(_) | Outcome::EditFailed(_) | Outcome::Cancelled => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}
