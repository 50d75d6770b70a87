mod config;
mod logging;
mod statsd;

use api::filters::access_log::TracingAccessLog;
use clap::{Args, Parser, Subcommand};
use config::{Config, ConfigError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "brigade", about = "Read API for Brigade projects, builds and jobs")]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Run the API server
    Api(ApiArgs),
    /// Print the API description document and exit
    Apidocs,
}

#[derive(Args)]
struct ApiArgs {
    #[arg(long)]
    config_file: PathBuf,
    /// Overrides `api.listener.port`
    #[arg(long, env = "BRIGADE_API_PORT")]
    api_port: Option<u16>,
    /// Overrides `api.namespace`
    #[arg(long, env = "BRIGADE_NAMESPACE")]
    namespace: Option<String>,
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not install log subscriber: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("could not set up metrics: {0}")]
    Metrics(String),
    #[error("could not start runtime: {0}")]
    Runtime(std::io::Error),
    #[error(transparent)]
    Server(#[from] api::ApiServerError),
    #[error("could not render API description: {0}")]
    Render(#[from] serde_json::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        CliCommand::Api(args) => run_api(args),
        CliCommand::Apidocs => print_api_docs(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("brigade: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_api(args: ApiArgs) -> Result<(), CliError> {
    let mut config = Config::from_file(&args.config_file)?;
    config.apply_overrides(args.api_port, args.namespace);
    config.validate()?;

    let _logging = logging::init(config.common.logging.as_ref())?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    rt.block_on(async move {
        if let Some(metrics_config) = &config.common.metrics {
            statsd::init(metrics_config).map_err(CliError::Metrics)?;
        }

        let reader = storage::get_reader(&config.api.store, &config.api.namespace);
        tracing::info!(namespace = %config.api.namespace, "Starting API server");
        api::serve(config.api, reader, Arc::new(TracingAccessLog)).await?;
        Ok(())
    })
}

fn print_api_docs() -> Result<(), CliError> {
    let docs = serde_json::to_string_pretty(&api::routes::api_docs())?;
    println!("{docs}");
    Ok(())
}
