//! Command-line entry point for the archive metadata publisher.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;

use aptpub::catalog::MemoryCatalog;
use aptpub::config::PublisherConfig;
use aptpub::dep11::{AcceptingValidator, HookValidator, SupplementValidator};
use aptpub::publish::ArchivePublisher;
use aptpub::signing::GpgSigner;

/// Publish repository metadata that clients can use.
#[derive(Debug, Parser)]
#[command(name = "aptpub", version, about)]
struct Args {
    /// Path to the publisher configuration file.
    #[arg(short, long, value_name = "FILE", env = "APTPUB_CONFIG", default_value = "aptpub.json")]
    config: PathBuf,

    /// Path to the catalog snapshot to publish from.
    #[arg(long, value_name = "FILE", env = "APTPUB_CATALOG")]
    catalog: PathBuf,

    /// Name of the repository to act on; all repositories when unset.
    #[arg(long, value_name = "NAME")]
    repo: Option<String>,

    /// Name of the suite to act on; all suites when unset.
    #[arg(short, long, value_name = "NAME")]
    suite: Option<String>,

    /// Force publication even if it is not yet needed.
    #[arg(long)]
    force: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = match PublisherConfig::from_file(&args.config) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let catalog = match MemoryCatalog::from_json_file(&args.catalog) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let signer = Arc::new(GpgSigner::new(config.secret_gpg_home_dir.clone()));
    let validator: Arc<dyn SupplementValidator> = match &config.dep11_validator {
        Some(program) => Arc::new(HookValidator::new(program.clone())),
        None => Arc::new(AcceptingValidator),
    };

    let publisher = ArchivePublisher::new(config, catalog, signer, validator);
    match publisher
        .publish(args.repo.as_deref(), args.suite.as_deref(), args.force)
        .await
    {
        Ok(failures) if failures.is_empty() => ExitCode::SUCCESS,
        Ok(failures) => {
            for (repo_name, e) in &failures {
                eprintln!("Error while publishing repository {}: {}", repo_name, e);
            }
            ExitCode::from(5)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
