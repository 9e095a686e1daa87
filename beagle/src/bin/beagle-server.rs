use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use beagle::auth::{InMemoryUserStore, SecurityConfiguration};
use beagle::core::logging::setup_logging;
use beagle::core::{settings_loader, BeagleResult};
use beagle::server::BeagleApp;

/// Beagle server - user API behind HTTP Basic authentication
#[derive(Parser, Debug)]
#[command(name = "beagle-server", version, long_about = None)]
struct Args {
    /// Settings file (TOML, or JSON when it ends in .json). BEAGLE_* env vars override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the settings file
    #[arg(short, long)]
    bind: Option<String>,

    /// Validate the configuration and exit without serving
    #[arg(long, default_value_t = false)]
    check: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "beagle-server failed");
            eprintln!("beagle-server: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> BeagleResult<()> {
    let mut settings = match &args.config {
        Some(path) => settings_loader::from_path_with_env(path)?,
        None => settings_loader::from_env(),
    };
    if let Some(bind) = args.bind {
        settings.bind_address = bind;
    }

    setup_logging(&settings);

    let store = InMemoryUserStore::new();
    let security =
        SecurityConfiguration::new(&settings.security, Arc::new(store.clone())).await?;
    tracing::info!(
        rules = security.policy().table().len(),
        csrf_enabled = security.csrf_enabled(),
        debug = settings.debug,
        "security configuration loaded"
    );

    if args.check {
        println!("configuration OK");
        return Ok(());
    }

    let security = security.install()?;
    BeagleApp::new(settings, security, store).run().await
}
