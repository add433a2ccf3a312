//! ecg-sync CLI binary entry point.

use clap::Parser;
use ecg_sync::cli::{commands, Cli, Commands};
use ecg_sync::{ClientConfig, DataCore};
use tracing_subscriber::EnvFilter;

const ENV_LOG: &str = "ECG_SYNC_LOG";

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> ecg_sync::Result<()> {
    let core = DataCore::open(ClientConfig::from_env()?)?;
    let mut expired = core.session_events();
    tokio::spawn(async move {
        if expired.recv().await.is_ok() {
            eprintln!("Session expired. Run `ecg-sync login` again.");
        }
    });

    match cli.command {
        Commands::Login(args) => commands::login(&core, args).await,
        Commands::Logout => commands::logout(&core).await,
        Commands::Status => commands::status(&core),
        Commands::History(args) => commands::history(&core, args).await,
        Commands::Claim(args) => commands::claim(&core, args).await,
        Commands::Unclaim(args) => commands::unclaim(&core, args).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(ENV_LOG)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
