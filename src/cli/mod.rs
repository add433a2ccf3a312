//! CLI for the data core.

pub mod commands;

use clap::{Args, Parser, Subcommand};

/// ecg-sync CLI
#[derive(Parser, Debug)]
#[command(name = "ecg-sync", version, about = "Offline-first ECG history client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login(LoginArgs),
    /// Sign out and clear the local cache
    Logout,
    /// Show session state and cached row counts
    Status,
    /// Print reading history, loading pages as needed
    History(HistoryArgs),
    /// Claim a paired device
    Claim(ClaimArgs),
    /// Release a claimed device
    Unclaim(UnclaimArgs),
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    pub email: String,
    /// Password; read from ECG_SYNC_PASSWORD when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Subject to list; defaults to the signed-in user
    #[arg(long)]
    pub subject: Option<String>,
    /// Only readings from this day (YYYY-MM-DD)
    #[arg(long)]
    pub day: Option<String>,
    /// Only readings with this classification
    #[arg(long)]
    pub class: Option<String>,
    /// Stop after this many rows
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,
    /// Print only what is cached, without touching the network
    #[arg(long)]
    pub offline: bool,
    /// Force a refresh before listing
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Args, Debug)]
pub struct ClaimArgs {
    pub mac_address: String,
    pub device_id: String,
}

#[derive(Args, Debug)]
pub struct UnclaimArgs {
    pub device_id: String,
}
