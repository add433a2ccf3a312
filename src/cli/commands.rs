//! Handlers for each CLI command. Output goes to stdout; errors bubble up.

use futures::StreamExt;

use super::{ClaimArgs, HistoryArgs, LoginArgs, UnclaimArgs};
use crate::core::DataCore;
use crate::error::{Result, SyncError};
use crate::sync::MediatorResult;
use crate::types::HistoryQuery;

pub const ENV_PASSWORD: &str = "ECG_SYNC_PASSWORD";

pub async fn login(core: &DataCore, args: LoginArgs) -> Result<()> {
    let password = match args.password {
        Some(password) => password,
        None => std::env::var(ENV_PASSWORD).map_err(|_| {
            SyncError::Configuration(format!("pass --password or set {ENV_PASSWORD}"))
        })?,
    };
    let credential = core.auth().login(&args.email, &password).await?;
    println!(
        "Signed in as {} (subject {})",
        if credential.display_name.is_empty() {
            &args.email
        } else {
            &credential.display_name
        },
        credential.subject_id
    );
    Ok(())
}

pub async fn logout(core: &DataCore) -> Result<()> {
    core.auth().logout().await?;
    println!("Signed out; local cache cleared");
    Ok(())
}

pub fn status(core: &DataCore) -> Result<()> {
    println!("Session: {}", core.session().state());
    match core.session().credential()? {
        Some(credential) => {
            println!("Subject: {}", credential.subject_id);
            if !credential.display_name.is_empty() {
                println!("Name:    {}", credential.display_name);
            }
            let query = HistoryQuery::new(credential.subject_id);
            let cached = core.cache().record_count(&query.scope_key())?;
            let more = core
                .cache()
                .cursor(&query.scope_key())?
                .map(|cursor| if cursor.end_reached() { "complete" } else { "partial" })
                .unwrap_or("not loaded");
            println!("History: {cached} cached rows ({more})");
        }
        None => println!("Not signed in"),
    }
    println!("Total cached rows: {}", core.cache().total_records()?);
    Ok(())
}

pub async fn history(core: &DataCore, args: HistoryArgs) -> Result<()> {
    let subject = match args.subject {
        Some(subject) => subject,
        None => core
            .session()
            .subject_id()?
            .ok_or_else(|| SyncError::InvalidState("not signed in".into()))?,
    };
    let mut query = HistoryQuery::new(subject);
    query.filters.day = args.day;
    query.filters.classification = args.class;
    let pager = core.history_pager(query);

    if args.offline {
        for record in pager.snapshot()?.into_iter().take(args.limit) {
            print_record(&record);
        }
        return Ok(());
    }

    if args.refresh {
        if let MediatorResult::Error(err) = pager.refresh().await {
            eprintln!("Refresh failed, showing cached rows: {err}");
        }
    }

    let mut rows = std::pin::pin!(pager.stream().take(args.limit));
    while let Some(record) = rows.next().await {
        print_record(&record?);
    }

    if let Some(err) = pager.current_load_states().error() {
        eprintln!("Warning: {err}");
    }
    Ok(())
}

pub async fn claim(core: &DataCore, args: ClaimArgs) -> Result<()> {
    let message = core
        .account()
        .claim_device(&args.mac_address, &args.device_id)
        .await?;
    println!("{message}");
    Ok(())
}

pub async fn unclaim(core: &DataCore, args: UnclaimArgs) -> Result<()> {
    let message = core.account().unclaim_device(&args.device_id).await?;
    println!("{message}");
    Ok(())
}

fn print_record(record: &crate::types::Record) {
    match record.measurement {
        Some(bpm) => println!(
            "{:>8}  {}  {:<14} {:>5.1} bpm",
            record.id, record.timestamp, record.classification, bpm
        ),
        None => println!(
            "{:>8}  {}  {}",
            record.id, record.timestamp, record.classification
        ),
    }
}
