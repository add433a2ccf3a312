//! ecg-sync: offline-first data core for the ECG monitoring app.
//!
//! Keeps a durable, paged local copy of a user's reading history coherent
//! with the remote service, and renews the short-lived bearer token with a
//! single refresh call no matter how many requests hit a 401 at once.
//!
//! # Quick Start
//!
//! ```no_run
//! use ecg_sync::prelude::*;
//! use futures::StreamExt;
//!
//! # async fn example() -> ecg_sync::error::Result<()> {
//! let core = DataCore::open(ClientConfig::from_env()?)?;
//! core.auth().login("ana@example.com", "secret").await?;
//!
//! let pager = core.my_history()?;
//! let mut rows = std::pin::pin!(pager.stream());
//! while let Some(record) = rows.next().await {
//!     let record = record?;
//!     println!("{} {}", record.timestamp, record.classification);
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod http;
pub mod paging;
pub mod prelude;
pub mod remote;
pub mod sync;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;

pub use crate::config::ClientConfig;
pub use crate::core::DataCore;
pub use crate::error::{Result, SyncError};
pub use crate::types::{HistoryQuery, Record};
