//! Convenience re-exports for common use.

pub use crate::auth::{Credential, SessionEvent, SessionState};
pub use crate::config::ClientConfig;
pub use crate::core::DataCore;
pub use crate::error::{Result, SyncError};
pub use crate::paging::{CombinedLoadStates, LoadState, Pager, PagingConfig};
pub use crate::sync::{LoadType, MediatorResult};
pub use crate::types::{HistoryQuery, PageFilters, Record};
pub use crate::util::call::{CallState, RequestState};
