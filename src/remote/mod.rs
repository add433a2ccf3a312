//! Remote service access: the paged history source and account endpoints.

pub mod account;
pub mod history;

pub use account::AccountApi;
pub use history::HttpPageSource;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::Result;
use crate::types::{HistoryQuery, Record};

/// One page of history as returned by the service. Pages are 1-indexed.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
    pub records: Vec<Record>,
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
}

impl PageResult {
    /// No page follows this one: it is the last, or it came back empty.
    pub fn end_of_pagination(&self) -> bool {
        self.current_page >= self.total_pages || self.records.is_empty()
    }
}

/// Source of remote history pages.
///
/// Failures are [`crate::error::SyncError::Network`]/`Timeout` when the
/// service was unreachable and `Service` when it answered with an error.
#[async_trait]
pub trait RemotePageSource: Send + Sync {
    async fn fetch_page(&self, query: &HistoryQuery, page: u32) -> Result<PageResult>;
}

/// Plain acknowledgement body used by mutating endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GeneralResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl GeneralResponse {
    pub(crate) fn into_message(self) -> String {
        self.message
            .or(self.status)
            .or(self.error)
            .unwrap_or_else(|| "ok".to_string())
    }
}
