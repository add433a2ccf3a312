//! Scroll-driven read view over the cache.

pub mod pager;

pub use pager::Pager;

use bon::Builder;

use crate::error::SyncError;

/// Paging behaviour for one [`Pager`].
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct PagingConfig {
    /// Rows read from the cache per chunk.
    #[builder(default = 20)]
    pub page_size: u32,
    /// Start loading the next page when a read comes this close to the edge.
    #[builder(default = 5)]
    pub prefetch_distance: u32,
    /// Refresh the scope on first read.
    #[builder(default = true)]
    pub initial_refresh: bool,
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Status of one load type.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadState {
    pub is_loading: bool,
    pub end_of_pagination_reached: bool,
    pub error: Option<SyncError>,
}

impl LoadState {
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::default()
        }
    }

    pub fn idle(end_of_pagination_reached: bool) -> Self {
        Self {
            is_loading: false,
            end_of_pagination_reached,
            error: None,
        }
    }

    pub fn failed(error: SyncError) -> Self {
        Self {
            is_loading: false,
            end_of_pagination_reached: false,
            error: Some(error),
        }
    }
}

/// Load states per load type, as a screen renders them.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedLoadStates {
    pub refresh: LoadState,
    /// Always idle with the end reached: pages only grow forward.
    pub prepend: LoadState,
    pub append: LoadState,
}

impl Default for CombinedLoadStates {
    fn default() -> Self {
        Self {
            refresh: LoadState::default(),
            prepend: LoadState::idle(true),
            append: LoadState::default(),
        }
    }
}

impl CombinedLoadStates {
    pub fn is_loading(&self) -> bool {
        self.refresh.is_loading || self.append.is_loading
    }

    /// First error to show, refresh before append.
    pub fn error(&self) -> Option<&SyncError> {
        self.refresh.error.as_ref().or(self.append.error.as_ref())
    }
}
