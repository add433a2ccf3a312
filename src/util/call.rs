//! States of a one-shot background call and the request state a screen keeps.

use std::future::Future;

use futures::Stream;

use crate::error::{Result, SyncError};

/// Progress of a single background call. Exactly three cases.
#[derive(Debug, Clone, PartialEq)]
pub enum CallState<T> {
    Loading,
    Success(T),
    Error(SyncError),
}

impl<T> CallState<T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

impl<T> From<Result<T>> for CallState<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(err) => Self::Error(err),
        }
    }
}

/// Run `future`, yielding `Loading` first and then exactly one terminal state.
pub fn call_stream<T, F>(future: F) -> impl Stream<Item = CallState<T>>
where
    F: Future<Output = Result<T>>,
{
    async_stream::stream! {
        yield CallState::Loading;
        yield CallState::from(future.await);
    }
}

/// What a screen renders: loading collapsed into a flag, last data kept.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestState<T> {
    pub is_loading: bool,
    pub data: Option<T>,
    pub error: Option<SyncError>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self {
            is_loading: false,
            data: None,
            error: None,
        }
    }
}

impl<T> RequestState<T> {
    /// Fold one call state in. Data from an earlier success survives a later
    /// failure so the screen keeps showing it.
    pub fn apply(&mut self, state: CallState<T>) {
        match state {
            CallState::Loading => {
                self.is_loading = true;
                self.error = None;
            }
            CallState::Success(value) => {
                self.is_loading = false;
                self.data = Some(value);
                self.error = None;
            }
            CallState::Error(err) => {
                self.is_loading = false;
                self.error = Some(err);
            }
        }
    }
}
