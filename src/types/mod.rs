//! Domain types shared by the cache, the remote source and the pager.

pub(crate) mod de;
pub mod query;
pub mod record;

pub use query::{HistoryQuery, PageFilters};
pub use record::{DashboardItem, Profile, ReadingDetail, Record, UserProfile};
