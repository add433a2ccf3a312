//! Cache/remote coordination for paged history.

pub mod mediator;

pub use mediator::{LoadType, MediatorResult, SyncMediator};
