//! Utility modules: background call states, timeout.

pub mod call;
pub mod timeout;
