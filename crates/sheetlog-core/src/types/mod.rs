//! Shared types for sheetlog.

mod message;

pub use message::*;
