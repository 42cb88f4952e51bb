//! Core types and utilities

pub mod error;
pub mod time;

pub use error::Error;
pub use time::{Clock, ManualClock, SystemClock};
