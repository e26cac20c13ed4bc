//! Utility functions for common operations.
//!
//! Currently just timestamp formatting for comment display.

mod time;

pub use time::time_ago;
