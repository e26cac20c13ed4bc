//! SQLite-backed comment store: profiles, per-video comments, and the
//! insert-notification hook feeding the live bus.

mod comments;
mod db;
mod profiles;
mod types;

pub use db::Database;
pub use types::{Profile, RawComment, StoreError};
