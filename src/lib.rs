//! Per-video live comment feed engine.
//!
//! A feed session loads comment history and the profile directory
//! concurrently, annotates each comment with its author's profile, and
//! then tracks the discussion live: inserts for the video arrive over a
//! per-video channel and are prepended to the list exactly once. A
//! debounced typing signal reports whether the local viewer is composing.
//!
//! Entry point is [`CommentFeed::open`]; everything else hangs off the
//! returned session.

pub mod config;
pub mod feed;
pub mod live;
pub mod storage;
pub mod util;

pub use config::{Config, ConfigError};
pub use feed::{
    enrich, CommentFeed, EnrichedComment, FeedConfig, FeedError, ProfileDirectory, SubmitOutcome,
    TypingSignal,
};
pub use live::{ChannelStatus, LiveBus, LiveSubscription, RowEvent};
pub use storage::{Database, Profile, RawComment, StoreError};
