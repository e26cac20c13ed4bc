//! Live propagation: per-video row-change channels and the subscription
//! task that turns insert notifications into enriched feed deliveries.

mod bus;
mod subscriber;

pub use bus::{EventKind, LiveBus, RowEvent, RowRef, COMMENTS_TABLE};
pub use subscriber::{ChannelStatus, LiveSubscription};
