//! tailcast: a shared tail-follow engine.
//!
//! Many simultaneous viewers watch the tail of a growing text file: each
//! gets the last K lines on attach, then every appended line with no gaps
//! or duplicates, over one shared file handle and one native watch per
//! path. Names resolve inside a configured root directory and cannot
//! escape it.

pub mod config;
pub mod jail;
pub mod logging;
pub mod tail;

pub use config::{LoggingConfig, Settings, TailConfig};
pub use jail::PathJail;
pub use tail::{
    ChannelSubscriber, DeliveryError, FollowEngine, Subscriber, SubscriberId, Subscription,
    TailError, TailHandle, TailService, TailServiceBuilder, WakeReason,
};
