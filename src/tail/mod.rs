//! Shared tail-follow subsystem.
//!
//! Viewers attach to a file by name; each gets a replay of the current last
//! K lines, then every line appended afterwards, with one file handle and
//! one native watch shared per path no matter how many viewers.
//!
//! # Architecture
//!
//! ```text
//! TailService (one task)
//!   - command channel  <- TailHandle::attach / detach / shutdown
//!   - native events    <- ChangeNotifier (notify)
//!   - poll timer       <- recurring fallback wake
//!         |
//!   path -> TrackedFile
//!             - FollowEngine  (handle + offset + trailing flag)
//!             - subscribers   (fan-out, failures isolated)
//! ```

mod error;
mod follow;
pub mod line;
mod locator;
mod registry;
mod subscriber;
mod watch;

pub use error::TailError;
pub use follow::{FollowEngine, WakeReason};
pub use locator::{TailSnapshot, tail_lines};
pub use registry::{Subscription, TailHandle, TailService, TailServiceBuilder};
pub use subscriber::{ChannelSubscriber, DeliveryError, Subscriber, SubscriberId};
