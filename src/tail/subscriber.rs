//! Delivery capability implemented by transport adapters.
//!
//! The registry fans emitted lines out to subscribers through this trait;
//! a transport (WebSocket session, long-poll connection, stdout printer)
//! implements it and calls detach when its side goes away.

use thiserror::Error;
use tokio::sync::mpsc;

/// Identifies one attached subscriber within the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub(crate) u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single delivery failed.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("subscriber channel closed")]
    Closed,

    #[error("subscriber write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Delivery target for tailed lines.
///
/// `deliver` receives the line content without its terminator and frames it
/// as content plus exactly one `\n`; bytes pass through unmodified. A failed
/// delivery is isolated to this subscriber; once `is_closed` reports true
/// the registry prunes it.
pub trait Subscriber: Send {
    fn deliver(&mut self, line: &[u8]) -> Result<(), DeliveryError>;

    fn is_closed(&self) -> bool;
}

/// Subscriber that forwards framed lines over an unbounded channel.
pub struct ChannelSubscriber {
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { tx }
    }

    /// Subscriber plus the receiving end it delivers framed lines to.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Vec<u8>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn deliver(&mut self, line: &[u8]) -> Result<(), DeliveryError> {
        let mut framed = Vec::with_capacity(line.len() + 1);
        framed.extend_from_slice(line);
        framed.push(b'\n');
        self.tx.send(framed).map_err(|_| DeliveryError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_with_exactly_one_newline() {
        let (mut sub, mut rx) = ChannelSubscriber::channel();
        sub.deliver(b"hello").unwrap();
        assert_eq!(rx.try_recv().unwrap(), b"hello\n");
    }

    #[test]
    fn closed_receiver_reports_closed() {
        let (mut sub, rx) = ChannelSubscriber::channel();
        drop(rx);
        assert!(sub.is_closed());
        assert!(matches!(sub.deliver(b"x"), Err(DeliveryError::Closed)));
    }
}
