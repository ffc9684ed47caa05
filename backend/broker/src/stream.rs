//! Subscriber attachment to a session's live stream.
//!
//! Each session owns one bounded `tokio::sync::broadcast` topic. Attaching
//! is subscribing; detaching is dropping the receiver. Backpressure policy:
//! a subscriber that cannot keep up loses its *own* oldest buffered messages
//! (`RecvError::Lagged`). The session pump never blocks on delivery and
//! other subscribers are unaffected. There is no implicit replay on attach;
//! the retained log is available explicitly via
//! [`SessionRegistry::log`](crate::SessionRegistry::log).

use tokio::sync::broadcast;

use armdeck_core::{SessionStatus, StreamMessage};

/// A live attachment to one session.
pub struct Subscription {
    /// Messages emitted after the attachment, in classifier order.
    pub receiver: broadcast::Receiver<StreamMessage>,
    /// Session status at the moment of attachment; senders relay this first
    /// so a late subscriber knows where the session stands.
    pub status: SessionStatus,
}
