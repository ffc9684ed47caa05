//! `armdeck-broker` — the session broker.
//!
//! Spawns one subprocess per session, pumps its output through the
//! classifier, fans classified messages out to any number of subscribers,
//! relays operator input back to the process, and tears everything down on
//! completion, error, disconnect, or explicit cancellation.
//!
//! Sessions are ephemeral: nothing persists across a process restart and
//! nothing is retried automatically.

pub mod registry;
pub mod session;
pub mod settings;
pub mod stream;

pub use registry::SessionRegistry;
pub use session::SessionSummary;
pub use settings::{BrokerSettings, ClassifierSettings};
pub use stream::Subscription;
