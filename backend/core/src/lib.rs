//! `armdeck-core` — shared types for the Armdeck session broker.
//!
//! Provides:
//! - Session identifiers and the session status state machine
//! - Operation variants (calibration, teleoperation, motor setup,
//!   dataset record/replay) and their argv construction
//! - Classified message and wire protocol types
//! - The broker error taxonomy

pub mod error;
pub mod message;
pub mod operation;
pub mod status;

pub use error::BrokerError;
pub use message::{ClassifiedMessage, LogEntry, StatusPayload, StreamMessage, TableTiming};
pub use operation::{
    ArmEndpoint, ArmSide, CameraDescriptor, CommandSpec, Launcher, Operation, OperationKind,
};
pub use status::SessionStatus;

/// Opaque identifier of one tracked subprocess session.
pub type SessionId = uuid::Uuid;
