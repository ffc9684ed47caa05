//! `armdeck-devices` — camera capture streams and hardware discovery.
//!
//! Capture streams are an on/off resource keyed by device index, managed
//! with the same start/stop/status discipline as broker sessions but with no
//! subprocess behind them. The actual capture mechanism sits behind
//! [`CaptureBackend`] so the registry logic is testable without hardware.

pub mod backend;
pub mod discovery;
pub mod error;
pub mod registry;

pub use backend::{CameraInfo, CaptureBackend, CaptureHandle, VideoNodeBackend};
pub use discovery::list_ports;
pub use error::CaptureError;
pub use registry::{DeviceStatus, DeviceStreamRegistry};
