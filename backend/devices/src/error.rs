use thiserror::Error;

/// Failures opening or releasing a capture device.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The device node for this index does not exist or is not accessible.
    #[error("capture device {index} unavailable: {reason}")]
    Unavailable { index: u32, reason: String },

    /// Opening the device failed at the OS level.
    #[error("failed to open capture device {index}")]
    Open {
        index: u32,
        #[source]
        source: std::io::Error,
    },

    /// Releasing the device failed. The registry treats the handle as gone
    /// regardless, so this is diagnostic rather than actionable.
    #[error("failed to release capture device {index}: {reason}")]
    Release { index: u32, reason: String },
}
