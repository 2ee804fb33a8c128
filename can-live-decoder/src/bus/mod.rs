//! Bus frame sources
//!
//! The bus transport itself lives outside this crate. The pipeline only needs
//! a blocking-with-timeout receive operation, expressed by [`FrameSource`].

use crate::types::{BusError, CanFrame};
use std::time::Duration;

pub mod candump;

// Re-export source types
pub use candump::{parse_candump_line, CandumpRecord, CandumpReplay};

/// Common trait for everything the reader task can pull frames from
pub trait FrameSource: Send {
    /// Whether the source is ready to deliver frames
    fn is_connected(&self) -> bool;

    /// Wait up to `timeout` for the next frame
    ///
    /// # Returns
    /// * `Ok(Some(frame))` - a frame arrived
    /// * `Ok(None)` - the timeout elapsed without a frame
    /// * `Err(BusError::Transient)` - a recoverable hiccup; call again
    /// * `Err(BusError::Disconnected)` - the source is gone for good
    fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn receive(&mut self, timeout: Duration) -> Result<Option<CanFrame>, BusError> {
        (**self).receive(timeout)
    }
}
