//! CAN Live Decoder Library
//!
//! Decodes live CAN traffic into named, scaled signals and keeps a bounded
//! time series per signal for display.
//!
//! # Architecture
//!
//! - [`BitFieldCodec`] extracts raw bit fields (Intel and Motorola layouts)
//!   and applies sign extension, scale and offset
//! - [`SignalTable`] maps CAN identifiers to signal layouts or to a custom
//!   decoder that takes precedence over them
//! - [`TimeSeriesStore`] keeps the newest `capacity` samples per series
//! - [`IngestionPipeline`] runs a reader thread and a decode worker joined by
//!   a bounded queue
//! - [`Session`] owns all of the above; there is no process-wide state
//!
//! The transport is abstracted behind [`FrameSource`]. The library ships a
//! candump log replayer; hardware drivers live outside this crate.
//!
//! The library does NOT:
//! - Parse DBC or ARXML databases
//! - Transmit frames
//! - Persist series to disk (see the CLI for JSON export)
//!
//! # Example Usage
//!
//! ```no_run
//! use can_live_decoder::{ByteOrder, CandumpReplay, Session, SessionConfig, SignalSpec, ValueType};
//! use can_live_decoder::types::SeriesKey;
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let mut session = Session::new(SessionConfig::new().with_history_capacity(500)).unwrap();
//! session
//!     .add_signal(
//!         0x259,
//!         SignalSpec::new("voltage", 0, 16, ByteOrder::LittleEndian, ValueType::Unsigned, 0.001, 0.0, "V")
//!             .unwrap(),
//!     )
//!     .unwrap();
//!
//! session.start(CandumpReplay::open(Path::new("trace.log")).unwrap()).unwrap();
//! session.wait_until_drained(Duration::from_secs(5));
//! let stats = session.stop();
//!
//! for sample in session.series(&SeriesKey::new(0x259, "voltage")) {
//!     println!("{} {}", sample.timestamp, sample.value);
//! }
//! println!("{} frames decoded", stats.frames_decoded);
//! ```

// Public modules
pub mod bitfield;
pub mod bus;
pub mod config;
pub mod message_decoder;
pub mod pipeline;
pub mod presets;
pub mod session;
pub mod signals;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use bitfield::BitFieldCodec;
pub use bus::{CandumpReplay, FrameSource};
pub use config::{DataType, OverflowPolicy, SessionConfig, SignalConfig};
pub use message_decoder::FrameDecoder;
pub use pipeline::{IngestionPipeline, PipelineStats};
pub use session::Session;
pub use signals::{ByteOrder, CustomDecoder, DecodeStrategy, SignalSpec, SignalTable, ValueType};
pub use store::{TimeSeriesStore, DEFAULT_HISTORY_CAPACITY};
pub use types::{
    BusError, CanFrame, DecodedMessage, DecodedSignal, DecoderError, Result, Sample, SeriesKey,
    Timestamp,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: an idle session with the default decoders
        let session = Session::default();
        assert_eq!(session.load_defaults().unwrap(), 3);
        assert_eq!(session.identifiers().len(), 2);
        assert!(!VERSION.is_empty());
    }
}
