//! Signal layouts and the identifier → layout table

pub mod spec;
pub mod table;

// Re-export key types for convenience
pub use spec::{ByteOrder, SignalSpec, ValueType};
pub use table::{CustomDecoder, DecodeStrategy, SignalTable};
