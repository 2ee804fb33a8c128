//! Signal table
//!
//! Maps frame identifiers to their ordered signal layouts, plus optional
//! per-identifier custom decoders that take precedence over the layouts.

use crate::signals::spec::SignalSpec;
use crate::types::{DecodedSignal, DecoderError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A user-supplied decode routine for one identifier
///
/// Its output is returned verbatim by the frame decoder. Any closure of the
/// form `Fn(&[u8]) -> Vec<DecodedSignal>` implements this trait.
pub trait CustomDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> Vec<DecodedSignal>;
}

impl<F> CustomDecoder for F
where
    F: Fn(&[u8]) -> Vec<DecodedSignal> + Send + Sync,
{
    fn decode(&self, payload: &[u8]) -> Vec<DecodedSignal> {
        self(payload)
    }
}

/// How frames of one identifier are decoded
pub enum DecodeStrategy<'a> {
    /// A registered custom decoder
    Custom(&'a dyn CustomDecoder),
    /// The identifier's ordered signal layouts
    FieldTable(&'a [SignalSpec]),
    /// Nothing registered for this identifier
    Unknown,
}

impl fmt::Debug for DecodeStrategy<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeStrategy::Custom(_) => write!(f, "Custom"),
            DecodeStrategy::FieldTable(specs) => write!(f, "FieldTable({} signals)", specs.len()),
            DecodeStrategy::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Identifier → signal layout table
#[derive(Default)]
pub struct SignalTable {
    /// Key: CAN ID, Value: signals in registration order
    signals: HashMap<u32, Vec<SignalSpec>>,

    /// Custom decoders by CAN ID
    custom: HashMap<u32, Arc<dyn CustomDecoder>>,
}

impl SignalTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a signal under `can_id`
    ///
    /// Names are unique per identifier; registering a name twice is rejected
    /// with [`DecoderError::DuplicateSignal`].
    pub fn add_signal(&mut self, can_id: u32, spec: SignalSpec) -> Result<()> {
        let entry = self.signals.entry(can_id).or_default();

        if entry.iter().any(|s| s.name() == spec.name()) {
            return Err(DecoderError::DuplicateSignal {
                can_id,
                name: spec.name().to_string(),
            });
        }

        log::debug!("Registered signal '{}' for CAN ID 0x{:X}", spec.name(), can_id);
        entry.push(spec);
        Ok(())
    }

    /// Remove a signal; the identifier entry is dropped once it has no signals left
    pub fn remove_signal(&mut self, can_id: u32, name: &str) -> Result<SignalSpec> {
        let not_found = || DecoderError::SignalNotFound {
            can_id,
            name: name.to_string(),
        };

        let entry = self.signals.get_mut(&can_id).ok_or_else(not_found)?;
        let idx = entry.iter().position(|s| s.name() == name).ok_or_else(not_found)?;
        let removed = entry.remove(idx);

        if entry.is_empty() {
            self.signals.remove(&can_id);
        }

        log::debug!("Removed signal '{}' from CAN ID 0x{:X}", name, can_id);
        Ok(removed)
    }

    /// Install a custom decoder for `can_id`, replacing any previous one
    pub fn set_custom_decoder(&mut self, can_id: u32, decoder: Arc<dyn CustomDecoder>) {
        if self.custom.insert(can_id, decoder).is_some() {
            log::debug!("Replaced custom decoder for CAN ID 0x{:X}", can_id);
        }
    }

    /// Remove the custom decoder for `can_id`; returns whether one was installed
    pub fn clear_custom_decoder(&mut self, can_id: u32) -> bool {
        self.custom.remove(&can_id).is_some()
    }

    pub fn has_custom_decoder(&self, can_id: u32) -> bool {
        self.custom.contains_key(&can_id)
    }

    /// Signal names for `can_id` in registration order (empty if unknown)
    pub fn signal_names(&self, can_id: u32) -> Vec<String> {
        self.signals
            .get(&can_id)
            .map(|specs| specs.iter().map(|s| s.name().to_string()).collect())
            .unwrap_or_default()
    }

    /// Signal layouts for `can_id` in registration order
    pub fn signals(&self, can_id: u32) -> &[SignalSpec] {
        self.signals.get(&can_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get_signal(&self, can_id: u32, name: &str) -> Option<&SignalSpec> {
        self.signals(can_id).iter().find(|s| s.name() == name)
    }

    /// Select how frames of `can_id` are decoded; a custom decoder wins
    pub fn strategy(&self, can_id: u32) -> DecodeStrategy<'_> {
        if let Some(custom) = self.custom.get(&can_id) {
            DecodeStrategy::Custom(custom.as_ref())
        } else if let Some(specs) = self.signals.get(&can_id) {
            DecodeStrategy::FieldTable(specs)
        } else {
            DecodeStrategy::Unknown
        }
    }

    /// All identifiers with signals or a custom decoder, sorted
    pub fn can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .signals
            .keys()
            .chain(self.custom.keys())
            .copied()
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Total number of registered signal layouts
    pub fn num_signals(&self) -> usize {
        self.signals.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty() && self.custom.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str, start_bit: u16) -> SignalSpec {
        SignalSpec::raw(name, start_bit, 8).unwrap()
    }

    #[test]
    fn test_empty_table() {
        let table = SignalTable::new();
        assert!(table.is_empty());
        assert!(table.signal_names(0x123).is_empty());
        assert!(matches!(table.strategy(0x123), DecodeStrategy::Unknown));
    }

    #[test]
    fn test_names_keep_registration_order() {
        let mut table = SignalTable::new();
        table.add_signal(0x25A, raw("AIN8", 48)).unwrap();
        table.add_signal(0x25A, raw("AIN5", 0)).unwrap();
        table.add_signal(0x25A, raw("AIN6", 16)).unwrap();

        assert_eq!(table.signal_names(0x25A), vec!["AIN8", "AIN5", "AIN6"]);
        assert_eq!(table.num_signals(), 3);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut table = SignalTable::new();
        table.add_signal(0x100, raw("speed", 0)).unwrap();

        let err = table.add_signal(0x100, raw("speed", 8)).unwrap_err();
        assert!(matches!(err, DecoderError::DuplicateSignal { can_id: 0x100, .. }));
        assert_eq!(table.signals(0x100).len(), 1);
        assert_eq!(table.signals(0x100)[0].start_bit(), 0);

        // Same name under another identifier is fine
        table.add_signal(0x101, raw("speed", 0)).unwrap();
    }

    #[test]
    fn test_remove_drops_empty_identifier() {
        let mut table = SignalTable::new();
        table.add_signal(0x100, raw("a", 0)).unwrap();
        table.add_signal(0x100, raw("b", 8)).unwrap();

        table.remove_signal(0x100, "a").unwrap();
        assert_eq!(table.signal_names(0x100), vec!["b"]);

        table.remove_signal(0x100, "b").unwrap();
        assert!(table.can_ids().is_empty());
        assert!(matches!(
            table.remove_signal(0x100, "b"),
            Err(DecoderError::SignalNotFound { .. })
        ));
    }

    #[test]
    fn test_custom_decoder_takes_precedence() {
        let mut table = SignalTable::new();
        table.add_signal(0x200, raw("a", 0)).unwrap();
        assert!(matches!(table.strategy(0x200), DecodeStrategy::FieldTable(_)));

        table.set_custom_decoder(
            0x200,
            Arc::new(|_: &[u8]| vec![DecodedSignal::new("custom", Some(1.0))]),
        );
        assert!(matches!(table.strategy(0x200), DecodeStrategy::Custom(_)));
        assert_eq!(table.can_ids(), vec![0x200]);

        assert!(table.clear_custom_decoder(0x200));
        assert!(!table.clear_custom_decoder(0x200));
        assert!(matches!(table.strategy(0x200), DecodeStrategy::FieldTable(_)));
    }
}
