//! candump log replay
//!
//! Replays a text log in the candump format as a [`FrameSource`]:
//!
//! ```text
//! (1699999999.123456) can0 259#D703
//! (1699999999.223456) can0 25E#0000EC05B906
//! (1699999999.323456) can0 25E#00 00 EC 05 B9 06
//! ```
//!
//! The timestamp and interface columns are optional, payload bytes may be
//! space-separated, and `ID#R` marks a remote frame. Blank lines and lines
//! starting with `#` are skipped.

use crate::bus::FrameSource;
use crate::types::{BusError, CanFrame, DecoderError, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;

/// One parsed candump line
#[derive(Debug, Clone, PartialEq)]
pub struct CandumpRecord {
    /// Capture time in seconds since the epoch, if the line had one
    pub timestamp: Option<f64>,
    /// Interface column (e.g. "can0")
    pub interface: Option<String>,
    pub frame: CanFrame,
}

/// Parse a single candump line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_candump_line(line: &str) -> Result<Option<CandumpRecord>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let invalid = |msg: String| DecoderError::InvalidFrame(format!("{} in line '{}'", msg, line));

    let (head, body) = line
        .split_once('#')
        .ok_or_else(|| invalid("missing '#' separator".to_string()))?;

    let mut columns: Vec<&str> = head.split_whitespace().collect();
    let id_text = columns
        .pop()
        .ok_or_else(|| invalid("missing CAN ID".to_string()))?;

    let mut timestamp = None;
    let mut interface = None;
    for column in columns {
        if let Some(ts) = column.strip_prefix('(').and_then(|c| c.strip_suffix(')')) {
            timestamp = Some(
                ts.parse::<f64>()
                    .map_err(|_| invalid(format!("bad timestamp '{}'", ts)))?,
            );
        } else {
            interface = Some(column.to_string());
        }
    }

    let can_id = u32::from_str_radix(id_text, 16)
        .map_err(|_| invalid(format!("bad CAN ID '{}'", id_text)))?;
    if can_id > 0x1FFF_FFFF {
        return Err(invalid(format!("CAN ID 0x{:X} exceeds 29 bits", can_id)));
    }
    let is_extended = id_text.len() > 3;

    let hex: String = body.chars().filter(|c| !c.is_whitespace()).collect();

    let frame = if hex.eq_ignore_ascii_case("r") {
        CanFrame::new(can_id, &[])?.with_flags(true, false)
    } else {
        if !hex.is_ascii() {
            return Err(invalid("non-ASCII payload".to_string()));
        }
        if hex.len() % 2 != 0 {
            return Err(invalid("odd number of hex digits".to_string()));
        }
        let payload = (0..hex.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&hex[i..i + 2], 16))
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| invalid(format!("bad payload '{}'", hex)))?;
        CanFrame::new(can_id, &payload)?
    };

    Ok(Some(CandumpRecord {
        timestamp,
        interface,
        frame: frame.with_extended(is_extended),
    }))
}

/// [`FrameSource`] replaying a candump log
pub struct CandumpReplay {
    lines: Box<dyn BufRead + Send>,
    line_no: usize,
    finished: bool,
}

impl CandumpReplay {
    /// Open a candump log file
    pub fn open(path: &Path) -> Result<Self> {
        log::info!("Opening candump log: {:?}", path);

        if !path.exists() {
            return Err(DecoderError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("candump log not found: {:?}", path),
            )));
        }

        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }

    /// Replay lines from any buffered reader
    pub fn from_reader(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            lines: Box::new(reader),
            line_no: 0,
            finished: false,
        }
    }

    /// Number of lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl FrameSource for CandumpReplay {
    fn is_connected(&self) -> bool {
        !self.finished
    }

    fn receive(&mut self, _timeout: Duration) -> std::result::Result<Option<CanFrame>, BusError> {
        loop {
            if self.finished {
                return Err(BusError::Disconnected("end of candump log".to_string()));
            }

            let mut line = String::new();
            let read = self.lines.read_line(&mut line).map_err(|e| {
                self.finished = true;
                BusError::Disconnected(format!("read failed after line {}: {}", self.line_no, e))
            })?;

            if read == 0 {
                self.finished = true;
                continue;
            }
            self.line_no += 1;

            match parse_candump_line(&line) {
                Ok(Some(record)) => return Ok(Some(record.frame)),
                Ok(None) => continue,
                Err(e) => {
                    return Err(BusError::Transient(format!("line {}: {}", self.line_no, e)));
                }
            }
        }
    }
}
