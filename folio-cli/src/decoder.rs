//! Incremental decoder for the `data: {json}` event stream.
//!
//! Bytes are buffered until a full newline-terminated record is available, so
//! records (and multi-byte characters) split across network reads are
//! reassembled before parsing.

use folio_shared::{StreamChunk, DATA_PREFIX, DONE_SENTINEL};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

/// Longest record the decoder will buffer. Anything longer is dropped and
/// skipped up to its terminating newline.
pub const MAX_RECORD_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Unterminated tail of the stream; never contains a newline between pushes.
    pending: Vec<u8>,
    discarding: bool,
    finished: bool,
    dropped: usize,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` sentinel has been seen. Later input is ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Complete records that could not be decoded, plus oversized ones.
    pub fn dropped_records(&self) -> usize {
        self.dropped
    }

    pub fn push(&mut self, mut bytes: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        if self.discarding {
            match bytes.iter().position(|b| *b == b'\n') {
                Some(end) => {
                    self.discarding = false;
                    bytes = &bytes[end + 1..];
                }
                None => return events,
            }
        }

        let mut buf = std::mem::take(&mut self.pending);
        // Only the new bytes can hold a newline.
        let mut scanned = buf.len();
        buf.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(offset) = buf[scanned..].iter().position(|b| *b == b'\n') {
            let end = scanned + offset;
            let record = &buf[start..end];
            scanned = end + 1;
            start = scanned;

            if record.len() > MAX_RECORD_BYTES {
                debug!("Dropping stream record of {} bytes", record.len());
                self.dropped += 1;
                continue;
            }
            if let Some(event) = self.decode_record(record) {
                events.push(event);
                if self.finished {
                    return events;
                }
            }
        }

        buf.drain(..start);
        if buf.len() > MAX_RECORD_BYTES {
            debug!("Dropping unterminated stream record over {} bytes", MAX_RECORD_BYTES);
            self.dropped += 1;
            self.discarding = true;
            buf.clear();
        }
        self.pending = buf;
        events
    }

    /// Flushes a trailing record that arrived without its newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let record = std::mem::take(&mut self.pending);
        self.discarding = false;
        if self.finished || record.is_empty() {
            return Vec::new();
        }
        self.decode_record(&record).into_iter().collect()
    }

    fn decode_record(&mut self, record: &[u8]) -> Option<StreamEvent> {
        let record = record.strip_suffix(b"\r").unwrap_or(record);
        let text = match std::str::from_utf8(record) {
            Ok(text) => text,
            Err(e) => {
                debug!("Dropping non UTF-8 stream record: {}", e);
                self.dropped += 1;
                return None;
            }
        };

        let payload = text.strip_prefix(DATA_PREFIX)?.trim();
        if payload == DONE_SENTINEL {
            self.finished = true;
            return Some(StreamEvent::Done);
        }
        if payload.is_empty() {
            return None;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk
                .delta_text()
                .map(|text| StreamEvent::Delta(text.to_string())),
            Err(e) => {
                debug!("Dropping malformed stream record: {}", e);
                self.dropped += 1;
                None
            }
        }
    }
}
