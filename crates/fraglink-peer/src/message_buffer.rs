//! Receiver-side message accumulator.
//!
//! Message fragments append into memory until the spill threshold would be
//! crossed; the accumulated bytes then move to an anonymous temporary file
//! that the operating system reclaims when the process exits. Final assembly
//! concatenates the on-disk prefix with the unflushed remainder.

use std::{
    fs::File,
    io::{self, Read, Seek, SeekFrom, Write},
};

use tracing::debug;

/// Accumulates one inbound message, spilling to disk past the threshold.
#[derive(Debug)]
pub struct MessageBuffer {
    memory: Vec<u8>,
    spill: Option<File>,
    spilled_bytes: u64,
    threshold: usize,
}

impl MessageBuffer {
    /// Creates a buffer that keeps at most `threshold` bytes in memory.
    pub fn new(threshold: usize) -> Self {
        Self { memory: Vec::new(), spill: None, spilled_bytes: 0, threshold }
    }

    /// Appends one fragment.
    pub fn append(&mut self, fragment: &[u8]) -> io::Result<()> {
        if self.memory.len() + fragment.len() > self.threshold {
            self.flush_to_disk()?;
        }
        self.memory.extend_from_slice(fragment);
        Ok(())
    }

    /// Total bytes accumulated so far.
    pub fn len(&self) -> u64 {
        self.spilled_bytes + self.memory.len() as u64
    }

    /// Whether nothing has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the complete message and resets the buffer for the next one.
    pub fn take_complete(&mut self) -> io::Result<Vec<u8>> {
        let mut complete = Vec::with_capacity(self.len() as usize);
        if let Some(mut spill) = self.spill.take() {
            spill.seek(SeekFrom::Start(0))?;
            spill.read_to_end(&mut complete)?;
        }
        complete.append(&mut self.memory);
        self.spilled_bytes = 0;
        Ok(complete)
    }

    /// Drops any partial state, e.g. when a transfer is aborted.
    pub fn reset(&mut self) {
        self.memory.clear();
        self.spill = None;
        self.spilled_bytes = 0;
    }

    fn flush_to_disk(&mut self) -> io::Result<()> {
        if self.memory.is_empty() {
            return Ok(());
        }
        if self.spill.is_none() {
            debug!(threshold = self.threshold, "message exceeds memory limit, spilling to disk");
            self.spill = Some(tempfile::tempfile()?);
        }
        if let Some(spill) = self.spill.as_mut() {
            spill.write_all(&self.memory)?;
        }
        self.spilled_bytes += self.memory.len() as u64;
        self.memory.clear();
        Ok(())
    }
}
