//! Length-prefixed binary record streams
//!
//! Each record is a little-endian `u32` byte length followed by a postcard
//! payload, so every record can be decoded on its own. A stream ends at the
//! first clean end-of-input between records; anything cut short inside a
//! record is a [`RankError::Format`] error.

use std::io::{self, Read, Write};
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{RankError, Result};

/// Default cap on one record's payload size (64 MiB)
pub const DEFAULT_MAX_RECORD_BYTES: usize = 64 * 1024 * 1024;

/// Writes records to a byte sink
pub struct RecordWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Append one record
    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        let payload = postcard::to_allocvec(record)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            RankError::Format(format!("record of {} bytes is too large to frame", payload.len()))
        })?;
        self.inner.write_all(&len.to_le_bytes())?;
        self.inner.write_all(&payload)?;
        self.written += 1;
        Ok(())
    }

    /// Append every record of an iterator, returning how many were written
    pub fn write_all<'a, T, I>(&mut self, records: I) -> Result<u64>
    where
        T: Serialize + 'a,
        I: IntoIterator<Item = &'a T>,
    {
        let before = self.written;
        for record in records {
            self.write(record)?;
        }
        Ok(self.written - before)
    }

    /// Records written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Flush and return the underlying sink
    pub fn into_inner(mut self) -> Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

/// Reads records of type `T` from a byte source, one at a time
///
/// A single forward pass: once the stream ends or fails, it keeps
/// returning `None`.
pub struct RecordReader<R: Read, T> {
    inner: R,
    max_record_bytes: usize,
    read: u64,
    done: bool,
    _record: PhantomData<fn() -> T>,
}

impl<R: Read, T: DeserializeOwned> RecordReader<R, T> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_record_bytes: DEFAULT_MAX_RECORD_BYTES,
            read: 0,
            done: false,
            _record: PhantomData,
        }
    }

    /// Reject records whose declared size exceeds `max` bytes
    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    /// Records decoded so far
    pub fn records_read(&self) -> u64 {
        self.read
    }

    /// Read the length header; `None` on a clean end of input
    fn read_header(&mut self) -> Result<Option<usize>> {
        let mut header = [0u8; 4];
        let mut filled = 0;
        while filled < header.len() {
            match self.inner.read(&mut header[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        match filled {
            0 => Ok(None),
            4 => Ok(Some(u32::from_le_bytes(header) as usize)),
            n => Err(RankError::Format(format!(
                "truncated length header after record {} ({n} of 4 bytes)",
                self.read
            ))),
        }
    }

    fn read_record(&mut self) -> Result<Option<T>> {
        let Some(len) = self.read_header()? else {
            return Ok(None);
        };
        if len > self.max_record_bytes {
            return Err(RankError::Format(format!(
                "record {} declares {len} bytes, limit is {}",
                self.read, self.max_record_bytes
            )));
        }

        let mut payload = vec![0u8; len];
        self.inner.read_exact(&mut payload).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => RankError::Format(format!(
                "truncated record {}: expected {len} bytes",
                self.read
            )),
            _ => RankError::Io(e),
        })?;

        let record = postcard::from_bytes(&payload)?;
        self.read += 1;
        Ok(Some(record))
    }
}

impl<R: Read, T: DeserializeOwned> Iterator for RecordReader<R, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                tracing::debug!(records = self.read, "record stream finished");
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
