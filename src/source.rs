//! Byte sources and the positioned reader the parsers run on.
//!
//! A [`Source`] is a handle to bytes: a local path, an in-memory buffer, or a
//! caller-supplied [`ReadAt`] implementation (e.g. a buffered remote stream
//! fetched by the caller; URI resolution and HTTP are out of scope here). The
//! [`Reader`] opened from it is strictly call-local: it owns the underlying
//! descriptor for the duration of one extraction and releases it on every exit
//! path via drop.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::cancel::CancelToken;
use crate::error::{MediaError, Result};

/// Random-access reads over arbitrary bytes.
///
/// Implement this to feed the extractors from a non-file source. `read_at`
/// must not assume sequential access: MP4 parsing seeks between atoms.
pub trait ReadAt: Send {
    /// Read up to `buf.len()` bytes starting at `offset`. Returns the number
    /// of bytes read; 0 means end of stream.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Total size in bytes, if known. Unknown for unbounded streams.
    fn size(&mut self) -> std::io::Result<Option<u64>>;
}

impl ReadAt for File {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> std::io::Result<usize> {
        self.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buf.len() {
            match self.read(&mut buf[total..])? {
                0 => break,
                n => total += n,
            }
        }
        Ok(total)
    }

    fn size(&mut self) -> std::io::Result<Option<u64>> {
        Ok(Some(self.metadata()?.len()))
    }
}

/// A handle to media bytes, resolved by the caller before extraction.
pub enum Source<'a> {
    /// Local file path.
    Path(&'a Path),
    /// Pre-fetched bytes.
    Buffer(&'a [u8]),
    /// Caller-supplied positioned reader.
    Reader(Box<dyn ReadAt>),
}

impl<'a> From<&'a Path> for Source<'a> {
    fn from(path: &'a Path) -> Self {
        Source::Path(path)
    }
}

impl<'a> From<&'a [u8]> for Source<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Source::Buffer(bytes)
    }
}

enum Inner<'a> {
    File(File),
    Buffer(&'a [u8]),
    Custom(Box<dyn ReadAt>),
}

/// Positioned reader with cancellation checks at every read boundary.
pub struct Reader<'a> {
    inner: Inner<'a>,
    size: Option<u64>,
    cancel: CancelToken,
}

impl<'a> Reader<'a> {
    pub fn open(source: Source<'a>, cancel: CancelToken) -> Result<Self> {
        let (inner, size) = match source {
            Source::Path(path) => {
                let file = File::open(path)?;
                let size = file.metadata()?.len();
                (Inner::File(file), Some(size))
            }
            Source::Buffer(bytes) => (Inner::Buffer(bytes), Some(bytes.len() as u64)),
            Source::Reader(mut custom) => {
                let size = custom.size()?;
                (Inner::Custom(custom), size)
            }
        };
        Ok(Self {
            inner,
            size,
            cancel,
        })
    }

    /// Total source size, unknown for unbounded streams. Reported as
    /// `fileSize: 0` downstream when unknown.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Read exactly `buf.len()` bytes at `offset`, failing on truncation.
    pub fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        let read = match &mut self.inner {
            Inner::File(file) => file.read_at(offset, buf)?,
            Inner::Buffer(bytes) => {
                let start = (offset as usize).min(bytes.len());
                let end = start.saturating_add(buf.len()).min(bytes.len());
                buf[..end - start].copy_from_slice(&bytes[start..end]);
                end - start
            }
            Inner::Custom(custom) => custom.read_at(offset, buf)?,
        };
        if read < buf.len() {
            return Err(MediaError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!(
                    "truncated read at offset {offset}: wanted {} bytes, got {read}",
                    buf.len()
                ),
            )));
        }
        Ok(())
    }

    /// Read exactly `len` bytes at `offset` into a fresh buffer.
    pub fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    /// Read up to `len` bytes at `offset`; short reads are not an error.
    pub fn read_up_to(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if self.cancel.is_cancelled() {
            return Err(MediaError::Cancelled);
        }
        let mut buf = vec![0u8; len];
        let read = match &mut self.inner {
            Inner::File(file) => file.read_at(offset, &mut buf)?,
            Inner::Buffer(bytes) => {
                let start = (offset as usize).min(bytes.len());
                let end = start.saturating_add(len).min(bytes.len());
                buf[..end - start].copy_from_slice(&bytes[start..end]);
                end - start
            }
            Inner::Custom(custom) => custom.read_at(offset, &mut buf)?,
        };
        buf.truncate(read);
        Ok(buf)
    }
}
