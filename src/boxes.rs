//! ISO BMFF (MP4/MOV) box walking.
//!
//! Boxes are length-prefixed, typed, possibly nested chunks: a 32-bit
//! big-endian size, a four-byte type code, then the payload. Size 1 switches
//! to a 64-bit extended size after the type; size 0 means the payload runs to
//! the end of the enclosing range. The walker is a single forward pass over
//! one range; callers re-walk a child payload range to recurse.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{MediaError, Result};
use crate::source::Reader;

/// Nesting bound for recursive walks. Well-formed files stay in single
/// digits; the bound stops pathological self-referencing sizes.
pub const MAX_BOX_DEPTH: usize = 32;

/// Four-byte box or codec type code.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Printable form; non-ASCII bytes are rendered as `.`.
    pub fn to_display(self) -> String {
        self.0
            .iter()
            .map(|&b| {
                if b.is_ascii_graphic() || b == b' ' {
                    b as char
                } else {
                    '.'
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

/// One enumerated box: its type and payload location in the source.
#[derive(Debug, Clone, Copy)]
pub struct BoxInfo {
    pub kind: FourCC,
    /// Absolute offset of the box header.
    pub offset: u64,
    /// Absolute offset of the first payload byte.
    pub payload_start: u64,
    /// Absolute offset one past the last payload byte.
    pub payload_end: u64,
}

impl BoxInfo {
    pub fn payload_len(&self) -> u64 {
        self.payload_end - self.payload_start
    }
}

/// Streaming walk over sibling boxes inside `[start, end)`.
///
/// Not restartable; a failed box is a hard stop for this walk, but boxes
/// already yielded remain valid and sibling ranges can be walked anew.
pub struct BoxIter<'r, 'a> {
    reader: &'r mut Reader<'a>,
    offset: u64,
    end: u64,
}

impl<'r, 'a> BoxIter<'r, 'a> {
    pub fn new(reader: &'r mut Reader<'a>, start: u64, end: u64) -> Self {
        Self {
            reader,
            offset: start,
            end,
        }
    }

    /// Next sibling box, or `None` when the range is exhausted.
    pub fn next_box(&mut self) -> Result<Option<BoxInfo>> {
        if self.offset == self.end {
            return Ok(None);
        }
        if self.offset + 8 > self.end {
            return Err(MediaError::corrupt(
                self.offset,
                "trailing bytes shorter than a box header",
            ));
        }

        let header = self.reader.read_at(self.offset, 8)?;
        let size32 = BigEndian::read_u32(&header[..4]);
        let kind = FourCC([header[4], header[5], header[6], header[7]]);

        let (size, header_len) = match size32 {
            0 => (self.end - self.offset, 8),
            1 => {
                if self.offset + 16 > self.end {
                    return Err(MediaError::corrupt(
                        self.offset,
                        format!("'{kind}' extended size header truncated"),
                    ));
                }
                let ext = self.reader.read_at(self.offset + 8, 8)?;
                (BigEndian::read_u64(&ext), 16)
            }
            n => (n as u64, 8),
        };

        if size < header_len {
            return Err(MediaError::corrupt(
                self.offset,
                format!("'{kind}' declares size {size}, smaller than its header"),
            ));
        }
        if size > self.end - self.offset {
            return Err(MediaError::corrupt(
                self.offset,
                format!(
                    "'{kind}' declares size {size}, exceeding remaining {} bytes",
                    self.end - self.offset
                ),
            ));
        }

        let info = BoxInfo {
            kind,
            offset: self.offset,
            payload_start: self.offset + header_len,
            payload_end: self.offset + size,
        };
        self.offset += size;
        Ok(Some(info))
    }
}

/// First direct child of type `kind` inside `[start, end)`.
pub fn find_child(
    reader: &mut Reader,
    start: u64,
    end: u64,
    kind: &[u8; 4],
) -> Result<Option<BoxInfo>> {
    let mut iter = BoxIter::new(reader, start, end);
    while let Some(child) = iter.next_box()? {
        if child.kind == kind {
            return Ok(Some(child));
        }
    }
    Ok(None)
}
