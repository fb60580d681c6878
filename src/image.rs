//! Still-image parsing: JPEG marker segments, PNG chunks, and bare TIFF
//! files. Dimensions come from the image structure itself; everything else
//! (orientation, camera tags, GPS) comes from an embedded EXIF payload.

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::error::{MediaError, Result};
use crate::exif::{self, ExifDirectory};
use crate::source::Reader;

/// Embedded EXIF payloads and metadata chunks we buffer are bounded.
const MAX_METADATA_PAYLOAD: usize = 1 << 20;
/// Bare TIFF decode window; the directory structures sit at the front.
const MAX_TIFF_SCAN: usize = 8 << 20;

#[derive(Debug, Default)]
pub struct ImageMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub exif: Option<ExifDirectory>,
}

// ---------------------------------------------------------------------------
// JPEG
// ---------------------------------------------------------------------------

pub fn parse_jpeg(reader: &mut Reader) -> Result<ImageMetadata> {
    let soi = reader.read_at(0, 2)?;
    if soi != [0xFF, 0xD8] {
        return Err(MediaError::corrupt(0, "missing JPEG SOI marker"));
    }

    let mut meta = ImageMetadata::default();
    let mut offset = 2u64;
    loop {
        let header = reader.read_at(offset, 2)?;
        if header[0] != 0xFF {
            return Err(MediaError::corrupt(offset, "expected JPEG marker"));
        }
        let marker = header[1];
        // Fill bytes before a marker are legal
        if marker == 0xFF {
            offset += 1;
            continue;
        }
        match marker {
            0xD9 => break,                  // EOI
            0x01 | 0xD0..=0xD7 => offset += 2, // standalone markers
            0xDA => break, // SOS: entropy-coded data follows, nothing left for us
            _ => {
                let len_bytes = reader.read_at(offset + 2, 2)?;
                let seg_len = BigEndian::read_u16(&len_bytes) as u64;
                if seg_len < 2 {
                    return Err(MediaError::corrupt(offset, "JPEG segment length below 2"));
                }
                let payload_start = offset + 4;
                let payload_len = (seg_len - 2) as usize;

                match marker {
                    // Baseline, extended sequential, progressive frame headers
                    0xC0 | 0xC1 | 0xC2 => {
                        if payload_len < 5 {
                            return Err(MediaError::corrupt(offset, "truncated SOF segment"));
                        }
                        let sof = reader.read_at(payload_start, 5)?;
                        meta.height = Some(BigEndian::read_u16(&sof[1..3]) as u32);
                        meta.width = Some(BigEndian::read_u16(&sof[3..5]) as u32);
                    }
                    0xE1 => {
                        let payload =
                            reader.read_at(payload_start, payload_len.min(MAX_METADATA_PAYLOAD))?;
                        if let Some(tiff) = payload.strip_prefix(b"Exif\x00\x00") {
                            debug!(offset = payload_start, "EXIF APP1 segment");
                            match exif::decode(tiff) {
                                Ok(dir) => meta.exif = Some(dir),
                                // EXIF is auxiliary; a broken payload only costs its fields
                                Err(e) => warn!("dropping malformed EXIF payload: {e}"),
                            }
                        }
                    }
                    _ => {}
                }
                offset += 2 + seg_len;
            }
        }
    }

    if meta.width.is_none() {
        return Err(MediaError::corrupt(offset, "no SOF frame header found"));
    }
    Ok(meta)
}

// ---------------------------------------------------------------------------
// PNG
// ---------------------------------------------------------------------------

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

pub fn parse_png(reader: &mut Reader) -> Result<ImageMetadata> {
    let signature = reader.read_at(0, 8)?;
    if signature != PNG_SIGNATURE {
        return Err(MediaError::corrupt(0, "bad PNG signature"));
    }

    let mut meta = ImageMetadata::default();
    let mut offset = 8u64;
    loop {
        let header = reader.read_at(offset, 8)?;
        let data_len = BigEndian::read_u32(&header[0..4]) as u64;
        let kind = &header[4..8];
        let data_start = offset + 8;

        match kind {
            b"IHDR" => {
                if data_len < 8 {
                    return Err(MediaError::corrupt(offset, "IHDR shorter than 8 bytes"));
                }
                let ihdr = reader.read_at(data_start, 8)?;
                meta.width = Some(BigEndian::read_u32(&ihdr[0..4]));
                meta.height = Some(BigEndian::read_u32(&ihdr[4..8]));
            }
            b"eXIf" => {
                let payload =
                    reader.read_at(data_start, (data_len as usize).min(MAX_METADATA_PAYLOAD))?;
                match exif::decode(&payload) {
                    Ok(dir) => meta.exif = Some(dir),
                    Err(e) => warn!("dropping malformed eXIf chunk: {e}"),
                }
            }
            b"IEND" => break,
            _ => {}
        }
        // Chunk data plus its trailing CRC
        offset = data_start + data_len + 4;
    }

    if meta.width.is_none() {
        return Err(MediaError::corrupt(8, "PNG stream has no IHDR"));
    }
    Ok(meta)
}

// ---------------------------------------------------------------------------
// TIFF
// ---------------------------------------------------------------------------

pub fn parse_tiff(reader: &mut Reader) -> Result<ImageMetadata> {
    let bytes = reader.read_up_to(0, MAX_TIFF_SCAN)?;
    let directory = exif::decode(&bytes)?;
    let mut meta = ImageMetadata::default();
    if let Some((width, height)) = directory.dimensions() {
        meta.width = Some(width);
        meta.height = Some(height);
    }
    meta.exif = Some(directory);
    Ok(meta)
}
