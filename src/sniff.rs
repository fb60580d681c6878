//! Container detection from leading bytes.
//!
//! Extraction never trusts file extensions; the parser is selected from the
//! magic numbers at the start of the source.

use crate::error::Result;
use crate::source::Reader;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// ISO BMFF (MP4/MOV/M4A), identified by an `ftyp` box.
    Mp4,
    /// MPEG audio, with or without a leading ID3v2 tag.
    Mp3,
    Flac,
    Ogg,
    Jpeg,
    Png,
    /// Bare TIFF (also the EXIF payload format).
    Tiff,
    Unknown,
}

impl ContainerFormat {
    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Mp4 => "mp4",
            ContainerFormat::Mp3 => "mp3",
            ContainerFormat::Flac => "flac",
            ContainerFormat::Ogg => "ogg",
            ContainerFormat::Jpeg => "jpeg",
            ContainerFormat::Png => "png",
            ContainerFormat::Tiff => "tiff",
            ContainerFormat::Unknown => "unknown",
        }
    }
}

/// Sniff the container family from the first bytes of the source.
pub fn sniff(reader: &mut Reader) -> Result<ContainerFormat> {
    let head = reader.read_up_to(0, 12)?;
    Ok(sniff_bytes(&head))
}

pub fn sniff_bytes(head: &[u8]) -> ContainerFormat {
    if head.len() >= 12 && &head[4..8] == b"ftyp" {
        return ContainerFormat::Mp4;
    }
    if head.starts_with(&PNG_SIGNATURE) {
        return ContainerFormat::Png;
    }
    if head.starts_with(b"ID3") {
        return ContainerFormat::Mp3;
    }
    if head.starts_with(b"fLaC") {
        return ContainerFormat::Flac;
    }
    if head.starts_with(b"OggS") {
        return ContainerFormat::Ogg;
    }
    if head.starts_with(&[0xFF, 0xD8]) {
        return ContainerFormat::Jpeg;
    }
    if head.starts_with(b"II\x2A\x00") || head.starts_with(b"MM\x00\x2A") {
        return ContainerFormat::Tiff;
    }
    // Bare MPEG audio frame sync: 11 set bits
    if head.len() >= 2 && head[0] == 0xFF && head[1] & 0xE0 == 0xE0 {
        return ContainerFormat::Mp3;
    }
    ContainerFormat::Unknown
}
