//! Audio container parsing: MP3 (ID3v2 + MPEG frame header), FLAC
//! (STREAMINFO + Vorbis comments), and Ogg (Vorbis/Opus headers plus the
//! trailing granule position for duration).

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::debug;

use crate::error::{MediaError, Result};
use crate::normalize::duration_seconds;
use crate::source::Reader;

/// ID3 tags can embed album art; cap how much of the tag region we buffer.
/// The text frames we want come first in every mainstream tagger's output.
const MAX_TAG_SCAN: u64 = 4 << 20;
/// Window scanned at either end of an Ogg stream.
const OGG_SCAN_WINDOW: usize = 64 << 10;

/// Raw fields from one audio container, before normalization.
#[derive(Debug, Default, Clone)]
pub struct AudioMetadata {
    pub codec: &'static str,
    pub duration: f64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    /// Declared/nominal stream bitrate in bits per second.
    pub bitrate: Option<u32>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
}

// ---------------------------------------------------------------------------
// MP3 / ID3v2
// ---------------------------------------------------------------------------

const BITRATE_V1_L3: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];
const BITRATE_V2_L3: [u32; 16] = [
    0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0,
];
const SAMPLE_RATE_V1: [u32; 4] = [44_100, 48_000, 32_000, 0];
const SAMPLE_RATE_V2: [u32; 4] = [22_050, 24_000, 16_000, 0];
const SAMPLE_RATE_V25: [u32; 4] = [11_025, 12_000, 8_000, 0];

pub fn parse_mp3(reader: &mut Reader) -> Result<AudioMetadata> {
    let mut meta = AudioMetadata {
        codec: "mp3",
        ..Default::default()
    };

    let head = reader.read_up_to(0, 10)?;
    let mut audio_start = 0u64;
    if head.starts_with(b"ID3") && head.len() == 10 {
        let tag_size = syncsafe_u32(&head[6..10]) as u64;
        let footer = if head[5] & 0x10 != 0 { 10 } else { 0 };
        audio_start = 10 + tag_size + footer;

        let scan = tag_size.min(MAX_TAG_SCAN) as usize;
        let tag = reader.read_up_to(10, scan)?;
        parse_id3_frames(&tag, head[3], &mut meta);
    }

    // First MPEG frame header after the tag region
    let window = reader.read_up_to(audio_start, OGG_SCAN_WINDOW)?;
    let Some((offset, header)) = find_frame_sync(&window) else {
        return Err(MediaError::corrupt(
            audio_start,
            "no MPEG audio frame sync found",
        ));
    };
    debug!(offset = audio_start + offset as u64, "MPEG frame sync");

    let version_bits = (header[1] >> 3) & 0x3;
    let bitrate_index = (header[2] >> 4) as usize;
    let rate_index = ((header[2] >> 2) & 0x3) as usize;
    let mono = header[3] >> 6 == 0b11;

    let (bitrate_table, rate_table) = match version_bits {
        0b11 => (&BITRATE_V1_L3, &SAMPLE_RATE_V1),
        0b10 => (&BITRATE_V2_L3, &SAMPLE_RATE_V2),
        0b00 => (&BITRATE_V2_L3, &SAMPLE_RATE_V25),
        _ => {
            return Err(MediaError::corrupt(
                audio_start + offset as u64,
                "reserved MPEG version in frame header",
            ))
        }
    };
    let bitrate = bitrate_table[bitrate_index] * 1000;
    let sample_rate = rate_table[rate_index];
    if sample_rate == 0 {
        return Err(MediaError::corrupt(
            audio_start + offset as u64,
            "reserved sample-rate index in frame header",
        ));
    }

    meta.sample_rate = Some(sample_rate);
    meta.channels = Some(if mono { 1 } else { 2 });
    if bitrate > 0 {
        meta.bitrate = Some(bitrate);
        // Constant-bitrate estimate over the post-tag payload
        if let Some(size) = reader.size() {
            let audio_bytes = size.saturating_sub(audio_start);
            let millis = audio_bytes.saturating_mul(8000) / bitrate as u64;
            meta.duration = millis as f64 / 1000.0;
        }
    }
    Ok(meta)
}

fn syncsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

fn find_frame_sync(window: &[u8]) -> Option<(usize, [u8; 4])> {
    for i in 0..window.len().saturating_sub(4) {
        if window[i] == 0xFF && window[i + 1] & 0xE0 == 0xE0 {
            // Layer and version must not be reserved
            let version = (window[i + 1] >> 3) & 0x3;
            let layer = (window[i + 1] >> 1) & 0x3;
            if version != 0b01 && layer != 0b00 {
                return Some((i, [window[i], window[i + 1], window[i + 2], window[i + 3]]));
            }
        }
    }
    None
}

fn parse_id3_frames(tag: &[u8], major_version: u8, meta: &mut AudioMetadata) {
    let (id_len, size_len) = if major_version == 2 { (3, 3) } else { (4, 4) };
    let header_len = id_len + size_len + if major_version == 2 { 0 } else { 2 };

    let mut offset = 0;
    while offset + header_len <= tag.len() {
        let id = &tag[offset..offset + id_len];
        if id[0] == 0 {
            break; // padding
        }
        let size = match major_version {
            2 => {
                ((tag[offset + 3] as usize) << 16)
                    | ((tag[offset + 4] as usize) << 8)
                    | tag[offset + 5] as usize
            }
            4 => syncsafe_u32(&tag[offset + 4..offset + 8]) as usize,
            _ => BigEndian::read_u32(&tag[offset + 4..offset + 8]) as usize,
        };
        let body_start = offset + header_len;
        let Some(body) = tag.get(body_start..body_start + size) else {
            break;
        };

        let slot = match (major_version, id) {
            (2, b"TP1") | (_, b"TPE1") => Some(&mut meta.artist),
            (2, b"TT2") | (_, b"TIT2") => Some(&mut meta.title),
            (2, b"TAL") | (_, b"TALB") => Some(&mut meta.album),
            _ => None,
        };
        if let Some(slot) = slot {
            if let Some(text) = decode_text_frame(body) {
                *slot = Some(text);
            }
        }
        offset = body_start + size;
    }
}

/// ID3 text frame: one encoding byte, then the string.
fn decode_text_frame(body: &[u8]) -> Option<String> {
    let (&encoding, text) = body.split_first()?;
    let decoded = match encoding {
        0 => text.iter().map(|&b| b as char).collect(), // Latin-1
        1 => decode_utf16(text, None)?,                 // UTF-16 with BOM
        2 => decode_utf16(text, Some(false))?,          // UTF-16BE
        3 => String::from_utf8_lossy(text).into_owned(),
        _ => return None,
    };
    let trimmed = decoded.trim_end_matches('\0').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn decode_utf16(bytes: &[u8], little_endian: Option<bool>) -> Option<String> {
    let (le, data) = match little_endian {
        Some(le) => (le, bytes),
        None => match bytes {
            [0xFF, 0xFE, rest @ ..] => (true, rest),
            [0xFE, 0xFF, rest @ ..] => (false, rest),
            _ => (true, bytes),
        },
    };
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| {
            if le {
                u16::from_le_bytes([c[0], c[1]])
            } else {
                u16::from_be_bytes([c[0], c[1]])
            }
        })
        .collect();
    Some(String::from_utf16_lossy(&units))
}

// ---------------------------------------------------------------------------
// FLAC
// ---------------------------------------------------------------------------

pub fn parse_flac(reader: &mut Reader) -> Result<AudioMetadata> {
    let magic = reader.read_at(0, 4)?;
    if magic != *b"fLaC" {
        return Err(MediaError::corrupt(0, "missing fLaC marker"));
    }

    let mut meta = AudioMetadata {
        codec: "flac",
        ..Default::default()
    };
    let mut offset = 4u64;
    let mut saw_streaminfo = false;

    loop {
        let header = reader.read_at(offset, 4)?;
        let last = header[0] & 0x80 != 0;
        let block_type = header[0] & 0x7F;
        let length = (((header[1] as u32) << 16) | ((header[2] as u32) << 8) | header[3] as u32) as u64;
        offset += 4;

        match block_type {
            0 => {
                if length < 34 {
                    return Err(MediaError::corrupt(offset, "STREAMINFO shorter than 34 bytes"));
                }
                let block = reader.read_at(offset, 34)?;
                // 20 bits sample rate, 3 bits channels-1, 5 bits bps-1,
                // 36 bits total samples, packed from byte 10
                let sample_rate = ((block[10] as u32) << 12)
                    | ((block[11] as u32) << 4)
                    | ((block[12] as u32) >> 4);
                let channels = ((block[12] >> 1) & 0x7) as u32 + 1;
                let total_samples =
                    (((block[13] & 0x0F) as u64) << 32) | BigEndian::read_u32(&block[14..18]) as u64;

                if sample_rate == 0 {
                    return Err(MediaError::corrupt(offset, "STREAMINFO sample rate is zero"));
                }
                meta.sample_rate = Some(sample_rate);
                meta.channels = Some(channels);
                meta.duration = duration_seconds(total_samples, sample_rate);
                saw_streaminfo = true;
            }
            4 => {
                let scan = length.min(MAX_TAG_SCAN) as usize;
                let block = reader.read_at(offset, scan)?;
                parse_vorbis_comments(&block, &mut meta);
            }
            _ => {}
        }

        offset += length;
        if last {
            break;
        }
    }

    if !saw_streaminfo {
        return Err(MediaError::corrupt(4, "no STREAMINFO block"));
    }
    Ok(meta)
}

/// Vorbis comment structure, shared by FLAC and Ogg-Vorbis. All lengths are
/// little-endian; keys are case-insensitive. Malformed entries end the scan
/// quietly since every field here is optional.
fn parse_vorbis_comments(block: &[u8], meta: &mut AudioMetadata) {
    let mut offset = 0usize;
    let Some(vendor_len) = read_u32le(block, offset) else { return };
    offset += 4 + vendor_len as usize;
    let Some(count) = read_u32le(block, offset) else { return };
    offset += 4;

    for _ in 0..count {
        let Some(len) = read_u32le(block, offset) else { return };
        offset += 4;
        let Some(entry) = block.get(offset..offset + len as usize) else {
            return;
        };
        offset += len as usize;

        let Ok(text) = std::str::from_utf8(entry) else {
            continue;
        };
        let Some((key, value)) = text.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.to_ascii_uppercase().as_str() {
            "ARTIST" => meta.artist = Some(value.to_string()),
            "TITLE" => meta.title = Some(value.to_string()),
            "ALBUM" => meta.album = Some(value.to_string()),
            _ => {}
        }
    }
}

fn read_u32le(data: &[u8], offset: usize) -> Option<u32> {
    data.get(offset..offset + 4).map(LittleEndian::read_u32)
}

// ---------------------------------------------------------------------------
// Ogg (Vorbis / Opus)
// ---------------------------------------------------------------------------

pub fn parse_ogg(reader: &mut Reader) -> Result<AudioMetadata> {
    let head = reader.read_up_to(0, OGG_SCAN_WINDOW)?;
    if !head.starts_with(b"OggS") {
        return Err(MediaError::corrupt(0, "missing OggS capture pattern"));
    }

    let (first_payload, first_len) = read_ogg_page(&head, 0)
        .ok_or_else(|| MediaError::corrupt(0, "truncated first Ogg page"))?;

    let mut meta = AudioMetadata::default();
    // Granule positions count PCM samples at this rate
    let granule_rate;
    if first_payload.starts_with(b"\x01vorbis") {
        if first_payload.len() < 28 {
            return Err(MediaError::corrupt(0, "truncated Vorbis identification header"));
        }
        meta.codec = "vorbis";
        meta.channels = Some(first_payload[11] as u32);
        let sample_rate = LittleEndian::read_u32(&first_payload[12..16]);
        if sample_rate == 0 {
            return Err(MediaError::corrupt(0, "Vorbis sample rate is zero"));
        }
        meta.sample_rate = Some(sample_rate);
        granule_rate = sample_rate;
        let nominal = LittleEndian::read_i32(&first_payload[20..24]);
        if nominal > 0 {
            meta.bitrate = Some(nominal as u32);
        }
    } else if first_payload.starts_with(b"OpusHead") {
        if first_payload.len() < 19 {
            return Err(MediaError::corrupt(0, "truncated Opus identification header"));
        }
        meta.codec = "opus";
        meta.channels = Some(first_payload[9] as u32);
        // OpusHead stores the input rate; the granule clock is always 48 kHz
        meta.sample_rate = Some(48_000);
        granule_rate = 48_000;
    } else {
        return Err(MediaError::unsupported(
            "Ogg stream is neither Vorbis nor Opus",
        ));
    }

    // Comment header lives on the next page(s)
    if let Some((second_payload, _)) = read_ogg_page(&head, first_len) {
        let comments = second_payload
            .strip_prefix(b"\x03vorbis".as_slice())
            .or_else(|| second_payload.strip_prefix(b"OpusTags".as_slice()));
        if let Some(comments) = comments {
            parse_vorbis_comments(comments, &mut meta);
        }
    }

    // Duration from the highest granule position near the end of the stream
    if let Some(size) = reader.size() {
        let window_start = size.saturating_sub(OGG_SCAN_WINDOW as u64);
        let tail = reader.read_up_to(window_start, OGG_SCAN_WINDOW)?;
        if let Some(granule) = last_granule(&tail) {
            meta.duration = duration_seconds(granule, granule_rate);
        }
    }
    Ok(meta)
}

/// Parse one Ogg page at `offset` inside `data`; returns its payload slice
/// and total page length.
fn read_ogg_page(data: &[u8], offset: usize) -> Option<(&[u8], usize)> {
    let page = data.get(offset..)?;
    if !page.starts_with(b"OggS") || page.len() < 27 {
        return None;
    }
    let segment_count = page[26] as usize;
    let table = page.get(27..27 + segment_count)?;
    let payload_len: usize = table.iter().map(|&b| b as usize).sum();
    let payload_start = 27 + segment_count;
    let payload = page.get(payload_start..payload_start + payload_len)?;
    Some((payload, payload_start + payload_len))
}

/// A capture pattern alone is not enough: packet payloads can contain the
/// bytes `OggS` too, so a candidate must also look like a page (version 0,
/// defined header-type bits, segment table in bounds) before its granule
/// position counts.
fn last_granule(window: &[u8]) -> Option<u64> {
    let mut best = None;
    let mut i = 0;
    while i + 27 <= window.len() {
        if &window[i..i + 4] == b"OggS" && window[i + 4] == 0 && window[i + 5] <= 0x07 {
            let segment_count = window[i + 26] as usize;
            if i + 27 + segment_count <= window.len() {
                let granule = LittleEndian::read_u64(&window[i + 6..i + 14]);
                if granule != u64::MAX {
                    best = Some(best.map_or(granule, |b: u64| b.max(granule)));
                }
            }
        }
        i += 1;
    }
    best
}
