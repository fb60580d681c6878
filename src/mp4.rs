//! MP4/MOV (ISO BMFF) container parsing.
//!
//! Walks `moov > trak` for every track: `tkhd` gives coded dimensions and the
//! transform matrix, `mdia > mdhd` the timescale and duration, `stsd` the
//! codec fourCC plus per-entry extras (audio channel count and sample rate,
//! `btrt` declared bitrate, `colr` colour signalling), and `stts` the sample
//! count used for frame-rate derivation. `moov > udta` supplies tag atoms
//! (artist/title/album) and the `©xyz` ISO 6709 location.

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, warn};

use crate::boxes::{BoxInfo, BoxIter, FourCC, MAX_BOX_DEPTH};
use crate::error::{MediaError, Result};
use crate::normalize::{is_hdr_transfer, parse_iso6709, Location};
use crate::source::Reader;

/// Leaf boxes we read fully are bounded; a declared size past this is bogus.
const MAX_LEAF_PAYLOAD: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
    Other,
}

/// Raw per-track fields pulled from `trak` and its descendants.
#[derive(Debug, Clone)]
pub struct Track {
    pub kind: TrackKind,
    pub codec: Option<FourCC>,
    pub timescale: u32,
    pub duration_units: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub matrix: [u32; 9],
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
    pub avg_bitrate: Option<u32>,
    pub sample_count: u64,
    /// `Some` only when the sample entry carries nclx/nclc colour info.
    pub hdr: Option<bool>,
}

/// Raw movie-level fields before normalization.
#[derive(Debug, Default)]
pub struct Movie {
    pub timescale: u32,
    pub duration_units: u64,
    pub tracks: Vec<Track>,
    pub artist: Option<String>,
    pub title: Option<String>,
    pub album: Option<String>,
    pub location: Option<Location>,
}

impl Movie {
    pub fn video_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Video)
    }

    pub fn audio_track(&self) -> Option<&Track> {
        self.tracks.iter().find(|t| t.kind == TrackKind::Audio)
    }
}

/// Parse the movie structure of an MP4/MOV source.
pub fn parse(reader: &mut Reader) -> Result<Movie> {
    let end = reader.size().ok_or_else(|| {
        MediaError::unsupported("MP4 parsing requires a source of known size")
    })?;

    let mut movie = None;
    let mut iter = BoxIter::new(reader, 0, end);
    loop {
        // Borrow dance: next_box borrows the iterator mutably
        let info = match iter.next_box()? {
            Some(info) => info,
            None => break,
        };
        if info.kind == b"moov" {
            movie = Some(info);
            break;
        }
    }
    let moov = movie.ok_or_else(|| MediaError::corrupt(end, "no moov box found"))?;
    debug!(offset = moov.offset, "parsing moov");
    parse_moov(reader, moov)
}

fn parse_moov(reader: &mut Reader, moov: BoxInfo) -> Result<Movie> {
    let mut movie = Movie::default();
    let children = collect_children(reader, moov)?;
    for child in children {
        match &child.kind.0 {
            b"mvhd" => {
                let (timescale, duration) = parse_mvhd(reader, child)?;
                movie.timescale = timescale;
                movie.duration_units = duration;
            }
            b"trak" => match parse_trak(reader, child, 1) {
                Ok(track) => movie.tracks.push(track),
                Err(e) if e.is_format_error() => {
                    // One unusable track should not hide the others
                    warn!("skipping unparseable track: {e}");
                }
                Err(e) => return Err(e),
            },
            b"udta" => parse_udta(reader, child, &mut movie)?,
            _ => {}
        }
    }
    if movie.tracks.is_empty() {
        return Err(MediaError::corrupt(
            moov.offset,
            "moov contains no parseable tracks",
        ));
    }
    Ok(movie)
}

fn collect_children(reader: &mut Reader, parent: BoxInfo) -> Result<Vec<BoxInfo>> {
    let mut children = Vec::new();
    let mut iter = BoxIter::new(reader, parent.payload_start, parent.payload_end);
    while let Some(child) = iter.next_box()? {
        children.push(child);
    }
    Ok(children)
}

fn read_leaf(reader: &mut Reader, info: BoxInfo) -> Result<Vec<u8>> {
    if info.payload_len() > MAX_LEAF_PAYLOAD {
        return Err(MediaError::corrupt(
            info.offset,
            format!("'{}' payload of {} bytes is implausible", info.kind, info.payload_len()),
        ));
    }
    reader.read_at(info.payload_start, info.payload_len() as usize)
}

/// Version/flags split shared by all full boxes: version 1 widens the time
/// fields to 64 bits.
fn parse_mvhd(reader: &mut Reader, info: BoxInfo) -> Result<(u32, u64)> {
    let payload = read_leaf(reader, info)?;
    match payload.first() {
        Some(0) if payload.len() >= 20 => Ok((
            BigEndian::read_u32(&payload[12..16]),
            BigEndian::read_u32(&payload[16..20]) as u64,
        )),
        Some(1) if payload.len() >= 32 => Ok((
            BigEndian::read_u32(&payload[20..24]),
            BigEndian::read_u64(&payload[24..32]),
        )),
        _ => Err(MediaError::corrupt(info.offset, "malformed mvhd")),
    }
}

fn parse_trak(reader: &mut Reader, trak: BoxInfo, depth: usize) -> Result<Track> {
    if depth > MAX_BOX_DEPTH {
        return Err(MediaError::corrupt(trak.offset, "box nesting too deep"));
    }

    let mut track = Track {
        kind: TrackKind::Other,
        codec: None,
        timescale: 0,
        duration_units: 0,
        width: None,
        height: None,
        matrix: crate::normalize::identity_matrix(),
        sample_rate: None,
        channels: None,
        avg_bitrate: None,
        sample_count: 0,
        hdr: None,
    };

    let children = collect_children(reader, trak)?;
    let mut saw_mdhd = false;
    for child in children {
        match &child.kind.0 {
            b"tkhd" => parse_tkhd(reader, child, &mut track)?,
            b"mdia" => {
                parse_mdia(reader, child, depth + 1, &mut track, &mut saw_mdhd)?;
            }
            _ => {}
        }
    }
    if !saw_mdhd {
        return Err(MediaError::corrupt(trak.offset, "track missing mdhd"));
    }
    Ok(track)
}

fn parse_tkhd(reader: &mut Reader, info: BoxInfo, track: &mut Track) -> Result<()> {
    let payload = read_leaf(reader, info)?;
    // Offset of the post-time fields depends on the version
    let rest = match payload.first() {
        Some(0) if payload.len() >= 84 => &payload[24..],
        Some(1) if payload.len() >= 96 => &payload[36..],
        _ => return Err(MediaError::corrupt(info.offset, "malformed tkhd")),
    };
    // rest: reserved[8], layer u16, alternate_group u16, volume u16,
    // reserved u16, matrix[36], width u32 (16.16), height u32 (16.16)
    for (i, slot) in track.matrix.iter_mut().enumerate() {
        *slot = BigEndian::read_u32(&rest[16 + i * 4..20 + i * 4]);
    }
    let width = BigEndian::read_u32(&rest[52..56]) >> 16;
    let height = BigEndian::read_u32(&rest[56..60]) >> 16;
    if width > 0 && height > 0 {
        track.width = Some(width);
        track.height = Some(height);
    }
    Ok(())
}

fn parse_mdia(
    reader: &mut Reader,
    mdia: BoxInfo,
    depth: usize,
    track: &mut Track,
    saw_mdhd: &mut bool,
) -> Result<()> {
    if depth > MAX_BOX_DEPTH {
        return Err(MediaError::corrupt(mdia.offset, "box nesting too deep"));
    }
    let children = collect_children(reader, mdia)?;
    for child in children {
        match &child.kind.0 {
            b"mdhd" => {
                let payload = read_leaf(reader, child)?;
                let (timescale, duration) = match payload.first() {
                    Some(0) if payload.len() >= 20 => (
                        BigEndian::read_u32(&payload[12..16]),
                        BigEndian::read_u32(&payload[16..20]) as u64,
                    ),
                    Some(1) if payload.len() >= 32 => (
                        BigEndian::read_u32(&payload[20..24]),
                        BigEndian::read_u64(&payload[24..32]),
                    ),
                    _ => return Err(MediaError::corrupt(child.offset, "malformed mdhd")),
                };
                track.timescale = timescale;
                track.duration_units = duration;
                *saw_mdhd = true;
            }
            b"hdlr" => {
                let payload = read_leaf(reader, child)?;
                if payload.len() >= 12 {
                    track.kind = match &payload[8..12] {
                        b"vide" => TrackKind::Video,
                        b"soun" => TrackKind::Audio,
                        _ => TrackKind::Other,
                    };
                }
            }
            b"minf" => parse_minf(reader, child, depth + 1, track)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_minf(reader: &mut Reader, minf: BoxInfo, depth: usize, track: &mut Track) -> Result<()> {
    if depth > MAX_BOX_DEPTH {
        return Err(MediaError::corrupt(minf.offset, "box nesting too deep"));
    }
    let children = collect_children(reader, minf)?;
    for child in children {
        if child.kind == b"stbl" {
            parse_stbl(reader, child, depth + 1, track)?;
        }
    }
    Ok(())
}

fn parse_stbl(reader: &mut Reader, stbl: BoxInfo, depth: usize, track: &mut Track) -> Result<()> {
    if depth > MAX_BOX_DEPTH {
        return Err(MediaError::corrupt(stbl.offset, "box nesting too deep"));
    }
    let children = collect_children(reader, stbl)?;
    for child in children {
        match &child.kind.0 {
            b"stsd" => parse_stsd(reader, child, track)?,
            b"stts" => track.sample_count = parse_stts(reader, child)?,
            _ => {}
        }
    }
    Ok(())
}

fn parse_stsd(reader: &mut Reader, stsd: BoxInfo, track: &mut Track) -> Result<()> {
    let payload = read_leaf(reader, stsd)?;
    if payload.len() < 8 {
        return Err(MediaError::corrupt(stsd.offset, "malformed stsd"));
    }
    let entry_count = BigEndian::read_u32(&payload[4..8]);
    if entry_count == 0 {
        return Ok(());
    }

    // Only the first (primary) sample entry informs the output record
    let entry = &payload[8..];
    if entry.len() < 8 {
        return Err(MediaError::corrupt(stsd.offset, "truncated sample entry"));
    }
    let entry_size = BigEndian::read_u32(&entry[0..4]) as usize;
    if entry_size < 8 || entry_size > entry.len() {
        return Err(MediaError::corrupt(stsd.offset, "sample entry size out of range"));
    }
    track.codec = Some(FourCC([entry[4], entry[5], entry[6], entry[7]]));
    let body = &entry[8..entry_size];

    match track.kind {
        TrackKind::Video => parse_visual_entry(body, stsd.offset, track),
        TrackKind::Audio => parse_audio_entry(body, stsd.offset, track),
        TrackKind::Other => Ok(()),
    }
}

/// VisualSampleEntry: 78 fixed bytes after the entry header, then child
/// boxes (avcC/hvcC, colr, btrt, pasp, ...).
fn parse_visual_entry(body: &[u8], offset: u64, track: &mut Track) -> Result<()> {
    if body.len() < 78 {
        return Err(MediaError::corrupt(offset, "truncated visual sample entry"));
    }
    // Prefer the coded dimensions when tkhd carried none
    let width = BigEndian::read_u16(&body[24..26]) as u32;
    let height = BigEndian::read_u16(&body[26..28]) as u32;
    if track.width.is_none() && width > 0 && height > 0 {
        track.width = Some(width);
        track.height = Some(height);
    }
    scan_entry_extensions(&body[78..], track);
    Ok(())
}

/// AudioSampleEntry: 28 fixed bytes after the entry header (QuickTime
/// version 1 inserts 16 more), then child boxes (esds, btrt, ...).
fn parse_audio_entry(body: &[u8], offset: u64, track: &mut Track) -> Result<()> {
    if body.len() < 28 {
        return Err(MediaError::corrupt(offset, "truncated audio sample entry"));
    }
    let qt_version = BigEndian::read_u16(&body[8..10]);
    track.channels = Some(BigEndian::read_u16(&body[16..18]) as u32);
    track.sample_rate = Some(BigEndian::read_u32(&body[24..28]) >> 16);

    let extension_start = if qt_version == 1 { 44 } else { 28 };
    if body.len() > extension_start {
        scan_entry_extensions(&body[extension_start..], track);
    }
    Ok(())
}

/// Walk the optional boxes trailing a sample entry. Malformed extension data
/// degrades the optional fields it feeds, never the track.
fn scan_entry_extensions(mut data: &[u8], track: &mut Track) {
    while data.len() >= 8 {
        let size = BigEndian::read_u32(&data[0..4]) as usize;
        if size < 8 || size > data.len() {
            return;
        }
        let kind = &data[4..8];
        let payload = &data[8..size];
        match kind {
            b"btrt" if payload.len() >= 12 => {
                track.avg_bitrate = Some(BigEndian::read_u32(&payload[8..12]));
            }
            b"colr" if payload.len() >= 10 => {
                // nclx (ISO) and nclc (QuickTime) share the leading layout
                if &payload[0..4] == b"nclx" || &payload[0..4] == b"nclc" {
                    let transfer = BigEndian::read_u16(&payload[6..8]);
                    track.hdr = Some(is_hdr_transfer(transfer));
                }
            }
            _ => {}
        }
        data = &data[size..];
    }
}

/// Sum of `stts` sample counts, streamed so a huge table does not buffer.
fn parse_stts(reader: &mut Reader, stts: BoxInfo) -> Result<u64> {
    let head = reader.read_at(stts.payload_start, 8)?;
    let entry_count = BigEndian::read_u32(&head[4..8]) as u64;
    if 8 + entry_count * 8 > stts.payload_len() {
        return Err(MediaError::corrupt(
            stts.offset,
            format!("stts declares {entry_count} entries beyond its payload"),
        ));
    }

    const CHUNK_ENTRIES: u64 = 1024;
    let mut total = 0u64;
    let mut remaining = entry_count;
    let mut offset = stts.payload_start + 8;
    while remaining > 0 {
        let batch = remaining.min(CHUNK_ENTRIES);
        let bytes = reader.read_at(offset, (batch * 8) as usize)?;
        for entry in bytes.chunks_exact(8) {
            total += BigEndian::read_u32(&entry[0..4]) as u64;
        }
        offset += batch * 8;
        remaining -= batch;
    }
    Ok(total)
}

fn parse_udta(reader: &mut Reader, udta: BoxInfo, movie: &mut Movie) -> Result<()> {
    let children = collect_children(reader, udta)?;
    for child in children {
        match &child.kind.0 {
            // QuickTime location atom: u16 size, u16 language, ISO 6709 text
            [0xA9, b'x', b'y', b'z'] => {
                let payload = read_leaf(reader, child)?;
                if payload.len() >= 4 {
                    let text_len = BigEndian::read_u16(&payload[0..2]) as usize;
                    let text = payload
                        .get(4..4 + text_len)
                        .map(String::from_utf8_lossy)
                        .unwrap_or_default();
                    movie.location = parse_iso6709(&text);
                }
            }
            b"meta" => {
                // meta is a full box: 4 bytes of version/flags before children
                if child.payload_len() >= 4 {
                    if let Err(e) = parse_meta_ilst(reader, child, movie) {
                        if e.is_format_error() {
                            warn!("dropping malformed meta box: {e}");
                        } else {
                            return Err(e);
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn parse_meta_ilst(reader: &mut Reader, meta: BoxInfo, movie: &mut Movie) -> Result<()> {
    let mut iter = BoxIter::new(reader, meta.payload_start + 4, meta.payload_end);
    let mut ilst = None;
    while let Some(child) = iter.next_box()? {
        if child.kind == b"ilst" {
            ilst = Some(child);
            break;
        }
    }
    let Some(ilst) = ilst else { return Ok(()) };

    let items = collect_children(reader, ilst)?;
    for item in items {
        let target = match &item.kind.0 {
            [0xA9, b'A', b'R', b'T'] => Slot::Artist,
            [0xA9, b'n', b'a', b'm'] => Slot::Title,
            [0xA9, b'a', b'l', b'b'] => Slot::Album,
            _ => continue,
        };
        if let Some(data) = crate::boxes::find_child(reader, item.payload_start, item.payload_end, b"data")? {
            let payload = read_leaf(reader, data)?;
            // data atom: u32 type indicator, u32 locale, then the value
            if payload.len() > 8 && BigEndian::read_u32(&payload[0..4]) & 0xFF == 1 {
                let text = String::from_utf8_lossy(&payload[8..]).into_owned();
                match target {
                    Slot::Artist => movie.artist = Some(text),
                    Slot::Title => movie.title = Some(text),
                    Slot::Album => movie.album = Some(text),
                }
            }
        }
    }
    Ok(())
}

enum Slot {
    Artist,
    Title,
    Album,
}
