//! Hand-assembled container fixtures for the unit tests. Each builder emits
//! the minimal well-formed byte layout of its format, so tests exercise the
//! real decode paths without binary assets in the tree.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::exif::Rational;

// ---------------------------------------------------------------------------
// TIFF / EXIF
// ---------------------------------------------------------------------------

/// Encode decimal degrees as the DMS rational triple EXIF stores, plus the
/// hemisphere reference letter. Seconds keep 1e-4 precision, comfortably
/// inside the tests' 1e-6 degree tolerance.
fn degrees_to_dms(degrees: f64, positive_ref: char, negative_ref: char) -> ([Rational; 3], char) {
    let hemisphere = if degrees < 0.0 { negative_ref } else { positive_ref };
    let abs = degrees.abs();
    let d = abs.floor();
    let m = ((abs - d) * 60.0).floor();
    let s = (abs - d - m / 60.0) * 3600.0;
    (
        [
            Rational { num: d as u32, den: 1 },
            Rational { num: m as u32, den: 1 },
            Rational {
                num: (s * 10_000.0).round() as u32,
                den: 10_000,
            },
        ],
        hemisphere,
    )
}

const KIND_BYTE: u16 = 1;
const KIND_ASCII: u16 = 2;
const KIND_SHORT: u16 = 3;
const KIND_LONG: u16 = 4;
const KIND_RATIONAL: u16 = 5;

struct TiffEntry {
    tag: u16,
    kind: u16,
    count: u32,
    /// Endian-encoded value bytes; spilled after the table when wider than 4.
    payload: Vec<u8>,
}

pub struct TiffBuilder {
    little: bool,
    ifd0: Vec<TiffEntry>,
    gps: Vec<TiffEntry>,
}

impl TiffBuilder {
    pub fn little_endian() -> Self {
        Self {
            little: true,
            ifd0: Vec::new(),
            gps: Vec::new(),
        }
    }

    pub fn big_endian() -> Self {
        Self {
            little: false,
            ifd0: Vec::new(),
            gps: Vec::new(),
        }
    }

    fn put_u16(&self, out: &mut Vec<u8>, v: u16) {
        let mut buf = [0u8; 2];
        if self.little {
            LittleEndian::write_u16(&mut buf, v);
        } else {
            BigEndian::write_u16(&mut buf, v);
        }
        out.extend_from_slice(&buf);
    }

    fn put_u32(&self, out: &mut Vec<u8>, v: u32) {
        let mut buf = [0u8; 4];
        if self.little {
            LittleEndian::write_u32(&mut buf, v);
        } else {
            BigEndian::write_u32(&mut buf, v);
        }
        out.extend_from_slice(&buf);
    }

    pub fn ascii(mut self, tag: u16, text: &str) -> Self {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        self.ifd0.push(TiffEntry {
            tag,
            kind: KIND_ASCII,
            count: payload.len() as u32,
            payload,
        });
        self
    }

    pub fn short(mut self, tag: u16, value: u16) -> Self {
        let mut payload = Vec::new();
        self.put_u16(&mut payload, value);
        self.ifd0.push(TiffEntry {
            tag,
            kind: KIND_SHORT,
            count: 1,
            payload,
        });
        self
    }

    pub fn long(mut self, tag: u16, value: u32) -> Self {
        let mut payload = Vec::new();
        self.put_u32(&mut payload, value);
        self.ifd0.push(TiffEntry {
            tag,
            kind: KIND_LONG,
            count: 1,
            payload,
        });
        self
    }

    pub fn gps(mut self, latitude: f64, longitude: f64, altitude: Option<f64>) -> Self {
        let (lat_dms, lat_ref) = degrees_to_dms(latitude, 'N', 'S');
        let (lon_dms, lon_ref) = degrees_to_dms(longitude, 'E', 'W');

        let lat_payload = self.rationals(&lat_dms);
        let lon_payload = self.rationals(&lon_dms);

        self.gps.push(TiffEntry {
            tag: 0x0001,
            kind: KIND_ASCII,
            count: 2,
            payload: vec![lat_ref as u8, 0],
        });
        self.gps.push(TiffEntry {
            tag: 0x0002,
            kind: KIND_RATIONAL,
            count: 3,
            payload: lat_payload,
        });
        self.gps.push(TiffEntry {
            tag: 0x0003,
            kind: KIND_ASCII,
            count: 2,
            payload: vec![lon_ref as u8, 0],
        });
        self.gps.push(TiffEntry {
            tag: 0x0004,
            kind: KIND_RATIONAL,
            count: 3,
            payload: lon_payload,
        });
        if let Some(altitude) = altitude {
            self.gps.push(TiffEntry {
                tag: 0x0005,
                kind: KIND_BYTE,
                count: 1,
                payload: vec![u8::from(altitude < 0.0)],
            });
            let mut payload = Vec::new();
            self.put_u32(&mut payload, (altitude.abs() * 100.0).round() as u32);
            self.put_u32(&mut payload, 100);
            self.gps.push(TiffEntry {
                tag: 0x0006,
                kind: KIND_RATIONAL,
                count: 1,
                payload,
            });
        }
        self
    }

    fn rationals(&self, dms: &[Rational]) -> Vec<u8> {
        let mut payload = Vec::new();
        for r in dms {
            self.put_u32(&mut payload, r.num);
            self.put_u32(&mut payload, r.den);
        }
        payload
    }

    pub fn build(mut self) -> Vec<u8> {
        if !self.gps.is_empty() {
            // The GPS sub-IFD lands right after IFD0 and its spilled values
            let table_len = 2 + (self.ifd0.len() + 1) * 12 + 4;
            let spilled: usize = self
                .ifd0
                .iter()
                .filter(|e| e.payload.len() > 4)
                .map(|e| e.payload.len())
                .sum();
            let gps_offset = (8 + table_len + spilled) as u32;
            let mut payload = Vec::new();
            self.put_u32(&mut payload, gps_offset);
            self.ifd0.push(TiffEntry {
                tag: crate::exif::TAG_GPS_IFD,
                kind: KIND_LONG,
                count: 1,
                payload,
            });
        }

        let mut out = Vec::new();
        out.extend_from_slice(if self.little { b"II" } else { b"MM" });
        self.put_u16(&mut out, 42);
        self.put_u32(&mut out, 8);

        self.ifd0.sort_by_key(|e| e.tag);
        self.gps.sort_by_key(|e| e.tag);
        let gps = std::mem::take(&mut self.gps);
        let ifd0 = std::mem::take(&mut self.ifd0);
        self.emit_ifd(&mut out, &ifd0);
        if !gps.is_empty() {
            self.emit_ifd(&mut out, &gps);
        }
        out
    }

    fn emit_ifd(&self, out: &mut Vec<u8>, entries: &[TiffEntry]) {
        let start = out.len();
        let table_len = 2 + entries.len() * 12 + 4;
        let mut spill = Vec::new();

        self.put_u16(out, entries.len() as u16);
        for entry in entries {
            self.put_u16(out, entry.tag);
            self.put_u16(out, entry.kind);
            self.put_u32(out, entry.count);
            if entry.payload.len() <= 4 {
                let mut inline = entry.payload.clone();
                inline.resize(4, 0);
                out.extend_from_slice(&inline);
            } else {
                self.put_u32(out, (start + table_len + spill.len()) as u32);
                spill.extend_from_slice(&entry.payload);
            }
        }
        self.put_u32(out, 0); // no next IFD
        out.extend_from_slice(&spill);
    }
}

// ---------------------------------------------------------------------------
// MP4
// ---------------------------------------------------------------------------

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + payload.len());
    out.extend_from_slice(&((payload.len() as u32 + 8).to_be_bytes()));
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

#[derive(Default)]
pub struct Mp4Builder {
    traks: Vec<Vec<u8>>,
    udta_children: Vec<Vec<u8>>,
    tags: Option<(String, String, String)>,
}

impl Mp4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn video_track(
        mut self,
        width: u32,
        height: u32,
        matrix: [u32; 9],
        timescale: u32,
        duration_units: u64,
        sample_count: u32,
    ) -> Self {
        let entry = visual_entry(b"avc1", width as u16, height as u16, &[]);
        self.traks.push(trak(
            b"vide",
            Some((width, height, matrix)),
            timescale,
            duration_units,
            sample_count,
            &entry,
        ));
        self
    }

    pub fn video_track_with_colr(mut self, width: u32, height: u32, transfer: u16) -> Self {
        let mut colr_payload = Vec::new();
        colr_payload.extend_from_slice(b"nclx");
        colr_payload.extend_from_slice(&9u16.to_be_bytes()); // primaries
        colr_payload.extend_from_slice(&transfer.to_be_bytes());
        colr_payload.extend_from_slice(&9u16.to_be_bytes()); // matrix coefficients
        colr_payload.push(0x80); // full range flag
        let colr = mp4_box(b"colr", &colr_payload);

        let entry = visual_entry(b"hvc1", width as u16, height as u16, &colr);
        self.traks.push(trak(
            b"vide",
            Some((width, height, crate::normalize::identity_matrix())),
            90_000,
            90_000,
            30,
            &entry,
        ));
        self
    }

    pub fn audio_track(
        mut self,
        sample_rate: u32,
        channels: u16,
        duration_units: u64,
        avg_bitrate: u32,
    ) -> Self {
        let mut extensions = Vec::new();
        if avg_bitrate > 0 {
            let mut btrt = Vec::new();
            btrt.extend_from_slice(&0u32.to_be_bytes()); // buffer size
            btrt.extend_from_slice(&avg_bitrate.to_be_bytes()); // max bitrate
            btrt.extend_from_slice(&avg_bitrate.to_be_bytes()); // average bitrate
            extensions = mp4_box(b"btrt", &btrt);
        }
        let entry = audio_entry(b"mp4a", channels, sample_rate, &extensions);
        self.traks.push(trak(
            b"soun",
            None,
            sample_rate,
            duration_units,
            duration_units as u32 / 1024,
            &entry,
        ));
        self
    }

    pub fn tags(mut self, artist: &str, title: &str, album: &str) -> Self {
        self.tags = Some((artist.to_string(), title.to_string(), album.to_string()));
        self
    }

    pub fn location(mut self, latitude: f64, longitude: f64) -> Self {
        let text = format!("{latitude:+.4}{longitude:+.4}/");
        let mut payload = Vec::new();
        payload.extend_from_slice(&(text.len() as u16).to_be_bytes());
        payload.extend_from_slice(&0x15C7u16.to_be_bytes()); // language code
        payload.extend_from_slice(text.as_bytes());
        self.udta_children
            .push(mp4_box(&[0xA9, b'x', b'y', b'z'], &payload));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut moov_payload = Vec::new();

        let mut mvhd = Vec::new();
        mvhd.extend_from_slice(&[0u8; 12]); // version/flags, creation, modification
        mvhd.extend_from_slice(&1000u32.to_be_bytes()); // timescale
        mvhd.extend_from_slice(&0u32.to_be_bytes()); // duration
        moov_payload.extend(mp4_box(b"mvhd", &mvhd));

        for trak in &self.traks {
            moov_payload.extend_from_slice(trak);
        }

        let mut udta_children = self.udta_children;
        if let Some((artist, title, album)) = &self.tags {
            let mut ilst = Vec::new();
            for (kind, text) in [
                ([0xA9, b'A', b'R', b'T'], artist),
                ([0xA9, b'n', b'a', b'm'], title),
                ([0xA9, b'a', b'l', b'b'], album),
            ] {
                let mut data = Vec::new();
                data.extend_from_slice(&1u32.to_be_bytes()); // UTF-8 type indicator
                data.extend_from_slice(&0u32.to_be_bytes()); // locale
                data.extend_from_slice(text.as_bytes());
                ilst.extend(mp4_box(&kind, &mp4_box(b"data", &data)));
            }
            let mut meta = vec![0u8; 4]; // full-box version/flags
            meta.extend(mp4_box(b"ilst", &ilst));
            udta_children.push(mp4_box(b"meta", &meta));
        }
        if !udta_children.is_empty() {
            moov_payload.extend(mp4_box(b"udta", &udta_children.concat()));
        }

        let mut out = mp4_box(b"ftyp", b"isom\x00\x00\x00\x00isommp41");
        out.extend(mp4_box(b"moov", &moov_payload));
        out
    }
}

fn trak(
    handler: &[u8; 4],
    dims: Option<(u32, u32, [u32; 9])>,
    timescale: u32,
    duration_units: u64,
    sample_count: u32,
    sample_entry: &[u8],
) -> Vec<u8> {
    let mut trak_payload = Vec::new();

    if let Some((width, height, matrix)) = dims {
        let mut tkhd = Vec::new();
        tkhd.extend_from_slice(&[0, 0, 0, 7]); // version 0, enabled flags
        tkhd.extend_from_slice(&[0u8; 8]); // creation, modification
        tkhd.extend_from_slice(&1u32.to_be_bytes()); // track id
        tkhd.extend_from_slice(&[0u8; 4]); // reserved
        tkhd.extend_from_slice(&(duration_units as u32).to_be_bytes());
        tkhd.extend_from_slice(&[0u8; 16]); // reserved, layer, group, volume
        for word in matrix {
            tkhd.extend_from_slice(&word.to_be_bytes());
        }
        tkhd.extend_from_slice(&(width << 16).to_be_bytes());
        tkhd.extend_from_slice(&(height << 16).to_be_bytes());
        trak_payload.extend(mp4_box(b"tkhd", &tkhd));
    }

    let mut mdhd = Vec::new();
    mdhd.extend_from_slice(&[0u8; 12]); // version/flags, creation, modification
    mdhd.extend_from_slice(&timescale.to_be_bytes());
    mdhd.extend_from_slice(&(duration_units as u32).to_be_bytes());
    mdhd.extend_from_slice(&[0x55, 0xC4, 0, 0]); // language "und", quality

    let mut hdlr = Vec::new();
    hdlr.extend_from_slice(&[0u8; 8]); // version/flags, predefined
    hdlr.extend_from_slice(handler);
    hdlr.extend_from_slice(&[0u8; 13]); // reserved, empty name

    let mut stsd = Vec::new();
    stsd.extend_from_slice(&[0u8; 4]);
    stsd.extend_from_slice(&1u32.to_be_bytes());
    stsd.extend_from_slice(sample_entry);

    let mut stts = Vec::new();
    stts.extend_from_slice(&[0u8; 4]);
    stts.extend_from_slice(&1u32.to_be_bytes());
    stts.extend_from_slice(&sample_count.to_be_bytes());
    let delta = if sample_count > 0 {
        duration_units as u32 / sample_count
    } else {
        0
    };
    stts.extend_from_slice(&delta.to_be_bytes());

    let mut stbl = mp4_box(b"stsd", &stsd);
    stbl.extend(mp4_box(b"stts", &stts));
    let minf = mp4_box(b"stbl", &stbl);

    let mut mdia = mp4_box(b"mdhd", &mdhd);
    mdia.extend(mp4_box(b"hdlr", &hdlr));
    mdia.extend(mp4_box(b"minf", &minf));

    trak_payload.extend(mp4_box(b"mdia", &mdia));
    mp4_box(b"trak", &trak_payload)
}

fn visual_entry(codec: &[u8; 4], width: u16, height: u16, extensions: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]); // reserved
    body.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    body.extend_from_slice(&[0u8; 16]); // predefined and reserved
    body.extend_from_slice(&width.to_be_bytes());
    body.extend_from_slice(&height.to_be_bytes());
    body.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // horizontal dpi
    body.extend_from_slice(&0x0048_0000u32.to_be_bytes()); // vertical dpi
    body.extend_from_slice(&[0u8; 4]); // reserved
    body.extend_from_slice(&1u16.to_be_bytes()); // frame count
    body.extend_from_slice(&[0u8; 32]); // compressor name
    body.extend_from_slice(&24u16.to_be_bytes()); // depth
    body.extend_from_slice(&0xFFFFu16.to_be_bytes()); // predefined
    body.extend_from_slice(extensions);

    let mut entry = Vec::new();
    entry.extend_from_slice(&((body.len() as u32 + 8).to_be_bytes()));
    entry.extend_from_slice(codec);
    entry.extend_from_slice(&body);
    entry
}

fn audio_entry(codec: &[u8; 4], channels: u16, sample_rate: u32, extensions: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&[0u8; 6]); // reserved
    body.extend_from_slice(&1u16.to_be_bytes()); // data reference index
    body.extend_from_slice(&[0u8; 8]); // version, revision, vendor
    body.extend_from_slice(&channels.to_be_bytes());
    body.extend_from_slice(&16u16.to_be_bytes()); // sample size
    body.extend_from_slice(&[0u8; 4]); // predefined, reserved
    body.extend_from_slice(&(sample_rate << 16).to_be_bytes());
    body.extend_from_slice(extensions);

    let mut entry = Vec::new();
    entry.extend_from_slice(&((body.len() as u32 + 8).to_be_bytes()));
    entry.extend_from_slice(codec);
    entry.extend_from_slice(&body);
    entry
}

// ---------------------------------------------------------------------------
// MP3 / FLAC / Ogg
// ---------------------------------------------------------------------------

pub fn mp3_fixture(artist: &str, title: &str, album: &str) -> Vec<u8> {
    let mut frames = Vec::new();
    for (id, text) in [(b"TPE1", artist), (b"TIT2", title), (b"TALB", album)] {
        let mut body = vec![3u8]; // UTF-8 encoding
        body.extend_from_slice(text.as_bytes());
        frames.extend_from_slice(id);
        frames.extend_from_slice(&syncsafe(body.len() as u32));
        frames.extend_from_slice(&[0, 0]); // frame flags
        frames.extend_from_slice(&body);
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"ID3\x04\x00\x00");
    out.extend_from_slice(&syncsafe(frames.len() as u32));
    out.extend_from_slice(&frames);

    // MPEG1 Layer III, 128 kbps, 44.1 kHz, stereo, followed by frame data
    out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
    out.extend_from_slice(&[0u8; 8000]);
    out
}

fn syncsafe(value: u32) -> [u8; 4] {
    [
        ((value >> 21) & 0x7F) as u8,
        ((value >> 14) & 0x7F) as u8,
        ((value >> 7) & 0x7F) as u8,
        (value & 0x7F) as u8,
    ]
}

pub fn flac_fixture(
    sample_rate: u32,
    channels: u32,
    total_samples: u64,
    tags: Option<(&str, &str, &str)>,
) -> Vec<u8> {
    let mut streaminfo = Vec::new();
    streaminfo.extend_from_slice(&4608u16.to_be_bytes()); // min block size
    streaminfo.extend_from_slice(&4608u16.to_be_bytes()); // max block size
    streaminfo.extend_from_slice(&[0u8; 6]); // frame size bounds
    let bps = 16u32;
    streaminfo.push((sample_rate >> 12) as u8);
    streaminfo.push((sample_rate >> 4) as u8);
    streaminfo.push((((sample_rate & 0xF) << 4) | ((channels - 1) << 1) | ((bps - 1) >> 4)) as u8);
    streaminfo.push(((((bps - 1) & 0xF) << 4) as u8) | ((total_samples >> 32) & 0xF) as u8);
    streaminfo.extend_from_slice(&(total_samples as u32).to_be_bytes());
    streaminfo.extend_from_slice(&[0u8; 16]); // md5

    let mut out = b"fLaC".to_vec();
    let last_flag = if tags.is_some() { 0x00 } else { 0x80 };
    out.push(last_flag); // block type 0: STREAMINFO
    out.extend_from_slice(&[0, 0, 34]);
    out.extend_from_slice(&streaminfo);

    if let Some((artist, title, album)) = tags {
        let comments = vorbis_comment_block(artist, title, album);
        out.push(0x84); // last block, type 4: VORBIS_COMMENT
        out.push(0);
        out.push((comments.len() >> 8) as u8);
        out.push(comments.len() as u8);
        out.extend_from_slice(&comments);
    }
    out
}

fn vorbis_comment_block(artist: &str, title: &str, album: &str) -> Vec<u8> {
    let vendor = b"fixture";
    let mut out = Vec::new();
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor);
    out.extend_from_slice(&3u32.to_le_bytes());
    for (key, value) in [("ARTIST", artist), ("TITLE", title), ("ALBUM", album)] {
        let entry = format!("{key}={value}");
        out.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        out.extend_from_slice(entry.as_bytes());
    }
    out
}

pub fn ogg_vorbis_fixture(
    sample_rate: u32,
    channels: u32,
    granule: u64,
    tags: Option<(&str, &str, &str)>,
) -> Vec<u8> {
    let mut ident = Vec::new();
    ident.extend_from_slice(b"\x01vorbis");
    ident.extend_from_slice(&0u32.to_le_bytes()); // vorbis version
    ident.push(channels as u8);
    ident.extend_from_slice(&sample_rate.to_le_bytes());
    ident.extend_from_slice(&0i32.to_le_bytes()); // max bitrate
    ident.extend_from_slice(&112_000i32.to_le_bytes()); // nominal bitrate
    ident.extend_from_slice(&0i32.to_le_bytes()); // min bitrate
    ident.push(0xB8); // blocksizes
    ident.push(1); // framing

    let mut out = ogg_page(0x02, 0, 0, &ident);

    if let Some((artist, title, album)) = tags {
        let mut comment = b"\x03vorbis".to_vec();
        comment.extend_from_slice(&vorbis_comment_block(artist, title, album));
        comment.push(1); // framing
        out.extend(ogg_page(0x00, 0, 1, &comment));
    }

    // Final page carries the total-samples granule position
    out.extend(ogg_page(0x04, granule, 2, &[0u8; 10]));
    out
}

fn ogg_page(header_type: u8, granule: u64, sequence: u32, payload: &[u8]) -> Vec<u8> {
    assert!(payload.len() < 255, "single-segment fixture pages only");
    let mut out = Vec::new();
    out.extend_from_slice(b"OggS");
    out.push(0); // stream structure version
    out.push(header_type);
    out.extend_from_slice(&granule.to_le_bytes());
    out.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes()); // serial
    out.extend_from_slice(&sequence.to_le_bytes());
    out.extend_from_slice(&[0u8; 4]); // crc, unchecked by the parser
    out.push(1);
    out.push(payload.len() as u8);
    out.extend_from_slice(payload);
    out
}

// ---------------------------------------------------------------------------
// JPEG / PNG
// ---------------------------------------------------------------------------

pub fn jpeg_fixture(width: u16, height: u16, exif: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8]; // SOI

    if let Some(tiff) = exif {
        let mut app1 = b"Exif\x00\x00".to_vec();
        app1.extend_from_slice(tiff);
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&((app1.len() as u16 + 2).to_be_bytes()));
        out.extend_from_slice(&app1);
    }

    // SOF0: precision, height, width, one grey component
    out.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 0x08]);
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);

    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x02]); // SOS
    out.extend_from_slice(&[0u8; 64]); // entropy-coded noise
    out.extend_from_slice(&[0xFF, 0xD9]); // EOI
    out
}

pub fn png_fixture(width: u32, height: u32, exif: Option<&[u8]>) -> Vec<u8> {
    let mut out = b"\x89PNG\r\n\x1a\n".to_vec();

    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&[8, 6, 0, 0, 0]); // 8-bit RGBA
    png_chunk(&mut out, b"IHDR", &ihdr);

    if let Some(tiff) = exif {
        png_chunk(&mut out, b"eXIf", tiff);
    }
    png_chunk(&mut out, b"IDAT", &[0u8; 32]);
    png_chunk(&mut out, b"IEND", &[]);
    out
}

fn png_chunk(out: &mut Vec<u8>, kind: &[u8; 4], payload: &[u8]) {
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out.extend_from_slice(&[0u8; 4]); // crc, unchecked by the parser
}
