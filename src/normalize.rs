//! Normalization of raw per-format fields into the uniform output record.
//!
//! Everything here is pure and deterministic: codec naming, rational-safe
//! duration, orientation classification, aspect-ratio math, HDR signalling.
//! No I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::boxes::FourCC;

/// Display orientation, matching the EXIF base rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeRight,
    LandscapeLeft,
}

impl Orientation {
    /// EXIF orientation tag (0x0112) mapping. Values outside the four base
    /// rotations (mirrored variants, absent tag) default to Portrait; that is
    /// the documented default, not an error.
    pub fn from_exif(value: u16) -> Self {
        match value {
            3 => Orientation::PortraitUpsideDown,
            6 => Orientation::LandscapeRight,
            8 => Orientation::LandscapeLeft,
            _ => Orientation::Portrait,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Portrait => "Portrait",
            Orientation::PortraitUpsideDown => "PortraitUpsideDown",
            Orientation::LandscapeRight => "LandscapeRight",
            Orientation::LandscapeLeft => "LandscapeLeft",
        }
    }
}

impl std::fmt::Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// GPS position in decimal degrees; altitude in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

/// The uniform metadata record returned by every extraction entry point.
///
/// Field names follow the wire schema (camelCase); fields that do not apply
/// to a media kind stay `None` and are omitted from serialized output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Duration in seconds, rounded to millisecond precision. 0 for images.
    pub duration: f64,
    /// Source size in bytes; 0 when unknown (unbounded remote stream).
    pub file_size: u64,
    /// Overall bit rate in bits per second; 0 when unknown.
    pub bit_rate: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_orientation: Option<Orientation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_audio: Option<bool>,
    /// HDR signalling: `Some(true)` for PQ/HLG transfer, `Some(false)` for an
    /// explicit SDR entry, `None` when the container carries no colour info.
    #[serde(rename = "isHDR", skip_serializing_if = "Option::is_none")]
    pub is_hdr: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(rename = "is16_9", skip_serializing_if = "Option::is_none")]
    pub is_16_9: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_codec: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    /// Image format string (jpeg, png, tiff).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// Duration in seconds from `(units, timescale)`, computed through millisecond
/// fixed point so long media do not accumulate float rounding drift.
pub fn duration_seconds(units: u64, timescale: u32) -> f64 {
    if timescale == 0 {
        return 0.0;
    }
    let timescale = timescale as u128;
    let millis = (units as u128 * 1000 + timescale / 2) / timescale;
    millis as f64 / 1000.0
}

pub fn aspect_ratio(width: u32, height: u32) -> Option<f64> {
    if height == 0 {
        return None;
    }
    Some(width as f64 / height as f64)
}

/// Tolerant 16:9 check. Stored dimensions are integers, so true 16:9 content
/// may not divide evenly (e.g. 1918x1080 after cropping); compare within 1%
/// relative tolerance instead of exact equality.
pub fn is_16_9(width: u32, height: u32) -> bool {
    if height == 0 {
        return false;
    }
    let target = 16.0 / 9.0;
    let ratio = width as f64 / height as f64;
    ((ratio - target) / target).abs() <= 0.01
}

/// Orientation pair `(displayed, natural)` from a `tkhd` transform matrix and
/// the coded dimensions.
///
/// The matrix rows are 16.16 fixed-point (last column 2.30, ignored here).
/// The four axis-aligned sign patterns of `[a b; c d]` identify the rotation;
/// anything else (skew, flips, arbitrary angles) falls back to the natural
/// classification rather than guessing an angle.
pub fn orientation_from_matrix(matrix: &[u32; 9], width: u32, height: u32) -> (Orientation, Orientation) {
    let natural = if height >= width {
        Orientation::Portrait
    } else {
        Orientation::LandscapeRight
    };

    let a = matrix[0] as i32;
    let b = matrix[1] as i32;
    let c = matrix[3] as i32;
    let d = matrix[4] as i32;

    let displayed = match (sign(a), sign(b), sign(c), sign(d)) {
        (1, 0, 0, 1) => Orientation::Portrait,             // 0 degrees
        (0, 1, -1, 0) => Orientation::LandscapeRight,      // 90 degrees
        (-1, 0, 0, -1) => Orientation::PortraitUpsideDown, // 180 degrees
        (0, -1, 1, 0) => Orientation::LandscapeLeft,       // 270 degrees
        _ => natural,
    };
    (displayed, natural)
}

fn sign(v: i32) -> i32 {
    match v {
        0 => 0,
        v if v > 0 => 1,
        _ => -1,
    }
}

/// Identity transform matrix in `tkhd` encoding.
pub fn identity_matrix() -> [u32; 9] {
    [0x0001_0000, 0, 0, 0, 0x0001_0000, 0, 0, 0, 0x4000_0000]
}

/// Rotation matrix in `tkhd` encoding, for fixtures.
#[cfg(test)]
pub fn rotation_matrix(degrees: u32) -> [u32; 9] {
    let one = 0x0001_0000u32;
    let neg_one = (-(one as i32)) as u32;
    let w = 0x4000_0000u32;
    match degrees % 360 {
        90 => [0, one, 0, neg_one, 0, 0, 0, 0, w],
        180 => [neg_one, 0, 0, 0, neg_one, 0, 0, 0, w],
        270 => [0, neg_one, 0, one, 0, 0, 0, 0, w],
        _ => identity_matrix(),
    }
}

/// Human-readable codec name for a sample entry fourCC.
pub fn codec_name(codec: FourCC) -> String {
    match &codec.0 {
        b"avc1" | b"avc3" => "h264".to_string(),
        b"hvc1" | b"hev1" => "hevc".to_string(),
        b"av01" => "av1".to_string(),
        b"vp08" => "vp8".to_string(),
        b"vp09" => "vp9".to_string(),
        b"mp4v" => "mpeg4".to_string(),
        b"jpeg" => "mjpeg".to_string(),
        b"mp4a" => "aac".to_string(),
        b"ac-3" => "ac3".to_string(),
        b"ec-3" => "eac3".to_string(),
        b"Opus" => "opus".to_string(),
        b"fLaC" => "flac".to_string(),
        b"alac" => "alac".to_string(),
        b".mp3" => "mp3".to_string(),
        b"lpcm" | b"sowt" | b"twos" => "pcm".to_string(),
        _ => codec.to_display().trim().to_string(),
    }
}

/// HDR classification from an nclx `colr` entry.
///
/// Transfer characteristics 16 (PQ) and 18 (HLG) are HDR; any other known
/// transfer is SDR.
pub fn is_hdr_transfer(transfer_characteristics: u16) -> bool {
    matches!(transfer_characteristics, 16 | 18)
}

/// Overall bit rate: the sample entry's declared average when present, else
/// derived from the source size and duration, else 0 (the schema's unknown).
pub fn overall_bitrate(declared_avg: Option<u32>, file_size: u64, duration: f64) -> u64 {
    if let Some(avg) = declared_avg {
        if avg > 0 {
            return avg as u64;
        }
    }
    if file_size > 0 && duration > 0.0 {
        return (file_size as f64 * 8.0 / duration) as u64;
    }
    0
}

/// Parse an ISO 6709 location string (`©xyz` tag), e.g. `+37.5090+127.0243/`
/// or `+48.8584+002.2945+035.000/`.
pub fn parse_iso6709(raw: &str) -> Option<Location> {
    let raw = raw.trim_end_matches('/');
    let mut fields = Vec::new();
    let mut start = None;
    for (i, ch) in raw.char_indices() {
        if ch == '+' || ch == '-' {
            if let Some(s) = start {
                fields.push(&raw[s..i]);
            }
            start = Some(i);
        }
    }
    if let Some(s) = start {
        fields.push(&raw[s..]);
    }
    if fields.len() < 2 {
        return None;
    }
    let latitude: f64 = fields[0].parse().ok()?;
    let longitude: f64 = fields[1].parse().ok()?;
    let altitude = fields.get(2).and_then(|f| f.parse().ok());
    Some(Location {
        latitude,
        longitude,
        altitude,
    })
}
