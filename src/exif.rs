//! EXIF/TIFF decoding, shared by the JPEG/PNG image path and bare TIFF files.
//!
//! Input is the TIFF payload (starting at the `II`/`MM` byte-order marker);
//! all directory offsets are relative to that base, not the file start. IFD0
//! is mandatory; the Exif sub-IFD (tag 0x8769) and GPS sub-IFD (tag 0x8825)
//! are optional and a corrupt sub-IFD degrades to absent rather than failing
//! the decode, since every field they feed is optional in the output.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use tracing::warn;

use crate::error::{MediaError, Result};
use crate::normalize::Location;

pub const TAG_ORIENTATION: u16 = 0x0112;
pub const TAG_EXIF_IFD: u16 = 0x8769;
pub const TAG_GPS_IFD: u16 = 0x8825;

const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_IMAGE_LENGTH: u16 = 0x0101;
const TAG_PIXEL_X_DIMENSION: u16 = 0xA002;
const TAG_PIXEL_Y_DIMENSION: u16 = 0xA003;

const GPS_LATITUDE_REF: u16 = 0x0001;
const GPS_LATITUDE: u16 = 0x0002;
const GPS_LONGITUDE_REF: u16 = 0x0003;
const GPS_LONGITUDE: u16 = 0x0004;
const GPS_ALTITUDE_REF: u16 = 0x0005;
const GPS_ALTITUDE: u16 = 0x0006;

/// Unsigned numerator/denominator pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            0.0
        } else {
            self.num as f64 / self.den as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExifValue {
    Byte(Vec<u8>),
    Ascii(String),
    Short(Vec<u16>),
    Long(Vec<u32>),
    Rational(Vec<Rational>),
    Undefined(Vec<u8>),
    SLong(Vec<i32>),
    SRational(Vec<(i32, i32)>),
}

impl ExifValue {
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            ExifValue::Short(v) => v.first().map(|&x| x as u32),
            ExifValue::Long(v) => v.first().copied(),
            ExifValue::Byte(v) => v.first().map(|&x| x as u32),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExifValue::Ascii(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_rationals(&self) -> Option<&[Rational]> {
        match self {
            ExifValue::Rational(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ExifValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn join<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, v: &[T]) -> std::fmt::Result {
            for (i, x) in v.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{x}")?;
            }
            Ok(())
        }
        match self {
            ExifValue::Ascii(s) => f.write_str(s),
            ExifValue::Byte(v) | ExifValue::Undefined(v) => join(f, v),
            ExifValue::Short(v) => join(f, v),
            ExifValue::Long(v) => join(f, v),
            ExifValue::SLong(v) => join(f, v),
            ExifValue::Rational(v) => {
                for (i, r) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}/{}", r.num, r.den)?;
                }
                Ok(())
            }
            ExifValue::SRational(v) => {
                for (i, (n, d)) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{n}/{d}")?;
                }
                Ok(())
            }
        }
    }
}

/// Decoded tag directories of one TIFF structure.
#[derive(Debug, Default, Clone)]
pub struct ExifDirectory {
    pub ifd0: BTreeMap<u16, ExifValue>,
    pub exif: BTreeMap<u16, ExifValue>,
    pub gps: Option<BTreeMap<u16, ExifValue>>,
}

impl ExifDirectory {
    fn tag(&self, id: u16) -> Option<&ExifValue> {
        self.ifd0.get(&id).or_else(|| self.exif.get(&id))
    }

    /// Raw EXIF orientation value (1..=8), if the tag is present.
    pub fn orientation(&self) -> Option<u16> {
        self.tag(TAG_ORIENTATION).and_then(|v| v.as_u32()).map(|v| v as u16)
    }

    /// Pixel dimensions from IFD0 or the Exif sub-IFD.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        let width = self
            .tag(TAG_IMAGE_WIDTH)
            .or_else(|| self.tag(TAG_PIXEL_X_DIMENSION))?
            .as_u32()?;
        let height = self
            .tag(TAG_IMAGE_LENGTH)
            .or_else(|| self.tag(TAG_PIXEL_Y_DIMENSION))?
            .as_u32()?;
        Some((width, height))
    }

    /// GPS position in signed decimal degrees, if a complete fix is stored.
    pub fn location(&self) -> Option<Location> {
        let gps = self.gps.as_ref()?;

        let lat = dms_to_degrees(gps.get(&GPS_LATITUDE)?.as_rationals()?)?;
        let lon = dms_to_degrees(gps.get(&GPS_LONGITUDE)?.as_rationals()?)?;
        let lat_ref = gps.get(&GPS_LATITUDE_REF).and_then(|v| v.as_str());
        let lon_ref = gps.get(&GPS_LONGITUDE_REF).and_then(|v| v.as_str());

        let latitude = if lat_ref == Some("S") { -lat } else { lat };
        let longitude = if lon_ref == Some("W") { -lon } else { lon };

        let altitude = gps
            .get(&GPS_ALTITUDE)
            .and_then(|v| v.as_rationals())
            .and_then(|r| r.first().copied())
            .map(|r| {
                // Ref 1 = below sea level
                let below = gps
                    .get(&GPS_ALTITUDE_REF)
                    .and_then(|v| v.as_u32())
                    .unwrap_or(0)
                    == 1;
                if below {
                    -r.to_f64()
                } else {
                    r.to_f64()
                }
            });

        Some(Location {
            latitude,
            longitude,
            altitude,
        })
    }

    /// Named key/value map of the recognized tags, for the open-ended `exif`
    /// output field.
    pub fn tag_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for directory in [&self.ifd0, &self.exif] {
            for (&tag, value) in directory {
                if let Some(name) = tag_name(tag) {
                    map.insert(name.to_string(), value.to_string());
                }
            }
        }
        map
    }
}

/// Degrees/minutes/seconds rational triple to decimal degrees.
fn dms_to_degrees(dms: &[Rational]) -> Option<f64> {
    if dms.len() < 3 {
        return None;
    }
    Some(dms[0].to_f64() + dms[1].to_f64() / 60.0 + dms[2].to_f64() / 3600.0)
}

fn tag_name(tag: u16) -> Option<&'static str> {
    Some(match tag {
        0x010F => "Make",
        0x0110 => "Model",
        0x0112 => "Orientation",
        0x0131 => "Software",
        0x0132 => "DateTime",
        0x829A => "ExposureTime",
        0x829D => "FNumber",
        0x8827 => "ISOSpeedRatings",
        0x9003 => "DateTimeOriginal",
        0x9201 => "ShutterSpeedValue",
        0x9202 => "ApertureValue",
        0x9203 => "BrightnessValue",
        0x920A => "FocalLength",
        0xA002 => "PixelXDimension",
        0xA003 => "PixelYDimension",
        _ => return None,
    })
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

struct Tiff<'a> {
    data: &'a [u8],
    endian: Endian,
}

impl<'a> Tiff<'a> {
    fn slice(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        self.data
            .get(offset..offset.checked_add(len).ok_or_else(|| {
                MediaError::corrupt(offset as u64, "TIFF offset overflow")
            })?)
            .ok_or_else(|| {
                MediaError::corrupt(
                    offset as u64,
                    format!("TIFF read of {len} bytes past end ({} total)", self.data.len()),
                )
            })
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let bytes = self.slice(offset, 2)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u16(bytes),
            Endian::Big => BigEndian::read_u16(bytes),
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let bytes = self.slice(offset, 4)?;
        Ok(match self.endian {
            Endian::Little => LittleEndian::read_u32(bytes),
            Endian::Big => BigEndian::read_u32(bytes),
        })
    }

    fn i32_at(&self, offset: usize) -> Result<i32> {
        Ok(self.u32_at(offset)? as i32)
    }
}

/// Decode a TIFF structure (byte-order header, IFD0, optional sub-IFDs).
pub fn decode(bytes: &[u8]) -> Result<ExifDirectory> {
    if bytes.len() < 8 {
        return Err(MediaError::corrupt(0, "TIFF header shorter than 8 bytes"));
    }
    let endian = match &bytes[0..2] {
        b"II" => Endian::Little,
        b"MM" => Endian::Big,
        _ => return Err(MediaError::corrupt(0, "bad TIFF byte-order marker")),
    };
    let tiff = Tiff { data: bytes, endian };

    if tiff.u16_at(2)? != 42 {
        return Err(MediaError::corrupt(2, "bad TIFF magic"));
    }
    let ifd0_offset = tiff.u32_at(4)? as usize;

    let ifd0 = parse_ifd(&tiff, ifd0_offset)?;
    let mut directory = ExifDirectory {
        ifd0,
        ..Default::default()
    };

    // Sub-IFDs feed optional fields only; corruption degrades them to absent.
    if let Some(offset) = directory.ifd0.get(&TAG_EXIF_IFD).and_then(|v| v.as_u32()) {
        match parse_ifd(&tiff, offset as usize) {
            Ok(exif) => directory.exif = exif,
            Err(e) => warn!("dropping corrupt Exif sub-IFD: {e}"),
        }
    }
    if let Some(offset) = directory.ifd0.get(&TAG_GPS_IFD).and_then(|v| v.as_u32()) {
        match parse_ifd(&tiff, offset as usize) {
            Ok(gps) => directory.gps = Some(gps),
            Err(e) => warn!("dropping corrupt GPS sub-IFD: {e}"),
        }
    }

    Ok(directory)
}

fn parse_ifd(tiff: &Tiff, offset: usize) -> Result<BTreeMap<u16, ExifValue>> {
    let count = tiff.u16_at(offset)? as usize;
    // 12 bytes per entry; an absurd count means a bogus offset landed here
    if count > 4096 {
        return Err(MediaError::corrupt(
            offset as u64,
            format!("IFD declares {count} entries"),
        ));
    }

    let mut entries = BTreeMap::new();
    for i in 0..count {
        let entry = offset + 2 + i * 12;
        let tag = tiff.u16_at(entry)?;
        let kind = tiff.u16_at(entry + 2)?;
        let value_count = tiff.u32_at(entry + 4)? as usize;

        let unit = match kind {
            1 | 2 | 6 | 7 => 1, // BYTE, ASCII, SBYTE, UNDEFINED
            3 | 8 => 2,         // SHORT, SSHORT
            4 | 9 | 11 => 4,    // LONG, SLONG, FLOAT
            5 | 10 | 12 => 8,   // RATIONAL, SRATIONAL, DOUBLE
            _ => continue,
        };
        let byte_len = value_count.checked_mul(unit).ok_or_else(|| {
            MediaError::corrupt(entry as u64, "tag value size overflow")
        })?;
        // Values wider than 4 bytes live elsewhere, addressed from the TIFF base
        let value_offset = if byte_len <= 4 {
            entry + 8
        } else {
            tiff.u32_at(entry + 8)? as usize
        };
        // The whole value range must exist before anything is sized from the
        // declared count; a hostile count must fail here, not at allocation
        tiff.slice(value_offset, byte_len)?;

        let value = match kind {
            1 | 6 => ExifValue::Byte(tiff.slice(value_offset, byte_len)?.to_vec()),
            7 => ExifValue::Undefined(tiff.slice(value_offset, byte_len)?.to_vec()),
            2 => {
                let raw = tiff.slice(value_offset, byte_len)?;
                let text = raw.split(|&b| b == 0).next().unwrap_or(&[]);
                ExifValue::Ascii(String::from_utf8_lossy(text).into_owned())
            }
            3 => {
                let mut v = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    v.push(tiff.u16_at(value_offset + j * 2)?);
                }
                ExifValue::Short(v)
            }
            4 => {
                let mut v = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    v.push(tiff.u32_at(value_offset + j * 4)?);
                }
                ExifValue::Long(v)
            }
            9 => {
                let mut v = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    v.push(tiff.i32_at(value_offset + j * 4)?);
                }
                ExifValue::SLong(v)
            }
            5 => {
                let mut v = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    v.push(Rational {
                        num: tiff.u32_at(value_offset + j * 8)?,
                        den: tiff.u32_at(value_offset + j * 8 + 4)?,
                    });
                }
                ExifValue::Rational(v)
            }
            10 => {
                let mut v = Vec::with_capacity(value_count);
                for j in 0..value_count {
                    v.push((
                        tiff.i32_at(value_offset + j * 8)?,
                        tiff.i32_at(value_offset + j * 8 + 4)?,
                    ));
                }
                ExifValue::SRational(v)
            }
            _ => continue,
        };
        entries.insert(tag, value);
    }
    Ok(entries)
}
