//! mediaprobe - direct media metadata extraction
//!
//! Parses container bytes natively (MP4/MOV boxes, ID3/MP3, FLAC, Ogg,
//! JPEG/PNG + EXIF) and normalizes the result into a uniform `MediaInfo`
//! record. No external tools, no OS media frameworks.

mod audio;
mod boxes;
mod cancel;
mod error;
mod exif;
mod extract;
mod image;
mod mp4;
mod normalize;
mod sniff;
mod source;
#[cfg(test)]
mod testutil;

pub use cancel::CancelToken;
pub use error::{MediaError, Result};
pub use extract::{extract_audio_info, extract_image_info, extract_video_info, ExtractOptions};
pub use normalize::{Location, MediaInfo, Orientation};
pub use sniff::{sniff_bytes, ContainerFormat};
pub use source::{ReadAt, Source};
