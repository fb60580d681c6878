//! Public extraction entry points.
//!
//! Each operation is synchronous and all-or-nothing: sniff the container,
//! run the matching parser, normalize into [`MediaInfo`]. Optional
//! sub-structures (tags, GPS, EXIF) degrade to absent fields; a broken
//! mandatory structure fails the whole call.

use std::collections::HashMap;

use tracing::debug;

use crate::audio::{self, AudioMetadata};
use crate::cancel::CancelToken;
use crate::error::{MediaError, Result};
use crate::image;
use crate::mp4;
use crate::normalize::{
    aspect_ratio, codec_name, duration_seconds, is_16_9, orientation_from_matrix,
    overall_bitrate, MediaInfo, Orientation,
};
use crate::sniff::{sniff, ContainerFormat};
use crate::source::{Reader, Source};

/// Per-call extraction options.
#[derive(Default, Clone)]
pub struct ExtractOptions {
    /// Request headers for callers that resolve remote sources into a
    /// [`crate::ReadAt`] themselves. Ignored for local paths and buffers.
    pub headers: Option<HashMap<String, String>>,
    /// Cooperative cancellation, checked at every read boundary.
    pub cancel: CancelToken,
}

/// Extract metadata from a video container (MP4/MOV).
pub fn extract_video_info(source: Source, options: &ExtractOptions) -> Result<MediaInfo> {
    let mut reader = Reader::open(source, options.cancel.clone())?;
    let format = sniff(&mut reader)?;
    debug!(format = format.name(), "video extraction");
    if format != ContainerFormat::Mp4 {
        return Err(MediaError::unsupported(format!(
            "'{}' is not a supported video container",
            format.name()
        )));
    }

    let movie = mp4::parse(&mut reader)?;
    let file_size = reader.size().unwrap_or(0);

    let mut info = MediaInfo {
        file_size,
        duration: duration_seconds(movie.duration_units, movie.timescale),
        has_audio: Some(movie.audio_track().is_some()),
        artist: movie.artist.clone(),
        title: movie.title.clone(),
        album: movie.album.clone(),
        location: movie.location,
        ..Default::default()
    };

    let mut declared_bitrate = None;
    if let Some(video) = movie.video_track() {
        let duration = duration_seconds(video.duration_units, video.timescale);
        if duration > 0.0 {
            info.duration = duration;
        }
        info.codec = video.codec.map(codec_name);
        info.is_hdr = video.hdr;
        declared_bitrate = video.avg_bitrate;

        if let (Some(width), Some(height)) = (video.width, video.height) {
            info.width = Some(width);
            info.height = Some(height);
            let (displayed, natural) = orientation_from_matrix(&video.matrix, width, height);
            info.orientation = Some(displayed);
            info.natural_orientation = Some(natural);
            info.aspect_ratio = aspect_ratio(width, height);
            info.is_16_9 = Some(is_16_9(width, height));
        }
        if video.sample_count > 0 && info.duration > 0.0 {
            let fps = video.sample_count as f64 / info.duration;
            info.fps = Some((fps * 1000.0).round() / 1000.0);
        }
    }
    if let Some(audio) = movie.audio_track() {
        info.audio_codec = audio.codec.map(codec_name);
        info.audio_sample_rate = audio.sample_rate;
        info.audio_channels = audio.channels;
    }
    info.bit_rate = overall_bitrate(declared_bitrate, file_size, info.duration);
    Ok(info)
}

/// Extract metadata from an audio container (MP3, FLAC, Ogg, MP4 audio).
pub fn extract_audio_info(source: Source, options: &ExtractOptions) -> Result<MediaInfo> {
    let mut reader = Reader::open(source, options.cancel.clone())?;
    let format = sniff(&mut reader)?;
    debug!(format = format.name(), "audio extraction");
    let file_size = reader.size().unwrap_or(0);

    if format == ContainerFormat::Mp4 {
        return mp4_audio_info(&mut reader, file_size);
    }

    let meta = match format {
        ContainerFormat::Mp3 => audio::parse_mp3(&mut reader)?,
        ContainerFormat::Flac => audio::parse_flac(&mut reader)?,
        ContainerFormat::Ogg => audio::parse_ogg(&mut reader)?,
        other => {
            return Err(MediaError::unsupported(format!(
                "'{}' is not a supported audio container",
                other.name()
            )))
        }
    };
    Ok(audio_media_info(meta, file_size))
}

fn audio_media_info(meta: AudioMetadata, file_size: u64) -> MediaInfo {
    MediaInfo {
        file_size,
        duration: meta.duration,
        bit_rate: overall_bitrate(meta.bitrate, file_size, meta.duration),
        codec: Some(meta.codec.to_string()),
        sample_rate: meta.sample_rate,
        channels: meta.channels,
        artist: meta.artist,
        title: meta.title,
        album: meta.album,
        ..Default::default()
    }
}

/// M4A and other ISO BMFF audio files share the video container structure.
fn mp4_audio_info(reader: &mut Reader, file_size: u64) -> Result<MediaInfo> {
    let movie = mp4::parse(reader)?;
    let audio = movie
        .audio_track()
        .ok_or_else(|| MediaError::unsupported("MP4 container has no audio track"))?;

    let mut duration = duration_seconds(audio.duration_units, audio.timescale);
    if duration == 0.0 {
        duration = duration_seconds(movie.duration_units, movie.timescale);
    }
    Ok(MediaInfo {
        file_size,
        duration,
        bit_rate: overall_bitrate(audio.avg_bitrate, file_size, duration),
        codec: audio.codec.map(codec_name),
        sample_rate: audio.sample_rate,
        channels: audio.channels,
        artist: movie.artist.clone(),
        title: movie.title.clone(),
        album: movie.album.clone(),
        location: movie.location,
        ..Default::default()
    })
}

/// Extract metadata from a still image (JPEG, PNG, bare TIFF).
pub fn extract_image_info(source: Source, options: &ExtractOptions) -> Result<MediaInfo> {
    let mut reader = Reader::open(source, options.cancel.clone())?;
    let format = sniff(&mut reader)?;
    debug!(format = format.name(), "image extraction");

    let meta = match format {
        ContainerFormat::Jpeg => image::parse_jpeg(&mut reader)?,
        ContainerFormat::Png => image::parse_png(&mut reader)?,
        ContainerFormat::Tiff => image::parse_tiff(&mut reader)?,
        other => {
            return Err(MediaError::unsupported(format!(
                "'{}' is not a supported image format",
                other.name()
            )))
        }
    };

    let mut info = MediaInfo {
        file_size: reader.size().unwrap_or(0),
        format: Some(format.name().to_string()),
        width: meta.width,
        height: meta.height,
        ..Default::default()
    };
    // Unlike video there is no naturalOrientation here; the image record
    // carries a single orientation, from the EXIF tag when present and from
    // the pixel dimensions otherwise
    let from_dims = match (meta.width, meta.height) {
        (Some(width), Some(height)) if width > height => Orientation::LandscapeRight,
        _ => Orientation::Portrait,
    };
    if let (Some(width), Some(height)) = (meta.width, meta.height) {
        info.aspect_ratio = aspect_ratio(width, height);
        info.is_16_9 = Some(is_16_9(width, height));
    }

    if let Some(exif) = meta.exif {
        info.orientation = Some(
            exif.orientation()
                .map(Orientation::from_exif)
                .unwrap_or(from_dims),
        );
        info.location = exif.location();
        let tags = exif.tag_map();
        if !tags.is_empty() {
            info.exif = Some(tags);
        }
    } else {
        info.orientation = Some(from_dims);
    }
    Ok(info)
}
