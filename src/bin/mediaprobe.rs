// mediaprobe - CLI media metadata inspector
// Sniffs a file, runs the matching extractor, prints the record as JSON.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use mediaprobe::{
    extract_audio_info, extract_image_info, extract_video_info, sniff_bytes, ContainerFormat,
    ExtractOptions, Source,
};

#[derive(Parser)]
#[command(name = "mediaprobe", version, about = "Direct media metadata inspector")]
struct Args {
    /// Media file to inspect
    path: PathBuf,

    /// Extraction kind; sniffed from the file's magic bytes when omitted
    #[arg(long, value_enum)]
    kind: Option<Kind>,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Video,
    Audio,
    Image,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let kind = match args.kind {
        Some(kind) => kind,
        None => sniff_kind(&args.path)?,
    };

    let options = ExtractOptions::default();
    let source = Source::Path(&args.path);
    let info = match kind {
        Kind::Video => extract_video_info(source, &options),
        Kind::Audio => extract_audio_info(source, &options),
        Kind::Image => extract_image_info(source, &options),
    }
    .with_context(|| format!("extraction failed for {}", args.path.display()))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&info)?
    } else {
        serde_json::to_string(&info)?
    };
    println!("{json}");
    Ok(())
}

fn sniff_kind(path: &PathBuf) -> Result<Kind> {
    let mut head = [0u8; 12];
    let mut file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    let read = file.read(&mut head)?;

    let format = sniff_bytes(&head[..read]);
    debug!(format = format.name(), "sniffed container");
    Ok(match format {
        ContainerFormat::Mp4 => Kind::Video,
        ContainerFormat::Mp3 | ContainerFormat::Flac | ContainerFormat::Ogg => Kind::Audio,
        ContainerFormat::Jpeg | ContainerFormat::Png | ContainerFormat::Tiff => Kind::Image,
        ContainerFormat::Unknown => bail!("unrecognized file format: {}", path.display()),
    })
}
