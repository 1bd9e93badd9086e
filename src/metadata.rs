//! Content-sniffing media identification.
//!
//! [`SniffingIdentifier`] is the default [`MediaIdentifier`]. It never trusts the
//! file extension alone:
//!
//! 1. The `image` crate's content sniffing (`with_guessed_format`) recognizes
//!    every raster format the engine can decode.
//! 2. Magic bytes cover what the `image` crate does not: Photoshop (`8BPS`),
//!    PostScript (`%!PS`, DOS EPS binary header), PDF (`%PDF`; a `.ai`
//!    extension turns it into an Illustrator file, which is PDF inside), plus a
//!    handful of audio/video signatures so non-images get the right
//!    [`MediaKind`].
//! 3. The EXIF orientation tag, when present, becomes the rotation hint.
//!
//! Anything else is [`MediaKind::Unknown`] with `application/octet-stream`.

use crate::media::{IdentifyError, MediaIdentifier, MediaKind, Orientation, SourceMedia};
use image::ImageReader;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

const SNIFF_LEN: u64 = 32;
const DOS_EPS_MAGIC: [u8; 4] = [0xC5, 0xD0, 0xD3, 0xC6];

/// Identifies files by content using `image` + magic bytes, orientation via `kamadak-exif`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SniffingIdentifier;

impl SniffingIdentifier {
    pub fn new() -> Self {
        Self
    }
}

impl MediaIdentifier for SniffingIdentifier {
    fn identify(&self, path: &Path) -> Result<SourceMedia, IdentifyError> {
        let (mime, kind) = sniff(path)?;
        let orientation = if kind == MediaKind::Image {
            read_orientation(path)
        } else {
            Orientation::NONE
        };
        debug!(path = %path.display(), mime = %mime, ?kind, degrees = orientation.degrees(), "Identified");
        Ok(SourceMedia::new(path, mime, kind).with_orientation(orientation))
    }
}

fn sniff(path: &Path) -> Result<(String, MediaKind), IdentifyError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    if let Some(format) = reader.format() {
        return Ok((format.to_mime_type().to_string(), MediaKind::Image));
    }

    let mut head = Vec::new();
    File::open(path)?.take(SNIFF_LEN).read_to_end(&mut head)?;
    let has_ai_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ai"));

    let (mime, kind) = match_magic(&head, has_ai_extension);
    Ok((mime.to_string(), kind))
}

/// MIME and kind for signatures the `image` crate does not know.
fn match_magic(head: &[u8], has_ai_extension: bool) -> (&'static str, MediaKind) {
    if head.starts_with(b"8BPS") {
        ("image/vnd.adobe.photoshop", MediaKind::Image)
    } else if head.starts_with(b"%!PS") || head.starts_with(&DOS_EPS_MAGIC) {
        ("application/postscript", MediaKind::Image)
    } else if head.starts_with(b"%PDF") {
        if has_ai_extension {
            ("application/illustrator", MediaKind::Image)
        } else {
            ("application/pdf", MediaKind::Document)
        }
    } else if head.starts_with(b"ID3") || head.starts_with(b"fLaC") || head.starts_with(b"OggS") {
        ("audio/mpeg", MediaKind::Audio)
    } else if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"WAVE" {
        ("audio/wav", MediaKind::Audio)
    } else if head.len() >= 12 && &head[..4] == b"RIFF" && &head[8..12] == b"AVI " {
        ("video/x-msvideo", MediaKind::Video)
    } else if head.len() >= 8 && &head[4..8] == b"ftyp" {
        ("video/mp4", MediaKind::Video)
    } else {
        ("application/octet-stream", MediaKind::Unknown)
    }
}

/// EXIF orientation, or [`Orientation::NONE`] when the file carries none.
fn read_orientation(path: &Path) -> Orientation {
    let Ok(file) = File::open(path) else {
        return Orientation::NONE;
    };
    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => exif,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "No EXIF orientation");
            return Orientation::NONE;
        }
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .map(Orientation::from_exif)
        .unwrap_or(Orientation::NONE)
}
