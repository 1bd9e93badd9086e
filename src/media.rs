//! Source media handles and the identification contract.
//!
//! A [`SourceMedia`] is what the pipeline works on: a path plus everything a
//! format-sniffing service knows about it. The normalizer never mutates a handle;
//! when it produces a better working file it asks a [`MediaIdentifier`] for a new
//! handle and swaps it in.
//!
//! MIME strings are resolved once, into the closed [`FormatTag`] set, so the
//! normalizer dispatches on a tag instead of re-matching strings.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot identify {path}: {reason}")]
    Unidentifiable { path: PathBuf, reason: String },
}

/// Broad media family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
    Unknown,
}

/// Recognized formats. Anything else is [`FormatTag::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatTag {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    WebP,
    Avif,
    Photoshop,
    Illustrator,
    PostScript,
    Pdf,
    Other,
}

impl FormatTag {
    /// Resolve a MIME type. Matching is case-insensitive and ignores parameters.
    ///
    /// ```
    /// use image_transmuter::media::FormatTag;
    ///
    /// assert_eq!(FormatTag::from_mime("image/vnd.adobe.photoshop"), FormatTag::Photoshop);
    /// assert_eq!(FormatTag::from_mime("Application/X-Photoshop"), FormatTag::Photoshop);
    /// assert_eq!(FormatTag::from_mime("image/tiff"), FormatTag::Tiff);
    /// assert_eq!(FormatTag::from_mime("text/photoshop"), FormatTag::Other);
    /// ```
    pub fn from_mime(mime: &str) -> Self {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        let Some((top, sub)) = essence.split_once('/') else {
            return FormatTag::Other;
        };

        let image_or_app = top == "image" || top == "application";
        if image_or_app && (sub.contains("photoshop") || sub == "psd" || sub == "x-psd") {
            return FormatTag::Photoshop;
        }

        match (top, sub) {
            ("image", "jpeg" | "jpg" | "pjpeg") => FormatTag::Jpeg,
            ("image", "png") => FormatTag::Png,
            ("image", "gif") => FormatTag::Gif,
            ("image", "bmp" | "x-ms-bmp") => FormatTag::Bmp,
            ("image", "tiff" | "tiff-fx") => FormatTag::Tiff,
            ("image", "webp") => FormatTag::WebP,
            ("image", "avif") => FormatTag::Avif,
            ("application", "illustrator") => FormatTag::Illustrator,
            ("application", "postscript") | ("image", "x-eps" | "eps") => FormatTag::PostScript,
            ("application", "pdf") => FormatTag::Pdf,
            _ => FormatTag::Other,
        }
    }

    /// Formats that need rasterizing before the raster engine can open them.
    pub fn is_vector(self) -> bool {
        matches!(self, FormatTag::Illustrator | FormatTag::PostScript)
    }

    /// Containers that may carry several independently sized layers.
    pub fn is_multi_layer(self) -> bool {
        matches!(self, FormatTag::Tiff)
    }

    /// Layered editing-tool documents, flattened to their first layer.
    pub fn is_layered_document(self) -> bool {
        matches!(self, FormatTag::Photoshop)
    }

    /// Canonical file extension, without the dot.
    ///
    /// Used for intermediate files, so the engine picks the encoder from the
    /// format rather than from whatever name the caller's file had.
    ///
    /// ```
    /// use image_transmuter::media::FormatTag;
    ///
    /// assert_eq!(FormatTag::Tiff.extension(), Some("tif"));
    /// assert_eq!(FormatTag::Other.extension(), None);
    /// ```
    pub fn extension(self) -> Option<&'static str> {
        Some(match self {
            FormatTag::Jpeg => "jpg",
            FormatTag::Png => "png",
            FormatTag::Gif => "gif",
            FormatTag::Bmp => "bmp",
            FormatTag::Tiff => "tif",
            FormatTag::WebP => "webp",
            FormatTag::Avif => "avif",
            FormatTag::Photoshop => "psd",
            FormatTag::Illustrator => "ai",
            FormatTag::PostScript => "eps",
            FormatTag::Pdf => "pdf",
            FormatTag::Other => return None,
        })
    }
}

/// Rotation hint read from embedded metadata, in clockwise degrees.
///
/// Built from the EXIF orientation tag. The mirrored variants (2, 4, 5, 7) map to
/// the rotation of their unmirrored counterpart; flips are not applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Orientation(u16);

impl Orientation {
    pub const NONE: Orientation = Orientation(0);

    pub fn from_exif(value: u32) -> Self {
        match value {
            3 | 4 => Orientation(180),
            5 | 6 => Orientation(90),
            7 | 8 => Orientation(270),
            _ => Orientation(0),
        }
    }

    pub fn from_degrees(degrees: u16) -> Self {
        Orientation(degrees % 360)
    }

    pub fn degrees(self) -> i32 {
        i32::from(self.0)
    }
}

/// An identified input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMedia {
    path: PathBuf,
    mime_type: String,
    format: FormatTag,
    kind: MediaKind,
    orientation: Orientation,
}

impl SourceMedia {
    /// Build a handle; the format tag is derived from `mime_type`.
    pub fn new(path: impl Into<PathBuf>, mime_type: impl Into<String>, kind: MediaKind) -> Self {
        let mime_type = mime_type.into();
        Self {
            path: path.into(),
            format: FormatTag::from_mime(&mime_type),
            mime_type,
            kind,
            orientation: Orientation::NONE,
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn format(&self) -> FormatTag {
        self.format
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

/// Format-sniffing / metadata service.
pub trait MediaIdentifier: Send + Sync {
    /// Identify the file at `path`.
    fn identify(&self, path: &Path) -> Result<SourceMedia, IdentifyError>;
}
