//! Format normalization.
//!
//! Turns whatever the caller handed in into a source the raster engine opens as
//! one flat image. The first matching rule wins:
//!
//! | Rule | Trigger | Result |
//! |------|---------|--------|
//! | Embedded preview | `look_for_embedded_preview` | largest extracted preview file |
//! | Vector | Illustrator / PostScript | first page rasterized to PNG |
//! | Multi-layer container | TIFF | largest-area layer(s), merged, first kept |
//! | Layered document | Photoshop | first layer as JPEG |
//!
//! Best-effort steps fall back to the current source instead of failing: no
//! preview extracted, a converter run that leaves no output, a merge that fails.
//! Every artifact lands in the call's temporary scope; the caller cleans it.

use crate::config::TransmuterConfig;
use crate::error::{Result, Subsystem, Within};
use crate::imaging::{LayerId, RasterEngine, RasterImage};
use crate::media::{MediaIdentifier, MediaKind, SourceMedia};
use crate::preview::{PreviewExtractor, select_largest};
use crate::temp::TemporaryStorage;
use crate::transmuter::Stage;
use crate::vector::VectorRasterizer;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

const STAGE: Stage = Stage::Normalizing;

/// Runs the normalization rules against borrowed collaborators.
pub struct Normalizer<'a> {
    pub config: &'a TransmuterConfig,
    pub engine: &'a dyn RasterEngine,
    pub identifier: &'a dyn MediaIdentifier,
    pub rasterizer: &'a dyn VectorRasterizer,
    pub previews: &'a dyn PreviewExtractor,
    pub temp: &'a dyn TemporaryStorage,
}

impl Normalizer<'_> {
    /// Produce the working source for `source`, creating artifacts under `scope`.
    ///
    /// Returns a clone of `source` when no rule replaces it.
    pub fn normalize(&self, source: &SourceMedia, scope: &str) -> Result<SourceMedia> {
        if self.config.look_for_embedded_preview {
            if let Some(preview) = self.embedded_preview(source, scope)? {
                return Ok(preview);
            }
        }

        let format = source.format();
        if format.is_vector() {
            Ok(self
                .rasterize(source, scope)?
                .unwrap_or_else(|| source.clone()))
        } else if format.is_multi_layer() {
            self.flatten_layers(source, scope)
        } else if format.is_layered_document() {
            Ok(self
                .first_layer(source, scope)?
                .unwrap_or_else(|| source.clone()))
        } else {
            Ok(source.clone())
        }
    }

    fn identify(&self, path: &Path) -> Result<SourceMedia> {
        self.identifier
            .identify(path)
            .within(Subsystem::MetadataService, STAGE)
    }

    fn open(&self, source: &SourceMedia) -> Result<Box<dyn RasterImage>> {
        self.engine
            .open(source.path())
            .within(Subsystem::RasterEngine, STAGE)
    }

    /// Largest embedded preview, if the extractor found any that identifies as an image.
    fn embedded_preview(&self, source: &SourceMedia, scope: &str) -> Result<Option<SourceMedia>> {
        let dir = self
            .temp
            .create_temporary_directory(
                self.config.temporary.directory_mode,
                self.config.temporary.directory_ttl(),
                scope,
            )
            .within(Subsystem::TemporaryStorage, STAGE)?;

        let entries = self
            .previews
            .extract(source.path(), &dir)
            .within(Subsystem::PreviewExtractor, STAGE)?;

        let Some(candidate) = select_largest(&entries) else {
            debug!(source = %source.path().display(), "No embedded preview");
            return Ok(None);
        };

        let preview = self.identify(&candidate.path)?;
        if preview.kind() != MediaKind::Image {
            debug!(preview = %preview.path().display(), kind = ?preview.kind(), "Preview is not an image");
            return Ok(None);
        }

        info!(
            source = %source.path().display(),
            preview = %preview.path().display(),
            bytes = candidate.size,
            "Using embedded preview"
        );
        Ok(Some(preview))
    }

    /// Rasterize the first page; `None` when the converter left no output.
    fn rasterize(&self, source: &SourceMedia, scope: &str) -> Result<Option<SourceMedia>> {
        let dest = self
            .temp
            .create_temporary_file(scope, "gs_transcoder", Some("png"))
            .within(Subsystem::TemporaryStorage, STAGE)?;

        self.rasterizer
            .to_image(source.path(), &dest)
            .within(Subsystem::VectorConverter, STAGE)?;

        let produced = std::fs::metadata(&dest).is_ok_and(|m| m.len() > 0);
        if !produced {
            debug!(source = %source.path().display(), "Vector conversion produced no output");
            return Ok(None);
        }

        info!(source = %source.path().display(), raster = %dest.display(), "Rasterized vector source");
        self.identify(&dest).map(Some)
    }

    /// Keep only the largest-area layers, merge them, save the first.
    fn flatten_layers(&self, source: &SourceMedia, scope: &str) -> Result<SourceMedia> {
        let mut image = self.open(source)?;

        let mut by_area: BTreeMap<u64, Vec<LayerId>> = BTreeMap::new();
        for layer in image.layers() {
            by_area.entry(layer.size.area()).or_default().push(layer.id);
        }
        let Some(max_area) = by_area.keys().next_back().copied() else {
            return Ok(source.clone());
        };

        for (_, ids) in by_area.range(..max_area) {
            for id in ids {
                image
                    .remove_layer(*id)
                    .within(Subsystem::RasterEngine, STAGE)?;
            }
        }

        if let Err(e) = image.merge_layers() {
            debug!(source = %source.path().display(), error = %e, "Layer merge failed, keeping first layer");
        }

        let Some(first) = image.layers().first().map(|layer| layer.id) else {
            return Ok(source.clone());
        };

        let dest = self
            .temp
            .create_temporary_file(scope, "tiff-layer", source.format().extension())
            .within(Subsystem::TemporaryStorage, STAGE)?;
        image
            .save_layer(first, &dest)
            .within(Subsystem::RasterEngine, STAGE)?;
        drop(image);

        info!(source = %source.path().display(), layer = %first, "Flattened multi-layer source");
        self.identify(&dest)
    }

    /// First layer only, as JPEG.
    fn first_layer(&self, source: &SourceMedia, scope: &str) -> Result<Option<SourceMedia>> {
        let image = self.open(source)?;
        let Some(first) = image.layers().first().map(|layer| layer.id) else {
            return Ok(None);
        };

        let dest = self
            .temp
            .create_temporary_file(scope, "photoshop-layer", Some("jpg"))
            .within(Subsystem::TemporaryStorage, STAGE)?;
        image
            .save_layer(first, &dest)
            .within(Subsystem::RasterEngine, STAGE)?;
        drop(image);

        info!(source = %source.path().display(), "Extracted first document layer");
        self.identify(&dest).map(Some)
    }
}
