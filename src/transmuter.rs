//! The image-to-image pipeline orchestrator.
//!
//! ```text
//! Idle → Normalizing → Transforming → Encoding → Cleaning → Done
//!          └──────────────┴──────────────┴──→ Failed → Cleaning → error
//! ```
//!
//! [`ImageTransmuter::execute`] validates the request, then runs the stages
//! with every temporary artifact registered under a scope unique to the call.
//! A [`CleanupGuard`] cleans that scope on the success path and on every early
//! return, so no path leaks files. The decoded image lives in its own block and
//! is released as soon as encoding returns, whatever the outcome.

use crate::config::TransmuterConfig;
use crate::error::{Result, Subsystem, TransmuteError, Within};
use crate::imaging::operations::{apply_transform, plan_transform};
use crate::imaging::{EncodeOptions, RasterEngine, RustBackend};
use crate::media::{MediaIdentifier, MediaKind, SourceMedia};
use crate::metadata::SniffingIdentifier;
use crate::normalize::Normalizer;
use crate::preview::{ExiftoolExtractor, PreviewExtractor};
use crate::spec::{ImageSpec, Specification};
use crate::temp::{CleanupGuard, ScopedTempFiles, TemporaryStorage, unique_scope};
use crate::vector::{GhostscriptRasterizer, VectorRasterizer};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const SCOPE_PREFIX: &str = "image-transmuter";

/// Pipeline stage, carried by [`TransmuteError::Subsystem`] and logged on transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Normalizing,
    Transforming,
    Encoding,
    Cleaning,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::Normalizing => "normalizing",
            Stage::Transforming => "transforming",
            Stage::Encoding => "encoding",
            Stage::Cleaning => "cleaning",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Converts an image source into an image destination per an [`ImageSpec`].
///
/// Holds no per-call state, so one transmuter can serve concurrent calls; each
/// call gets its own temporary scope.
pub struct ImageTransmuter {
    config: TransmuterConfig,
    engine: Arc<dyn RasterEngine>,
    identifier: Arc<dyn MediaIdentifier>,
    rasterizer: Arc<dyn VectorRasterizer>,
    previews: Arc<dyn PreviewExtractor>,
    temp: Arc<dyn TemporaryStorage>,
}

impl ImageTransmuter {
    /// Default collaborators: pure-Rust engine, content sniffing, Ghostscript,
    /// exiftool and scoped temp files, all configured from `config`.
    pub fn new(config: TransmuterConfig) -> Self {
        let temp = match &config.temporary.root {
            Some(root) => ScopedTempFiles::new(root),
            None => ScopedTempFiles::in_system_temp(),
        };
        Self {
            engine: Arc::new(RustBackend::new()),
            identifier: Arc::new(SniffingIdentifier::new()),
            rasterizer: Arc::new(GhostscriptRasterizer::new(
                &config.ghostscript.binary,
                config.ghostscript.resolution,
            )),
            previews: Arc::new(ExiftoolExtractor::new(&config.exiftool.binary)),
            temp: Arc::new(temp),
            config,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn RasterEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_identifier(mut self, identifier: Arc<dyn MediaIdentifier>) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn VectorRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn with_preview_extractor(mut self, previews: Arc<dyn PreviewExtractor>) -> Self {
        self.previews = previews;
        self
    }

    pub fn with_temporary_storage(mut self, temp: Arc<dyn TemporaryStorage>) -> Self {
        self.temp = temp;
        self
    }

    pub fn config(&self) -> &TransmuterConfig {
        &self.config
    }

    /// Identify `source` with the configured identifier, then [`execute`](Self::execute).
    pub fn execute_path(&self, spec: &Specification, source: &Path, dest: &Path) -> Result<()> {
        let media = self
            .identifier
            .identify(source)
            .within(Subsystem::MetadataService, Stage::Idle)?;
        self.execute(spec, &media, dest)
    }

    /// Transmute `source` into `dest` (format picked from the extension).
    ///
    /// Fails with [`TransmuteError::UnsupportedSpecification`] before touching
    /// anything when `spec` is not an image specification or `source` is not an
    /// image. Any collaborator failure is a [`TransmuteError::Subsystem`]. The
    /// call's temporary scope is cleaned on every path.
    #[instrument(skip_all, fields(source = %source.path().display(), dest = %dest.display()))]
    pub fn execute(&self, spec: &Specification, source: &SourceMedia, dest: &Path) -> Result<()> {
        let Specification::Image(image_spec) = spec else {
            return Err(TransmuteError::UnsupportedSpecification(format!(
                "{} specifications cannot be produced from an image",
                spec.kind_name()
            )));
        };
        if source.kind() != MediaKind::Image {
            return Err(TransmuteError::UnsupportedSpecification(format!(
                "source {} is {:?} media, not an image",
                source.path().display(),
                source.kind()
            )));
        }

        let guard = CleanupGuard::new(self.temp.as_ref(), unique_scope(SCOPE_PREFIX));
        let result = self.run(image_spec, source, dest, guard.scope());

        debug!(stage = %Stage::Cleaning, scope = guard.scope(), "Cleaning temporary scope");
        if let Err(e) = guard.finish() {
            warn!(error = %e, "Temporary scope cleanup failed");
        }

        match &result {
            Ok(()) => info!(stage = %Stage::Done, "Transmuted"),
            Err(e) => warn!(stage = %Stage::Failed, error = %e, "Transmutation failed"),
        }
        result
    }

    fn run(&self, spec: &ImageSpec, source: &SourceMedia, dest: &Path, scope: &str) -> Result<()> {
        debug!(stage = %Stage::Normalizing, mime = source.mime_type());
        let working = Normalizer {
            config: &self.config,
            engine: self.engine.as_ref(),
            identifier: self.identifier.as_ref(),
            rasterizer: self.rasterizer.as_ref(),
            previews: self.previews.as_ref(),
            temp: self.temp.as_ref(),
        }
        .normalize(source, scope)?;

        debug!(stage = %Stage::Transforming, working = %working.path().display());
        let mut image = self
            .engine
            .open(working.path())
            .within(Subsystem::RasterEngine, Stage::Transforming)?;
        let plan = plan_transform(
            spec,
            image.size(),
            working.orientation(),
            self.config.autorotate,
        );
        apply_transform(image.as_mut(), &plan).within(Subsystem::RasterEngine, Stage::Transforming)?;

        debug!(stage = %Stage::Encoding);
        let saved = image
            .save(dest, &EncodeOptions::from_spec(spec))
            .within(Subsystem::RasterEngine, Stage::Encoding);
        drop(image);
        saved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::Dimensions;
    use crate::imaging::backend::tests::{MockEngine, MockSource, RecordedOp};
    use crate::media::Orientation;
    use crate::spec::ResizeMode;
    use crate::test_helpers::{CountingStorage, MockExtractor, MockIdentifier, MockRasterizer};
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Harness {
        engine: Arc<MockEngine>,
        temp: Arc<CountingStorage>,
        rasterizer: Arc<MockRasterizer>,
        out: TempDir,
    }

    impl Harness {
        fn new(engine: MockEngine) -> Self {
            Self::with_rasterizer(engine, MockRasterizer::writes_nothing())
        }

        fn with_rasterizer(engine: MockEngine, rasterizer: MockRasterizer) -> Self {
            Self {
                engine: Arc::new(engine),
                temp: Arc::new(CountingStorage::new()),
                rasterizer: Arc::new(rasterizer),
                out: TempDir::new().unwrap(),
            }
        }

        fn transmuter(&self, config: TransmuterConfig) -> ImageTransmuter {
            ImageTransmuter::new(config)
                .with_engine(self.engine.clone())
                .with_identifier(Arc::new(MockIdentifier::new()))
                .with_rasterizer(self.rasterizer.clone())
                .with_preview_extractor(Arc::new(MockExtractor::with_files(vec![])))
                .with_temporary_storage(self.temp.clone())
        }

        fn dest(&self, name: &str) -> PathBuf {
            self.out.path().join(name)
        }

        fn run(&self, spec: impl Into<Specification>, source: &SourceMedia) -> Result<()> {
            self.transmuter(TransmuterConfig::default())
                .execute(&spec.into(), source, &self.dest("out.jpg"))
        }

        fn assert_cleaned_once(&self) {
            let cleans = self.temp.cleans();
            assert_eq!(cleans.len(), 1, "cleans: {cleans:?}");
            assert!(cleans[0].starts_with("image-transmuter-"));
            assert!(self.temp.is_empty_on_disk());
        }
    }

    fn jpeg(path: &str) -> SourceMedia {
        SourceMedia::new(path, "image/jpeg", MediaKind::Image)
    }

    fn saves(ops: &[RecordedOp]) -> Vec<&RecordedOp> {
        ops.iter()
            .filter(|op| matches!(op, RecordedOp::Save { .. }))
            .collect()
    }

    // =========================================================================
    // Success paths
    // =========================================================================

    #[test]
    fn resizes_and_encodes() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(1600, 1200)));
        let spec = ImageSpec::new().with_size(800, 800).with_quality(90);

        h.run(spec, &jpeg("/in.jpg")).unwrap();

        let ops = h.engine.get_operations();
        assert!(ops.contains(&RecordedOp::Resize(Dimensions::new(800, 600))));
        let saves = saves(&ops);
        assert_eq!(saves.len(), 1);
        let RecordedOp::Save { path, options } = saves[0] else {
            unreachable!()
        };
        assert!(path.ends_with("out.jpg"));
        assert_eq!(options.quality, 90);
        assert_eq!(ops.last(), Some(&RecordedOp::Release("/in.jpg".into())));
        h.assert_cleaned_once();
    }

    #[test]
    fn outbound_produces_exact_box() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(1600, 1200)));
        let spec = ImageSpec::new()
            .with_size(300, 300)
            .with_resize_mode(ResizeMode::Outbound);

        h.run(spec, &jpeg("/in.jpg")).unwrap();

        assert!(h.engine.get_operations().contains(&RecordedOp::Thumbnail(
            Dimensions::new(300, 300),
            crate::imaging::ThumbnailMode::Outbound
        )));
    }

    #[test]
    fn multi_layer_source_is_flattened_then_transformed() {
        let h = Harness::new(MockEngine::new().with_source(
            "/in/scan.tif",
            MockSource::layered(vec![
                Dimensions::new(200, 200),
                Dimensions::new(200, 200),
                Dimensions::new(50, 50),
            ]),
        ));
        let source = SourceMedia::new("/in/scan.tif", "image/tiff", MediaKind::Image);

        h.run(ImageSpec::new().with_size(100, 100), &source).unwrap();

        let ops = h.engine.get_operations();
        assert!(ops.contains(&RecordedOp::RemoveLayer(crate::imaging::LayerId(2))));
        assert!(ops.contains(&RecordedOp::Resize(Dimensions::new(100, 100))));
        assert_eq!(saves(&ops).len(), 1);
        h.assert_cleaned_once();
    }

    #[test]
    fn vector_source_rasterized_and_cleaned() {
        let engine = MockEngine::new();
        let rasterizer =
            MockRasterizer::writes_output().registering(&engine.sources, MockSource::single(2400, 2400));
        let h = Harness::with_rasterizer(engine, rasterizer);
        let source = SourceMedia::new("/in/logo.ai", "application/illustrator", MediaKind::Image);

        h.run(ImageSpec::new().with_size(600, 600), &source).unwrap();

        assert_eq!(h.rasterizer.calls(), 1);
        assert!(h.engine.get_operations().contains(&RecordedOp::Resize(Dimensions::new(600, 600))));
        h.assert_cleaned_once();
    }

    #[test]
    fn each_call_gets_its_own_scope() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(10, 10)));
        let transmuter = h.transmuter(TransmuterConfig::default());
        let spec = Specification::from(ImageSpec::new());

        transmuter.execute(&spec, &jpeg("/in.jpg"), &h.dest("a.png")).unwrap();
        transmuter.execute(&spec, &jpeg("/in.jpg"), &h.dest("b.png")).unwrap();

        let cleans = h.temp.cleans();
        assert_eq!(cleans.len(), 2);
        assert_ne!(cleans[0], cleans[1]);
    }

    // =========================================================================
    // Rotation
    // =========================================================================

    fn rotations(ops: &[RecordedOp]) -> Vec<i32> {
        ops.iter()
            .filter_map(|op| match op {
                RecordedOp::Rotate(d) => Some(*d),
                _ => None,
            })
            .collect()
    }

    fn rotated_jpeg() -> SourceMedia {
        jpeg("/in.jpg").with_orientation(Orientation::from_exif(6))
    }

    #[test]
    fn autorotate_follows_orientation() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(40, 30)));
        h.run(ImageSpec::new(), &rotated_jpeg()).unwrap();
        assert_eq!(rotations(&h.engine.get_operations()), vec![90]);
    }

    #[test]
    fn explicit_zero_angle_disables_autorotate() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(40, 30)));
        h.run(ImageSpec::new().with_rotation(0), &rotated_jpeg()).unwrap();
        assert_eq!(rotations(&h.engine.get_operations()), vec![0]);
    }

    #[test]
    fn autorotate_off_skips_rotation() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(40, 30)));
        let config = TransmuterConfig {
            autorotate: false,
            ..TransmuterConfig::default()
        };

        h.transmuter(config)
            .execute(&ImageSpec::new().into(), &rotated_jpeg(), &h.dest("out.jpg"))
            .unwrap();
        assert!(rotations(&h.engine.get_operations()).is_empty());
    }

    // =========================================================================
    // Rejections
    // =========================================================================

    #[test]
    fn non_image_spec_rejected_before_any_work() {
        let h = Harness::new(MockEngine::new().with_source("/in.jpg", MockSource::single(10, 10)));

        let err = h.run(Specification::Audio, &jpeg("/in.jpg")).unwrap_err();

        assert!(matches!(err, TransmuteError::UnsupportedSpecification(_)));
        assert!(h.engine.get_operations().is_empty());
        assert!(h.temp.cleans().is_empty());
        assert_eq!(h.temp.created(), 0);
    }

    #[test]
    fn non_image_source_rejected() {
        let h = Harness::new(MockEngine::new());
        let video = SourceMedia::new("/in.mp4", "video/mp4", MediaKind::Video);

        let err = h.run(ImageSpec::new(), &video).unwrap_err();

        assert!(matches!(err, TransmuteError::UnsupportedSpecification(_)));
        assert!(h.temp.cleans().is_empty());
    }

    // =========================================================================
    // Failures still clean up
    // =========================================================================

    #[test]
    fn unopenable_source_fails_in_transform() {
        let h = Harness::new(MockEngine::new());

        let err = h.run(ImageSpec::new(), &jpeg("/missing.jpg")).unwrap_err();

        assert_eq!(err.origin(), Some(Subsystem::RasterEngine));
        assert_eq!(err.stage(), Some(Stage::Transforming));
        h.assert_cleaned_once();
    }

    #[test]
    fn encode_failure_releases_image_and_cleans() {
        let h = Harness::new(
            MockEngine::new().with_source("/in.jpg", MockSource::single(10, 10).save_fails()),
        );

        let err = h.run(ImageSpec::new(), &jpeg("/in.jpg")).unwrap_err();

        assert_eq!(err.origin(), Some(Subsystem::RasterEngine));
        assert_eq!(err.stage(), Some(Stage::Encoding));
        assert!(std::error::Error::source(&err).is_some());
        let ops = h.engine.get_operations();
        assert_eq!(ops.last(), Some(&RecordedOp::Release("/in.jpg".into())));
        h.assert_cleaned_once();
    }

    #[test]
    fn vector_without_output_then_fails_on_open() {
        // No rasterized file, so the engine gets the vector source itself.
        let h = Harness::new(MockEngine::new());
        let source = SourceMedia::new("/in/logo.eps", "application/postscript", MediaKind::Image);

        let err = h.run(ImageSpec::new(), &source).unwrap_err();

        assert_eq!(err.origin(), Some(Subsystem::RasterEngine));
        assert_eq!(h.rasterizer.calls(), 1);
        assert_eq!(
            h.engine.get_operations(),
            vec![RecordedOp::Open("/in/logo.eps".into())]
        );
        h.assert_cleaned_once();
    }

    #[test]
    fn converter_failure_cleans_partial_artifacts() {
        let h = Harness::with_rasterizer(MockEngine::new(), MockRasterizer::fails());
        let source = SourceMedia::new("/in/logo.ai", "application/illustrator", MediaKind::Image);

        let err = h.run(ImageSpec::new(), &source).unwrap_err();

        assert_eq!(err.origin(), Some(Subsystem::VectorConverter));
        assert_eq!(err.stage(), Some(Stage::Normalizing));
        // The gs_transcoder file was created before the failure.
        assert_eq!(h.temp.created(), 1);
        h.assert_cleaned_once();
    }

    #[test]
    fn execute_path_identifies_first() {
        let h = Harness::new(MockEngine::new().with_source("/in/photo.jpg", MockSource::single(10, 10)));
        h.transmuter(TransmuterConfig::default())
            .execute_path(
                &ImageSpec::new().into(),
                Path::new("/in/photo.jpg"),
                &h.dest("out.png"),
            )
            .unwrap();
        assert_eq!(saves(&h.engine.get_operations()).len(), 1);
    }

    #[test]
    fn stage_names() {
        assert_eq!(Stage::Normalizing.to_string(), "normalizing");
        assert_eq!(Stage::Encoding.to_string(), "encoding");
    }
}
