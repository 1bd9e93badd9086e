//! The single error type returned by [`ImageTransmuter::execute`](crate::ImageTransmuter::execute).
//!
//! Every collaborator speaks its own error enum ([`RasterError`](crate::imaging::RasterError),
//! [`IdentifyError`](crate::media::IdentifyError), [`ConversionError`](crate::vector::ConversionError),
//! [`ExtractError`](crate::preview::ExtractError), `std::io::Error` for temporary storage).
//! At the pipeline boundary they are all folded into [`TransmuteError::Subsystem`],
//! tagged with the collaborator that failed and the stage that was running. The
//! collaborator's error stays reachable through [`std::error::Error::source`].
//!
//! Helpers inside the pipeline that already return [`TransmuteError`] are forwarded
//! with `?` as-is, so a failure is never wrapped twice.

use crate::transmuter::Stage;
use std::fmt;
use thiserror::Error;

/// Boxed collaborator error kept as the underlying cause.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The collaborator a failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subsystem {
    /// Format sniffing / re-identification of a file.
    MetadataService,
    /// Vector-to-raster conversion.
    VectorConverter,
    /// Decode, transform and encode primitives.
    RasterEngine,
    /// Embedded preview extraction.
    PreviewExtractor,
    /// Temporary file and directory creation.
    TemporaryStorage,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Subsystem::MetadataService => "metadata service",
            Subsystem::VectorConverter => "vector converter",
            Subsystem::RasterEngine => "raster engine",
            Subsystem::PreviewExtractor => "preview extractor",
            Subsystem::TemporaryStorage => "temporary storage",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum TransmuteError {
    #[error("Specification not supported: {0}")]
    UnsupportedSpecification(String),
    #[error("Unable to transmute image to image due to the {origin} while {stage}")]
    Subsystem {
        origin: Subsystem,
        stage: Stage,
        #[source]
        source: Cause,
    },
}

impl TransmuteError {
    pub fn subsystem(origin: Subsystem, stage: Stage, source: impl Into<Cause>) -> Self {
        TransmuteError::Subsystem {
            origin,
            stage,
            source: source.into(),
        }
    }

    /// The failing collaborator, or `None` for a specification problem.
    pub fn origin(&self) -> Option<Subsystem> {
        match self {
            TransmuteError::UnsupportedSpecification(_) => None,
            TransmuteError::Subsystem { origin, .. } => Some(*origin),
        }
    }

    /// The pipeline stage that was running when a collaborator failed.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            TransmuteError::UnsupportedSpecification(_) => None,
            TransmuteError::Subsystem { stage, .. } => Some(*stage),
        }
    }
}

pub type Result<T> = std::result::Result<T, TransmuteError>;

/// Tags a collaborator result with its origin and the running stage.
pub(crate) trait Within<T> {
    fn within(self, origin: Subsystem, stage: Stage) -> Result<T>;
}

impl<T, E> Within<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn within(self, origin: Subsystem, stage: Stage) -> Result<T> {
        self.map_err(|err| TransmuteError::subsystem(origin, stage, err))
    }
}
