//! Delegate algorithms.
//!
//! Processes own at most one delegate and treat it as an opaque capability:
//! configured once through a [`ConfigBlock`], then invoked once per step.
//!
//! # Capabilities
//!
//! - [`ImageSegmentor`]: image in, label image out.
//! - [`DescriptorExtractor`]: image plus targets in, one descriptor per target
//!   out, possibly buffered until [`DescriptorExtractor::flush`].
//!
//! Implementations are looked up by name in an [`AlgorithmRegistry`] using the
//! nested configuration convention: `<slot>:type` picks the implementation and
//! `<slot>:<type>:*` configures it.

pub mod descriptors;
pub mod registry;
pub mod segmentors;

pub use descriptors::{HistogramExtractor, MomentsExtractor};
pub use registry::{AlgorithmRegistry, ExtractorFactory, SegmentorFactory};
pub use segmentors::{ScriptSegmentor, ThresholdSegmentor, WeightFileSegmentor};

use crate::config::{ConfigBlock, ConfigError};
use crate::types::{BoundingBox, ImageFrame, TrackDescriptor};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlgoError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown {capability} implementation '{name}'")]
    UnknownImplementation {
        capability: &'static str,
        name: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AlgoResult<T> = std::result::Result<T, AlgoError>;

/// Configuration surface shared by every delegate.
pub trait Algorithm {
    /// Registry name of the implementation.
    fn type_name(&self) -> &'static str;

    /// Current settings, used as defaults when merging user configuration.
    fn get_configuration(&self) -> ConfigBlock;

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()>;

    /// Whether `config` would be accepted as-is.
    fn check_configuration(&self, config: &ConfigBlock) -> bool;
}

pub trait ImageSegmentor: Algorithm + Send {
    fn segment(&mut self, image: &ImageFrame) -> AlgoResult<ImageFrame>;
}

/// One object to describe on a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub track_id: u64,
    /// `None` describes the whole frame.
    pub region: Option<BoundingBox>,
}

impl Target {
    pub fn new(track_id: u64, region: Option<BoundingBox>) -> Self {
        Self { track_id, region }
    }

    pub fn whole_frame(track_id: u64) -> Self {
        Self::new(track_id, None)
    }
}

pub trait DescriptorExtractor: Algorithm + Send {
    /// Describe `targets` on `image`. May return fewer descriptors than targets
    /// when the implementation buffers.
    fn compute(
        &mut self,
        frame: u64,
        image: &ImageFrame,
        targets: &[Target],
    ) -> AlgoResult<Vec<TrackDescriptor>>;

    /// Release everything still buffered.
    fn flush(&mut self) -> AlgoResult<Vec<TrackDescriptor>> {
        Ok(Vec::new())
    }
}

/// Pixels of `image` inside `region` (the whole image for `None`), or `None`
/// when the region misses the image entirely.
pub(crate) fn region_pixels(
    image: &ImageFrame,
    region: Option<BoundingBox>,
) -> Option<impl Iterator<Item = u8> + '_> {
    let (width, height) = image.dimensions();
    let bbox = region
        .unwrap_or_else(|| BoundingBox::full(width, height))
        .clamp_to(width, height)?;
    Some((bbox.y..bbox.y + bbox.height).flat_map(move |y| {
        (bbox.x..bbox.x + bbox.width).map(move |x| image.get_pixel(x, y).0[0])
    }))
}
