//! Built-in process implementations.

pub mod collector;
pub mod descriptor_extractor;
pub mod frame_source;
pub mod image_segmentor;

pub use collector::{CollectorHandle, CollectorProcess};
pub use descriptor_extractor::DescriptorExtractorProcess;
pub use frame_source::FrameSourceProcess;
pub use image_segmentor::ImageSegmentorProcess;

use crate::config::ConfigBlock;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::process::ConfigureContext;

/// The process's own `strict_validation` key, else the pipeline default.
pub(crate) fn strict_validation(
    process: &str,
    config: &ConfigBlock,
    ctx: &ConfigureContext,
) -> PipelineResult<bool> {
    config
        .get_or("strict_validation", ctx.strict_validation)
        .map_err(|e| PipelineError::configuration(process, e.to_string()))
}
