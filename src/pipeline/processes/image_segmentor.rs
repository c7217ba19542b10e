//! ImageSegmentorProcess: runs each incoming image through a segmentor.
//!
//! The delegate is chosen by `segmentor:type` and configured from
//! `segmentor:<type>:*`. Images arrive on `image`, results leave on `mask`.
//! `mask` is required, so by default a delegate failure fails the process
//! while the port is connected.

use crate::algo::ImageSegmentor;
use crate::config::ConfigBlock;
use crate::pipeline::datum::Datum;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::{ErrorPolicy, PortDescriptor, PortSet};
use crate::pipeline::process::{ConfigureContext, StepContext};
use crate::pipeline::processes::strict_validation;
use crate::types::{tags, ImageFrame};

pub const ALGORITHM_SLOT: &str = "segmentor";
pub const IMAGE_PORT: &str = "image";
pub const MASK_PORT: &str = "mask";

pub struct ImageSegmentorProcess {
    name: String,
    ports: PortSet,
    config: ConfigBlock,
    segmentor: Option<Box<dyn ImageSegmentor>>,
}

impl ImageSegmentorProcess {
    pub fn new(name: &str, config: ConfigBlock) -> PipelineResult<Self> {
        Self::with_error_policy(name, config, ErrorPolicy::Fatal)
    }

    /// Like `new`, with `policy` on the mask port instead of `Fatal`.
    pub fn with_error_policy(
        name: &str,
        config: ConfigBlock,
        policy: ErrorPolicy,
    ) -> PipelineResult<Self> {
        let mut ports = PortSet::new(name);
        ports.declare_input(IMAGE_PORT, tags::IMAGE, true)?;
        ports.declare(
            PortDescriptor::output(MASK_PORT, tags::IMAGE, true).with_error_policy(policy),
        )?;
        Ok(Self {
            name: name.to_string(),
            ports,
            config,
            segmentor: None,
        })
    }

    /// Use an already configured delegate instead of resolving one.
    pub fn with_segmentor(mut self, segmentor: Box<dyn ImageSegmentor>) -> Self {
        self.segmentor = Some(segmentor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn configure(&mut self, ctx: &ConfigureContext) -> PipelineResult<()> {
        if self.segmentor.is_some() {
            return Ok(());
        }
        let strict = strict_validation(&self.name, &self.config, ctx)?;
        let segmentor = ctx
            .registry
            .resolve_segmentor(ALGORITHM_SLOT, &self.config, strict)
            .map_err(|e| {
                PipelineError::configuration(
                    &self.name,
                    format!("Unable to create image_segmentor: {}", e),
                )
            })?;
        tracing::info!("Using '{}' segmentor", segmentor.type_name());
        self.segmentor = Some(segmentor);
        Ok(())
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        let datum = ctx.pull(IMAGE_PORT)?;
        if datum.is_complete() {
            ctx.mark_complete();
            return Ok(());
        }
        let Some(image) = ctx.value_of::<ImageFrame>(IMAGE_PORT, &datum)? else {
            // Forward upstream errors, skip other markers.
            if let Datum::Error(_) = datum {
                ctx.push(MASK_PORT, datum)?;
            }
            return Ok(());
        };

        let segmentor = self
            .segmentor
            .as_mut()
            .ok_or_else(|| PipelineError::configuration(&self.name, "no segmentor configured"))?;
        let output = segmentor
            .segment(&image)
            .map_err(|e| PipelineError::Algorithm {
                process: self.name.clone(),
                message: e.to_string(),
            })?;
        ctx.push_value(MASK_PORT, output)
    }
}
