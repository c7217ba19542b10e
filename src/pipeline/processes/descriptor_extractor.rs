//! DescriptorExtractorProcess: computes a descriptor per detection per frame.
//!
//! Each incoming detection becomes a target whose track id continues a running
//! offset, so ids never repeat across frames. Without a detection input the
//! whole frame is one target and still consumes one id.
//!
//! Inputs: `image` (required), `timestamp`, `detected_object_set`.
//! Outputs: `track_descriptor_set`, `descriptor_set`, `string_vector`,
//! `detections` (the incoming detections, optionally with descriptors injected).
//!
//! Config keys:
//! - `computer:type` / `computer:<type>:*`: the extractor delegate
//! - `flush_on_last` (true): flush the delegate at end-of-stream, tagging the
//!   flushed descriptors with the stamp `final`
//! - `add_custom_uid` (false), `uid_basename` (""): set `uid` on every
//!   descriptor to `<basename>_<frame|final>_<index>`
//! - `inject_to_detections` (false)
//! - `strict_validation`: overrides the pipeline default

use crate::algo::{DescriptorExtractor, Target};
use crate::config::ConfigBlock;
use crate::pipeline::datum::Datum;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::PortSet;
use crate::pipeline::process::{ConfigureContext, StepContext};
use crate::pipeline::processes::strict_validation;
use crate::types::{
    tags, DescriptorSet, DetectionSet, ImageFrame, StringVector, Timestamp, TrackDescriptor,
    TrackDescriptorSet,
};
use std::sync::Arc;

pub const ALGORITHM_SLOT: &str = "computer";

pub const TIMESTAMP_PORT: &str = "timestamp";
pub const IMAGE_PORT: &str = "image";
pub const DETECTED_OBJECT_SET_PORT: &str = "detected_object_set";

pub const TRACK_DESCRIPTOR_SET_PORT: &str = "track_descriptor_set";
pub const DESCRIPTOR_SET_PORT: &str = "descriptor_set";
pub const STRING_VECTOR_PORT: &str = "string_vector";
pub const DETECTIONS_PORT: &str = "detections";

/// Stamp used for descriptors released by the end-of-stream flush.
pub const FINAL_STAMP: &str = "final";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Settings {
    flush_on_last: bool,
    add_custom_uid: bool,
    uid_basename: String,
    inject_to_detections: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            flush_on_last: true,
            add_custom_uid: false,
            uid_basename: String::new(),
            inject_to_detections: false,
        }
    }
}

pub struct DescriptorExtractorProcess {
    name: String,
    ports: PortSet,
    config: ConfigBlock,
    settings: Settings,
    extractor: Option<Box<dyn DescriptorExtractor>>,
    /// Next track id to hand out.
    detection_offset: u64,
    /// Images seen; stands in for the frame number without a timestamp.
    frames: u64,
}

impl DescriptorExtractorProcess {
    pub fn new(name: &str, config: ConfigBlock) -> PipelineResult<Self> {
        let mut ports = PortSet::new(name);
        ports.declare_input(TIMESTAMP_PORT, tags::TIMESTAMP, false)?;
        ports.declare_input(IMAGE_PORT, tags::IMAGE, true)?;
        ports.declare_input(DETECTED_OBJECT_SET_PORT, tags::DETECTED_OBJECT_SET, false)?;

        ports.declare_output(TRACK_DESCRIPTOR_SET_PORT, tags::TRACK_DESCRIPTOR_SET, false)?;
        ports.declare_output(DESCRIPTOR_SET_PORT, tags::DESCRIPTOR_SET, false)?;
        ports.declare_output(STRING_VECTOR_PORT, tags::STRING_VECTOR, false)?;
        ports.declare_output(DETECTIONS_PORT, tags::DETECTED_OBJECT_SET, false)?;

        Ok(Self {
            name: name.to_string(),
            ports,
            config,
            settings: Settings::default(),
            extractor: None,
            detection_offset: 0,
            frames: 0,
        })
    }

    /// Use an already configured delegate instead of resolving one.
    pub fn with_extractor(mut self, extractor: Box<dyn DescriptorExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    pub fn detection_offset(&self) -> u64 {
        self.detection_offset
    }

    fn config_err(&self, e: impl ToString) -> PipelineError {
        PipelineError::configuration(&self.name, e.to_string())
    }

    fn algo_err(&self, e: impl ToString) -> PipelineError {
        PipelineError::Algorithm {
            process: self.name.clone(),
            message: e.to_string(),
        }
    }

    pub fn configure(&mut self, ctx: &ConfigureContext) -> PipelineResult<()> {
        let defaults = Settings::default();
        let c = &self.config;
        let settings = Settings {
            flush_on_last: c
                .get_or("flush_on_last", defaults.flush_on_last)
                .map_err(|e| self.config_err(e))?,
            add_custom_uid: c
                .get_or("add_custom_uid", defaults.add_custom_uid)
                .map_err(|e| self.config_err(e))?,
            uid_basename: c.get_str("uid_basename").unwrap_or_default().to_string(),
            inject_to_detections: c
                .get_or("inject_to_detections", defaults.inject_to_detections)
                .map_err(|e| self.config_err(e))?,
        };

        if self.extractor.is_none() {
            let strict = strict_validation(&self.name, &self.config, ctx)?;
            let extractor = ctx
                .registry
                .resolve_extractor(ALGORITHM_SLOT, &self.config, strict)
                .map_err(|e| {
                    self.config_err(format!("Unable to create descriptor extractor: {}", e))
                })?;
            tracing::info!("Using '{}' descriptor extractor", extractor.type_name());
            self.extractor = Some(extractor);
        }
        self.settings = settings;
        Ok(())
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        if ctx.peek(IMAGE_PORT)?.is_complete() {
            ctx.mark_complete();
            if self.settings.flush_on_last {
                let output = self.extractor()?.flush().map_err(|e| self.algo_err(e))?;
                tracing::debug!("Final flush released {} descriptor(s)", output.len());
                let output = self.add_custom_uids(output, FINAL_STAMP);
                self.push_outputs(ctx, output)?;
            }
            return Ok(());
        }

        let timestamp = ctx.pull(TIMESTAMP_PORT)?;
        let timestamp = ctx.value_of::<Timestamp>(TIMESTAMP_PORT, &timestamp)?;
        let detections = ctx.pull(DETECTED_OBJECT_SET_PORT)?;
        let detections = ctx.value_of::<DetectionSet>(DETECTED_OBJECT_SET_PORT, &detections)?;
        let datum = ctx.pull(IMAGE_PORT)?;
        let Some(image) = ctx.value_of::<ImageFrame>(IMAGE_PORT, &datum)? else {
            if let Datum::Error(_) = datum {
                for (_, port) in self.ports.outputs() {
                    ctx.push(&port.name, datum.clone())?;
                }
            }
            return Ok(());
        };

        let frame = timestamp.map_or(self.frames, |ts| ts.frame);
        self.frames += 1;

        // Ids are consumed before the delegate runs so a failure cannot reuse them.
        let first_id = self.detection_offset;
        let targets: Vec<Target> = match &detections {
            Some(dets) => dets
                .iter()
                .enumerate()
                .map(|(i, d)| Target::new(first_id + i as u64, Some(d.bbox)))
                .collect(),
            None => vec![Target::whole_frame(first_id)],
        };
        self.detection_offset += targets.len() as u64;

        let output = self
            .extractor()?
            .compute(frame, &image, &targets)
            .map_err(|e| self.algo_err(e))?;
        let output = self.add_custom_uids(output, &frame.to_string());

        if ctx.output_edge_count(DETECTIONS_PORT) > 0 {
            if let Some(dets) = detections {
                let datum = if self.settings.inject_to_detections {
                    Datum::make_value(inject(&dets, first_id, &output))
                } else {
                    Datum::from_shared(dets)
                };
                ctx.push(DETECTIONS_PORT, datum)?;
            }
        }

        self.push_outputs(ctx, output)
    }

    fn extractor(&mut self) -> PipelineResult<&mut Box<dyn DescriptorExtractor>> {
        let name = &self.name;
        self.extractor
            .as_mut()
            .ok_or_else(|| PipelineError::configuration(name, "no descriptor extractor configured"))
    }

    fn add_custom_uids(&self, mut output: TrackDescriptorSet, stamp: &str) -> TrackDescriptorSet {
        if self.settings.add_custom_uid {
            let base = &self.settings.uid_basename;
            for (index, descriptor) in output.iter_mut().enumerate() {
                descriptor.uid = Some(if base.is_empty() {
                    format!("{}_{}", stamp, index)
                } else {
                    format!("{}_{}_{}", base, stamp, index)
                });
            }
        }
        output
    }

    fn push_outputs(&self, ctx: &mut StepContext, output: TrackDescriptorSet) -> PipelineResult<()> {
        if ctx.output_edge_count(DESCRIPTOR_SET_PORT) > 0 {
            let raw: DescriptorSet = output.iter().map(|d| d.features.clone()).collect();
            ctx.push_value(DESCRIPTOR_SET_PORT, raw)?;
        }
        if ctx.output_edge_count(STRING_VECTOR_PORT) > 0 {
            let uids: StringVector = output
                .iter()
                .map(|d| d.uid.clone().unwrap_or_else(|| d.track_id.to_string()))
                .collect();
            ctx.push_value(STRING_VECTOR_PORT, uids)?;
        }
        ctx.push_value(TRACK_DESCRIPTOR_SET_PORT, output)
    }
}

/// Copy of `detections` with each one's descriptor filled from `descriptors`,
/// matched by track id.
fn inject(detections: &Arc<DetectionSet>, first_id: u64, descriptors: &[TrackDescriptor]) -> DetectionSet {
    detections
        .iter()
        .enumerate()
        .map(|(i, det)| {
            let mut det = det.clone();
            let id = first_id + i as u64;
            if let Some(d) = descriptors.iter().find(|d| d.track_id == id) {
                det.descriptor = Some(d.features.clone());
            }
            det
        })
        .collect()
}
