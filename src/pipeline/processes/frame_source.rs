//! FrameSourceProcess: emits image frames and their timestamps.
//!
//! Frames come either from a list handed over at construction or, when none
//! are given, from a synthetic generator: a dark gradient with a bright square
//! that moves one `step` to the right per frame.
//!
//! Config keys (synthetic mode): `frame_count` (10), `width` (64),
//! `height` (48), `square` (12), `step` (4).

use crate::config::ConfigBlock;
use crate::pipeline::datum::Datum;
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::port::PortSet;
use crate::pipeline::process::{ConfigureContext, ProcessState, StepContext};
use crate::types::{tags, BoundingBox, ImageFrame, Timestamp};
use image::Luma;
use std::sync::Arc;

pub const IMAGE_PORT: &str = "image";
pub const TIMESTAMP_PORT: &str = "timestamp";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Synthetic {
    width: u32,
    height: u32,
    square: u32,
    step: u32,
}

impl Synthetic {
    /// Where the bright square sits on `frame`.
    fn square_at(&self, frame: u64) -> BoundingBox {
        let span = u64::from(self.width.saturating_sub(self.square).max(1));
        let x = (frame * u64::from(self.step) % span) as u32;
        let y = self.height.saturating_sub(self.square) / 2;
        BoundingBox::new(x, y, self.square, self.square)
    }

    fn render(&self, frame: u64) -> ImageFrame {
        let sq = self.square_at(frame);
        let (w, h) = (self.width.max(1), self.height.max(1));
        ImageFrame::from_fn(w, h, |x, y| {
            let inside = x >= sq.x && x < sq.x + sq.width && y >= sq.y && y < sq.y + sq.height;
            if inside {
                Luma([230])
            } else {
                Luma([(x * 64 / w) as u8])
            }
        })
    }
}

pub struct FrameSourceProcess {
    name: String,
    ports: PortSet,
    config: ConfigBlock,
    frames: Option<Vec<Arc<ImageFrame>>>,
    synthetic: Option<Synthetic>,
    frame_count: u64,
    next: u64,
}

impl FrameSourceProcess {
    /// Synthetic source configured from `config`.
    pub fn new(name: &str, config: ConfigBlock) -> PipelineResult<Self> {
        let mut ports = PortSet::new(name);
        ports.declare_output(IMAGE_PORT, tags::IMAGE, false)?;
        ports.declare_output(TIMESTAMP_PORT, tags::TIMESTAMP, false)?;
        Ok(Self {
            name: name.to_string(),
            ports,
            config,
            frames: None,
            synthetic: None,
            frame_count: 0,
            next: 0,
        })
    }

    /// Source that replays `frames` in order.
    pub fn from_frames(name: &str, frames: Vec<ImageFrame>) -> PipelineResult<Self> {
        let mut source = Self::new(name, ConfigBlock::new())?;
        source.frames = Some(frames.into_iter().map(Arc::new).collect());
        Ok(source)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ports(&self) -> &PortSet {
        &self.ports
    }

    /// Frames emitted so far.
    pub fn emitted(&self) -> u64 {
        self.next
    }

    pub fn configure(&mut self, _ctx: &ConfigureContext) -> PipelineResult<()> {
        if let Some(frames) = &self.frames {
            self.frame_count = frames.len() as u64;
            return Ok(());
        }
        let read = |key: &str, default: u32| -> PipelineResult<u32> {
            self.config
                .get_or(key, default)
                .map_err(|e| PipelineError::configuration(&self.name, e.to_string()))
        };
        let synthetic = Synthetic {
            width: read("width", 64)?,
            height: read("height", 48)?,
            square: read("square", 12)?,
            step: read("step", 4)?,
        };
        if synthetic.width == 0 || synthetic.height == 0 {
            return Err(PipelineError::configuration(
                &self.name,
                "width and height must be non-zero",
            ));
        }
        self.frame_count = self
            .config
            .get_or("frame_count", 10u64)
            .map_err(|e| PipelineError::configuration(&self.name, e.to_string()))?;
        self.synthetic = Some(synthetic);
        tracing::debug!(
            "Synthetic source: {} frame(s) of {}x{}",
            self.frame_count,
            synthetic.width,
            synthetic.height
        );
        Ok(())
    }

    pub fn step(&mut self, ctx: &mut StepContext) -> PipelineResult<()> {
        if self.next >= self.frame_count {
            ctx.mark_complete();
            return Ok(());
        }
        let frame = self.next;
        let image = match (&self.frames, &self.synthetic) {
            (Some(frames), _) => Arc::clone(&frames[frame as usize]),
            (None, Some(synthetic)) => Arc::new(synthetic.render(frame)),
            (None, None) => {
                return Err(PipelineError::InvalidState {
                    process: self.name.clone(),
                    state: ProcessState::Constructed,
                    operation: "step",
                })
            }
        };
        ctx.push(IMAGE_PORT, Datum::from_shared(image))?;
        ctx.push_value(TIMESTAMP_PORT, Timestamp::new(frame))?;
        self.next += 1;
        Ok(())
    }
}
