//! Reference descriptor extractors.

use crate::algo::{region_pixels, AlgoError, AlgoResult, Algorithm, DescriptorExtractor, Target};
use crate::config::ConfigBlock;
use crate::types::{ImageFrame, TrackDescriptor};

fn outside(target: &Target) -> AlgoError {
    AlgoError::Processing(format!(
        "region of target {} lies outside the image",
        target.track_id
    ))
}

/// Normalized intensity histogram of each target region.
///
/// With `batch_size > 1` descriptors are held back until that many are ready;
/// `flush` releases the remainder.
#[derive(Debug, Clone)]
pub struct HistogramExtractor {
    bins: usize,
    batch_size: usize,
    buffer: Vec<TrackDescriptor>,
}

impl Default for HistogramExtractor {
    fn default() -> Self {
        Self {
            bins: 16,
            batch_size: 1,
            buffer: Vec::new(),
        }
    }
}

impl HistogramExtractor {
    pub fn new(bins: usize, batch_size: usize) -> AlgoResult<Self> {
        Self::validate(bins, batch_size)?;
        Ok(Self {
            bins,
            batch_size,
            buffer: Vec::new(),
        })
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn histogram(&self, image: &ImageFrame, target: &Target) -> AlgoResult<Vec<f64>> {
        let pixels = region_pixels(image, target.region).ok_or_else(|| outside(target))?;
        let mut counts = vec![0u64; self.bins];
        let mut total = 0u64;
        for p in pixels {
            counts[usize::from(p) * self.bins / 256] += 1;
            total += 1;
        }
        Ok(counts
            .into_iter()
            .map(|c| c as f64 / total as f64)
            .collect())
    }

    fn parse(config: &ConfigBlock, bins: usize, batch_size: usize) -> AlgoResult<(usize, usize)> {
        let bins: usize = config.get_or("bins", bins)?;
        let batch_size: usize = config.get_or("batch_size", batch_size)?;
        Self::validate(bins, batch_size)?;
        Ok((bins, batch_size))
    }

    fn validate(bins: usize, batch_size: usize) -> AlgoResult<()> {
        if !(1..=256).contains(&bins) {
            return Err(AlgoError::InvalidConfiguration(format!(
                "bins must be within 1..=256, got {}",
                bins
            )));
        }
        if batch_size == 0 {
            return Err(AlgoError::InvalidConfiguration(
                "batch_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Algorithm for HistogramExtractor {
    fn type_name(&self) -> &'static str {
        "histogram"
    }

    fn get_configuration(&self) -> ConfigBlock {
        ConfigBlock::new()
            .with("bins", self.bins)
            .with("batch_size", self.batch_size)
    }

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()> {
        (self.bins, self.batch_size) = Self::parse(config, self.bins, self.batch_size)?;
        Ok(())
    }

    fn check_configuration(&self, config: &ConfigBlock) -> bool {
        Self::parse(config, self.bins, self.batch_size).is_ok()
    }
}

impl DescriptorExtractor for HistogramExtractor {
    fn compute(
        &mut self,
        frame: u64,
        image: &ImageFrame,
        targets: &[Target],
    ) -> AlgoResult<Vec<TrackDescriptor>> {
        let computed = targets
            .iter()
            .map(|t| {
                self.histogram(image, t)
                    .map(|h| TrackDescriptor::new(t.track_id, frame, h))
            })
            .collect::<AlgoResult<Vec<_>>>()?;
        self.buffer.extend(computed);
        if self.buffer.len() >= self.batch_size {
            Ok(std::mem::take(&mut self.buffer))
        } else {
            Ok(Vec::new())
        }
    }

    fn flush(&mut self) -> AlgoResult<Vec<TrackDescriptor>> {
        if !self.buffer.is_empty() {
            tracing::debug!("Flushing {} buffered descriptor(s)", self.buffer.len());
        }
        Ok(std::mem::take(&mut self.buffer))
    }
}

/// Mean, standard deviation, min and max of each target region.
#[derive(Debug, Clone, Default)]
pub struct MomentsExtractor {
    /// Divide every feature by 255.
    normalize: bool,
}

impl MomentsExtractor {
    fn moments(&self, image: &ImageFrame, target: &Target) -> AlgoResult<Vec<f64>> {
        let pixels = region_pixels(image, target.region).ok_or_else(|| outside(target))?;
        let (mut n, mut sum, mut sum_sq) = (0u64, 0f64, 0f64);
        let (mut min, mut max) = (u8::MAX, u8::MIN);
        for p in pixels {
            let v = f64::from(p);
            n += 1;
            sum += v;
            sum_sq += v * v;
            min = min.min(p);
            max = max.max(p);
        }
        let mean = sum / n as f64;
        let std_dev = (sum_sq / n as f64 - mean * mean).max(0.0).sqrt();
        let scale = if self.normalize { 255.0 } else { 1.0 };
        Ok([mean, std_dev, f64::from(min), f64::from(max)]
            .into_iter()
            .map(|v| v / scale)
            .collect())
    }
}

impl Algorithm for MomentsExtractor {
    fn type_name(&self) -> &'static str {
        "moments"
    }

    fn get_configuration(&self) -> ConfigBlock {
        ConfigBlock::new().with("normalize", self.normalize)
    }

    fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()> {
        self.normalize = config.get_or("normalize", self.normalize)?;
        Ok(())
    }

    fn check_configuration(&self, config: &ConfigBlock) -> bool {
        config.get_or("normalize", self.normalize).is_ok()
    }
}

impl DescriptorExtractor for MomentsExtractor {
    fn compute(
        &mut self,
        frame: u64,
        image: &ImageFrame,
        targets: &[Target],
    ) -> AlgoResult<Vec<TrackDescriptor>> {
        targets
            .iter()
            .map(|t| {
                self.moments(image, t)
                    .map(|m| TrackDescriptor::new(t.track_id, frame, m))
            })
            .collect()
    }
}
