//! procflow demo runner
//!
//! Builds a small vision pipeline (synthetic frames, threshold segmentation,
//! histogram descriptors) and runs it with the configured scheduler.
//!
//! Usage: `procflow [engine.toml]`. Without an argument the engine config is
//! read from the platform config directory, falling back to defaults.

use anyhow::Context;
use procflow::config::{ConfigBlock, EngineConfig};
use procflow::pipeline::{PipelineDescription, ProcessFactory, ProcessKind, Scheduler};
use procflow::types::TrackDescriptorSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::load(&path)
            .with_context(|| format!("Failed to load engine config from {}", path))?,
        None => EngineConfig::default_path()
            .map(EngineConfig::load_or_default)
            .unwrap_or_default(),
    };

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log.filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting procflow demo ({:?})", config.scheduler.strategy);
    config.validate().context("Invalid engine config")?;

    let description = PipelineDescription::new()
        .process(
            "source",
            ProcessKind::FrameSource,
            ConfigBlock::new().with("frame_count", 8),
        )
        .process(
            "segment",
            ProcessKind::ImageSegmentor,
            ConfigBlock::new()
                .with("segmentor:type", "threshold")
                .with("segmentor:threshold:threshold", 200),
        )
        .process(
            "describe",
            ProcessKind::DescriptorExtractor,
            ConfigBlock::new()
                .with("computer:type", "histogram")
                .with("computer:histogram:bins", 4)
                .with("add_custom_uid", true)
                .with("uid_basename", "demo"),
        )
        .process(
            "tracks",
            ProcessKind::Collector,
            ConfigBlock::new().with("type", "track_descriptor_set"),
        )
        .connect("source.image", "segment.image")
        .connect("source.timestamp", "describe.timestamp")
        .connect("segment.mask", "describe.image")
        .connect("describe.track_descriptor_set", "tracks.input");

    let mut built = ProcessFactory::build(&description, &config)?;
    built.pipeline.prepare()?;

    let report = Scheduler::from_config(&config).run(&mut built.pipeline)?;
    tracing::info!(
        "Run report:\n{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize run report")?
    );

    if let Some(tracks) = built.collector("tracks") {
        for set in tracks.values::<TrackDescriptorSet>() {
            for descriptor in set.iter() {
                tracing::info!(
                    "{} frame={} track={} features={:?}",
                    descriptor.uid.as_deref().unwrap_or("-"),
                    descriptor.frame,
                    descriptor.track_id,
                    descriptor.features
                );
            }
        }
    }

    Ok(())
}
