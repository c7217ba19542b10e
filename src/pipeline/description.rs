//! Pipeline descriptions and the factory that turns them into pipelines.
//!
//! A description is plain data (processes with a kind and a config block,
//! connections as `process.port` pairs) that callers obtain however they like;
//! anything serde can read will do.

use crate::config::{ConfigBlock, EngineConfig};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::graph::Pipeline;
use crate::pipeline::process::AnyProcess;
use crate::pipeline::processes::{
    CollectorHandle, CollectorProcess, DescriptorExtractorProcess, FrameSourceProcess,
    ImageSegmentorProcess,
};
use crate::types::tag_from_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kinds of process a description can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    FrameSource,
    ImageSegmentor,
    DescriptorExtractor,
    Collector,
}

impl ProcessKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            ProcessKind::FrameSource => "Frame Source",
            ProcessKind::ImageSegmentor => "Image Segmentor",
            ProcessKind::DescriptorExtractor => "Descriptor Extractor",
            ProcessKind::Collector => "Collector",
        }
    }
}

impl std::fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessDescription {
    pub name: String,
    pub kind: ProcessKind,
    #[serde(default)]
    pub config: ConfigBlock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionDescription {
    /// `process.port`
    pub from: String,
    /// `process.port`
    pub to: String,
    /// Overrides the engine default when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineDescription {
    #[serde(default)]
    pub processes: Vec<ProcessDescription>,
    #[serde(default)]
    pub connections: Vec<ConnectionDescription>,
}

impl PipelineDescription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(mut self, name: &str, kind: ProcessKind, config: ConfigBlock) -> Self {
        self.processes.push(ProcessDescription {
            name: name.to_string(),
            kind,
            config,
        });
        self
    }

    pub fn connect(mut self, from: &str, to: &str) -> Self {
        self.connections.push(ConnectionDescription {
            from: from.to_string(),
            to: to.to_string(),
            capacity: None,
        });
        self
    }
}

/// A pipeline built from a description, plus the handles of its collectors.
pub struct BuiltPipeline {
    pub pipeline: Pipeline,
    pub collectors: BTreeMap<String, CollectorHandle>,
}

impl BuiltPipeline {
    pub fn collector(&self, name: &str) -> Option<&CollectorHandle> {
        self.collectors.get(name)
    }
}

/// Creates processes by kind.
pub struct ProcessFactory;

impl ProcessFactory {
    /// Instantiate one process. Collectors also return their handle.
    pub fn create(
        description: &ProcessDescription,
    ) -> PipelineResult<(AnyProcess, Option<CollectorHandle>)> {
        let name = description.name.as_str();
        let config = description.config.clone();
        let created: (AnyProcess, Option<CollectorHandle>) = match description.kind {
            ProcessKind::FrameSource => (FrameSourceProcess::new(name, config)?.into(), None),
            ProcessKind::ImageSegmentor => (ImageSegmentorProcess::new(name, config)?.into(), None),
            ProcessKind::DescriptorExtractor => {
                (DescriptorExtractorProcess::new(name, config)?.into(), None)
            }
            ProcessKind::Collector => {
                let tag = config.get_str("type").ok_or_else(|| {
                    PipelineError::configuration(name, "collector needs a 'type' key")
                })?;
                let collector = CollectorProcess::new(name, tag_from_name(tag.trim()))?;
                let handle = collector.handle();
                (collector.into(), Some(handle))
            }
        };
        tracing::debug!("Created {} '{}'", description.kind, name);
        Ok(created)
    }

    /// Assemble a pipeline. Validation and configuration are left to the caller.
    pub fn build(
        description: &PipelineDescription,
        config: &EngineConfig,
    ) -> PipelineResult<BuiltPipeline> {
        let mut pipeline = Pipeline::from_config(config);
        let mut collectors = BTreeMap::new();

        for process in &description.processes {
            let (process_box, handle) = Self::create(process)?;
            pipeline.add_process(process_box)?;
            if let Some(handle) = handle {
                collectors.insert(process.name.clone(), handle);
            }
        }

        for connection in &description.connections {
            let (src, src_port) = split_endpoint(&connection.from)?;
            let (dst, dst_port) = split_endpoint(&connection.to)?;
            match connection.capacity {
                Some(capacity) => {
                    pipeline.connect_with_capacity(src, src_port, dst, dst_port, Some(capacity))?
                }
                None => pipeline.connect(src, src_port, dst, dst_port)?,
            };
        }

        tracing::info!(
            "Built pipeline with {} process(es) and {} connection(s)",
            description.processes.len(),
            description.connections.len()
        );
        Ok(BuiltPipeline {
            pipeline,
            collectors,
        })
    }
}

/// `process.port` → (`process`, `port`). Process names may contain dots.
fn split_endpoint(endpoint: &str) -> PipelineResult<(&str, &str)> {
    endpoint
        .rsplit_once('.')
        .filter(|(process, port)| !process.is_empty() && !port.is_empty())
        .ok_or_else(|| {
            PipelineError::configuration(
                endpoint,
                "connection endpoints must look like 'process.port'",
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_endpoint() {
        assert_eq!(split_endpoint("seg.image").unwrap(), ("seg", "image"));
        assert_eq!(split_endpoint("cam.left.image").unwrap(), ("cam.left", "image"));
        assert!(split_endpoint("seg").is_err());
        assert!(split_endpoint(".image").is_err());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ProcessKind::ImageSegmentor.to_string(), "Image Segmentor");
    }

    #[test]
    fn test_description_from_json() {
        let json = r#"{
            "processes": [
                {"name": "src", "kind": "frame_source", "config": {"frame_count": 2}},
                {"name": "out", "kind": "collector", "config": {"type": "timestamp"}}
            ],
            "connections": [{"from": "src.timestamp", "to": "out.input", "capacity": 1}]
        }"#;
        let description: PipelineDescription = serde_json::from_str(json).unwrap();
        assert_eq!(description.processes[0].kind, ProcessKind::FrameSource);
        assert_eq!(description.connections[0].capacity, Some(1));

        let built = ProcessFactory::build(&description, &EngineConfig::default()).unwrap();
        assert_eq!(built.pipeline.process_names(), ["src", "out"]);
        assert!(built.collector("out").is_some());
        assert_eq!(built.pipeline.edges()[0].capacity, Some(1));
    }

    #[test]
    fn test_collector_requires_type() {
        let description = ProcessDescription {
            name: "out".into(),
            kind: ProcessKind::Collector,
            config: ConfigBlock::new(),
        };
        let err = ProcessFactory::create(&description).err().unwrap();
        assert!(matches!(err, PipelineError::Configuration { .. }));
    }

    #[test]
    fn test_build_reports_structural_errors() {
        let description = PipelineDescription::new()
            .process("src", ProcessKind::FrameSource, ConfigBlock::new())
            .process("seg", ProcessKind::ImageSegmentor, ConfigBlock::new())
            .connect("src.timestamp", "seg.image");
        let err = ProcessFactory::build(&description, &EngineConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, PipelineError::TypeMismatch { .. }));
    }
}
