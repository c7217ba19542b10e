//! Name → factory lookup for delegate algorithms.

use crate::algo::descriptors::{HistogramExtractor, MomentsExtractor};
use crate::algo::segmentors::{ScriptSegmentor, ThresholdSegmentor, WeightFileSegmentor};
use crate::algo::{AlgoError, AlgoResult, Algorithm, DescriptorExtractor, ImageSegmentor};
use crate::config::{ConfigBlock, BLOCK_SEP};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type SegmentorFactory = Arc<dyn Fn() -> Box<dyn ImageSegmentor> + Send + Sync>;
pub type ExtractorFactory = Arc<dyn Fn() -> Box<dyn DescriptorExtractor> + Send + Sync>;

/// Registry of delegate implementations, keyed by capability and name.
#[derive(Clone, Default)]
pub struct AlgorithmRegistry {
    segmentors: BTreeMap<String, SegmentorFactory>,
    extractors: BTreeMap<String, ExtractorFactory>,
}

impl AlgorithmRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the shipped implementations.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_segmentor("threshold", || Box::new(ThresholdSegmentor::default()));
        registry.register_segmentor("weight_file", || Box::new(WeightFileSegmentor::default()));
        registry.register_segmentor("script", || Box::new(ScriptSegmentor::new()));
        registry.register_extractor("histogram", || Box::new(HistogramExtractor::default()));
        registry.register_extractor("moments", || Box::new(MomentsExtractor::default()));
        registry
    }

    /// Register (or replace) a segmentor implementation.
    pub fn register_segmentor<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn ImageSegmentor> + Send + Sync + 'static,
    {
        self.segmentors.insert(name.to_string(), Arc::new(factory));
    }

    /// Register (or replace) a descriptor extractor implementation.
    pub fn register_extractor<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Box<dyn DescriptorExtractor> + Send + Sync + 'static,
    {
        self.extractors.insert(name.to_string(), Arc::new(factory));
    }

    pub fn segmentor_names(&self) -> impl Iterator<Item = &str> {
        self.segmentors.keys().map(String::as_str)
    }

    pub fn extractor_names(&self) -> impl Iterator<Item = &str> {
        self.extractors.keys().map(String::as_str)
    }

    pub fn create_segmentor(&self, name: &str) -> AlgoResult<Box<dyn ImageSegmentor>> {
        self.segmentors
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AlgoError::UnknownImplementation {
                capability: "image_segmentor",
                name: name.to_string(),
            })
    }

    pub fn create_extractor(&self, name: &str) -> AlgoResult<Box<dyn DescriptorExtractor>> {
        self.extractors
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| AlgoError::UnknownImplementation {
                capability: "descriptor_extractor",
                name: name.to_string(),
            })
    }

    /// Build and configure the segmentor selected by `<slot>:type`.
    pub fn resolve_segmentor(
        &self,
        slot: &str,
        config: &ConfigBlock,
        strict: bool,
    ) -> AlgoResult<Box<dyn ImageSegmentor>> {
        resolve_nested(slot, config, strict, |name| self.create_segmentor(name))
    }

    /// Build and configure the extractor selected by `<slot>:type`.
    pub fn resolve_extractor(
        &self,
        slot: &str,
        config: &ConfigBlock,
        strict: bool,
    ) -> AlgoResult<Box<dyn DescriptorExtractor>> {
        resolve_nested(slot, config, strict, |name| self.create_extractor(name))
    }
}

impl std::fmt::Debug for AlgorithmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmRegistry")
            .field("segmentors", &self.segmentors.keys().collect::<Vec<_>>())
            .field("extractors", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// The effective configuration of the algorithm under `slot`: the
/// implementation's defaults overlaid with `<slot>:<type>:*`.
pub fn nested_configuration<A: Algorithm + ?Sized>(
    slot: &str,
    config: &ConfigBlock,
    algo: &A,
) -> ConfigBlock {
    let mut merged = algo.get_configuration();
    merged.merge(&config.subblock(&format!("{}{}{}", slot, BLOCK_SEP, algo.type_name())));
    merged
}

fn resolve_nested<A, F>(slot: &str, config: &ConfigBlock, strict: bool, create: F) -> AlgoResult<Box<A>>
where
    A: Algorithm + ?Sized,
    F: FnOnce(&str) -> AlgoResult<Box<A>>,
{
    let impl_name: String = config.get(&format!("{}{}type", slot, BLOCK_SEP))?;
    let mut algo = create(impl_name.trim())?;
    let merged = nested_configuration(slot, config, algo.as_ref());

    if !algo.check_configuration(&merged) {
        if strict {
            return Err(AlgoError::InvalidConfiguration(format!(
                "'{}' rejected the configuration under '{}'",
                impl_name, slot
            )));
        }
        tracing::warn!(
            "Configuration check failed for '{}' under '{}'; continuing without strict validation",
            impl_name,
            slot
        );
    }

    algo.set_configuration(&merged)?;
    tracing::debug!("Resolved '{}' as '{}'", slot, impl_name);
    Ok(algo)
}
