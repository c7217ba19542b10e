//! Mock delegate algorithms

use mockall::mock;
use procflow::algo::{
    AlgoResult, Algorithm, AlgorithmRegistry, DescriptorExtractor, ImageSegmentor, Target,
};
use procflow::config::ConfigBlock;
use procflow::types::{ImageFrame, TrackDescriptor};

mock! {
    pub Segmentor {}

    impl Algorithm for Segmentor {
        fn type_name(&self) -> &'static str;
        fn get_configuration(&self) -> ConfigBlock;
        fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()>;
        fn check_configuration(&self, config: &ConfigBlock) -> bool;
    }

    impl ImageSegmentor for Segmentor {
        fn segment(&mut self, image: &ImageFrame) -> AlgoResult<ImageFrame>;
    }
}

mock! {
    pub Extractor {}

    impl Algorithm for Extractor {
        fn type_name(&self) -> &'static str;
        fn get_configuration(&self) -> ConfigBlock;
        fn set_configuration(&mut self, config: &ConfigBlock) -> AlgoResult<()>;
        fn check_configuration(&self, config: &ConfigBlock) -> bool;
    }

    impl DescriptorExtractor for Extractor {
        fn compute(
            &mut self,
            frame: u64,
            image: &ImageFrame,
            targets: &[Target],
        ) -> AlgoResult<Vec<TrackDescriptor>>;
        fn flush(&mut self) -> AlgoResult<Vec<TrackDescriptor>>;
    }
}

/// Extractor that describes every target with `[track_id]` and never buffers.
pub fn echo_extractor() -> MockExtractor {
    let mut mock = MockExtractor::new();
    mock.expect_type_name().return_const("echo");
    mock.expect_compute().returning(|frame, _, targets| {
        Ok(targets
            .iter()
            .map(|t| TrackDescriptor::new(t.track_id, frame, vec![t.track_id as f64]))
            .collect())
    });
    mock.expect_flush().returning(|| Ok(Vec::new()));
    mock
}

/// Segmentor returning its input, failing on the frames listed in `fail_on`
/// (counted from zero).
pub fn flaky_segmentor(fail_on: &'static [usize]) -> MockSegmentor {
    let mut mock = MockSegmentor::new();
    let mut calls = 0usize;
    mock.expect_type_name().return_const("flaky");
    mock.expect_segment().returning(move |image| {
        let call = calls;
        calls += 1;
        if fail_on.contains(&call) {
            Err(procflow::AlgoError::Processing(format!("frame {} rejected", call)))
        } else {
            Ok(image.clone())
        }
    });
    mock
}

/// Registry offering `mock` as a segmentor that accepts any configuration.
pub fn registry_with_mock_segmentor() -> AlgorithmRegistry {
    let mut registry = AlgorithmRegistry::with_builtins();
    registry.register_segmentor("mock", || {
        let mut mock = MockSegmentor::new();
        mock.expect_type_name().return_const("mock");
        mock.expect_get_configuration()
            .returning(|| ConfigBlock::new().with("gain", 1));
        mock.expect_check_configuration().returning(|c| c.has("gain"));
        mock.expect_set_configuration().times(1).returning(|_| Ok(()));
        mock.expect_segment().returning(|image| Ok(image.clone()));
        Box::new(mock)
    });
    registry
}
