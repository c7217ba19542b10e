//! Running pipelines under both scheduling strategies

mod common;

use common::builders::{
    counting_source, double_completer, linear_pipeline, recorder, relay, zip, EngineConfigBuilder,
};
use procflow::pipeline::{DatumKind, Pipeline, PipelineError, ProcessState};
use procflow::{Scheduler, SchedulerKind};

const STRATEGIES: [SchedulerKind; 2] = [SchedulerKind::Cooperative, SchedulerKind::Threaded];

fn source_to_sink(count: u32) -> (Pipeline, common::builders::Recording) {
    let mut pipeline = Pipeline::new();
    let (sink, recording) = recorder("sink");
    pipeline.add_process(counting_source("src", count)).unwrap();
    pipeline.add_process(sink).unwrap();
    pipeline.connect("src", "out", "sink", "in").unwrap();
    pipeline.prepare().unwrap();
    (pipeline, recording)
}

#[test]
fn test_source_to_sink_step_counts() {
    for strategy in STRATEGIES {
        let (mut pipeline, recording) = source_to_sink(3);
        let report = Scheduler::new(strategy).run(&mut pipeline).unwrap();

        assert_eq!(recording.values(), [0, 1, 2], "{:?}", strategy);
        assert_eq!(report.steps_of("sink"), Some(4), "{:?}", strategy);
        assert_eq!(report.steps_of("src"), Some(4), "{:?}", strategy);
        assert_eq!(report.total_steps, 8);
        assert_eq!(report.strategy, strategy);
        assert!(report.all_complete());
        assert_eq!(pipeline.state("sink").unwrap(), ProcessState::Complete);
    }
}

#[test]
fn test_unconnected_optional_input_yields_empty() {
    for strategy in STRATEGIES {
        let (mut pipeline, recording) = source_to_sink(2);
        Scheduler::new(strategy).run(&mut pipeline).unwrap();
        assert_eq!(recording.optional_kinds(), [DatumKind::Empty; 3]);
    }
}

#[test]
fn test_fan_out_broadcasts_in_order() {
    for strategy in STRATEGIES {
        let mut pipeline = Pipeline::new();
        let (left, left_seen) = recorder("left");
        let (right, right_seen) = recorder("right");
        pipeline.add_process(counting_source("src", 20)).unwrap();
        pipeline.add_process(left).unwrap();
        pipeline.add_process(right).unwrap();
        pipeline
            .connect_with_capacity("src", "out", "left", "in", Some(1))
            .unwrap();
        pipeline
            .connect_with_capacity("src", "out", "right", "in", Some(4))
            .unwrap();
        pipeline.prepare().unwrap();

        Scheduler::new(strategy).run(&mut pipeline).unwrap();

        let expected: Vec<u32> = (0..20).collect();
        assert_eq!(left_seen.values(), expected);
        assert_eq!(right_seen.values(), expected);
    }
}

#[test]
fn test_strategies_produce_identical_output() {
    let values: Vec<u32> = (0..200).map(|i| i * 7 % 31).collect();
    let mut outputs = Vec::new();
    for strategy in STRATEGIES {
        let config = EngineConfigBuilder::new()
            .strategy(strategy)
            .capacity(2)
            .build();
        let (mut pipeline, recording) = linear_pipeline(&config, &values);
        let report = Scheduler::from_config(&config).run(&mut pipeline).unwrap();
        assert_eq!(report.strategy, strategy);
        outputs.push(recording.values());
    }
    let expected: Vec<u32> = values.iter().map(|v| v + 1).collect();
    assert_eq!(outputs[0], expected);
    assert_eq!(outputs[0], outputs[1]);
}

#[test]
fn test_cooperative_backpressure_respects_capacity() {
    let config = EngineConfigBuilder::new().capacity(1).build();
    let values: Vec<u32> = (0..25).collect();
    let (mut pipeline, recording) = linear_pipeline(&config, &values);
    Scheduler::cooperative().run(&mut pipeline).unwrap();

    assert_eq!(recording.values().len(), 25);
    for edge in pipeline.edges() {
        assert_eq!(edge.stats.high_water, 1, "{} -> {}", edge.from_process, edge.to_process);
        // 25 values and one end-of-stream marker.
        assert_eq!(edge.stats.pushed, 26);
        assert_eq!(edge.stats.pulled, 25);
    }
}

#[test]
fn test_cycle_without_seed_deadlocks() {
    let mut pipeline = Pipeline::new();
    pipeline.add_process(relay("a")).unwrap();
    pipeline.add_process(relay("b")).unwrap();
    pipeline.connect("a", "out", "b", "in").unwrap();
    pipeline.connect("b", "out", "a", "in").unwrap();
    pipeline.prepare().unwrap();

    assert!(pipeline.compile().has_cycle());
    let err = Scheduler::cooperative().run(&mut pipeline).unwrap_err();
    assert_eq!(
        err,
        PipelineError::Deadlock {
            stalled: vec!["a".into(), "b".into()],
        }
    );
}

#[test]
fn test_step_limit() {
    for strategy in STRATEGIES {
        let config = EngineConfigBuilder::new()
            .strategy(strategy)
            .max_steps(5)
            .build();
        let (mut pipeline, _) = linear_pipeline(&config, &[1; 50]);
        let err = Scheduler::from_config(&config)
            .run(&mut pipeline)
            .unwrap_err();
        assert_eq!(err, PipelineError::StepLimitExceeded(5), "{:?}", strategy);
    }
}

#[test]
fn test_shorter_required_input_ends_process() {
    for strategy in STRATEGIES {
        let mut pipeline = Pipeline::new();
        let (sink, recording) = recorder("sink");
        pipeline.add_process(counting_source("short", 2)).unwrap();
        pipeline.add_process(counting_source("long", 6)).unwrap();
        pipeline.add_process(zip("zip")).unwrap();
        pipeline.add_process(sink).unwrap();
        pipeline.connect("short", "out", "zip", "a").unwrap();
        pipeline.connect("long", "out", "zip", "b").unwrap();
        pipeline.connect("zip", "out", "sink", "in").unwrap();
        pipeline.prepare().unwrap();

        let report = Scheduler::new(strategy).run(&mut pipeline).unwrap();

        assert_eq!(recording.values(), [0, 2], "{:?}", strategy);
        // Two pairs, then the step that sees `a` complete.
        assert_eq!(report.steps_of("zip"), Some(3), "{:?}", strategy);
        assert_eq!(pipeline.state("zip").unwrap(), ProcessState::Complete);
        assert!(report.all_complete(), "{:?}", strategy);
    }
}

#[test]
fn test_complete_delivered_once() {
    let mut pipeline = Pipeline::new();
    let (sink, recording) = recorder("sink");
    pipeline.add_process(double_completer("src")).unwrap();
    pipeline.add_process(sink).unwrap();
    let edge = pipeline.connect("src", "out", "sink", "in").unwrap();
    pipeline.prepare().unwrap();

    let report = Scheduler::cooperative().run(&mut pipeline).unwrap();
    assert_eq!(recording.values(), [7]);
    assert_eq!(report.steps_of("src"), Some(1));
    assert_eq!(report.steps_of("sink"), Some(2));
    let stats = pipeline.edge(edge).unwrap().stats();
    assert_eq!(stats.pushed, 2);
}

#[test]
fn test_abort_before_run() {
    for strategy in STRATEGIES {
        let (mut pipeline, recording) = source_to_sink(5);
        pipeline.abort_handle().abort();
        let err = Scheduler::new(strategy).run(&mut pipeline).unwrap_err();
        assert_eq!(err, PipelineError::Aborted, "{:?}", strategy);
        assert!(recording.values().is_empty());
    }
}

#[test]
fn test_abort_from_another_thread_stops_threaded_run() {
    // A cycle never finishes on its own under the threaded strategy.
    let mut pipeline = Pipeline::new();
    pipeline.add_process(relay("a")).unwrap();
    pipeline.add_process(relay("b")).unwrap();
    pipeline.connect("a", "out", "b", "in").unwrap();
    pipeline.connect("b", "out", "a", "in").unwrap();
    pipeline.prepare().unwrap();

    let abort = pipeline.abort_handle();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(common::settle_time());
        abort.abort();
    });
    let err = Scheduler::threaded().run(&mut pipeline).unwrap_err();
    canceller.join().unwrap();
    assert_eq!(err, PipelineError::Aborted);
}

#[test]
fn test_report_serializes() {
    let (mut pipeline, _) = source_to_sink(1);
    let report = Scheduler::cooperative().run(&mut pipeline).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["strategy"], "cooperative");
    assert_eq!(json["processes"][1]["name"], "sink");
    assert_eq!(json["processes"][1]["state"], "complete");
}
