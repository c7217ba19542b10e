//! Graph assembly, validation and configuration

mod common;

use common::builders::{adder, counting_source, recorder, relay, typed_sink, NUMBER, TEXT};
use procflow::config::ConfigBlock;
use procflow::pipeline::{
    ImageSegmentorProcess, Pipeline, PipelineError, PortSet, ProcessState, TypeTag,
};

#[test]
fn test_missing_required_connection_then_revalidate() {
    let mut pipeline = Pipeline::new();
    let (sink, _) = recorder("sink");
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline.add_process(sink).unwrap();

    let err = pipeline.validate().unwrap_err();
    assert_eq!(
        err,
        PipelineError::MissingRequiredConnection {
            process: "sink".into(),
            port: "in".into(),
        }
    );
    assert!(!pipeline.is_validated());

    // The optional `extra` input may stay unconnected.
    pipeline.connect("src", "out", "sink", "in").unwrap();
    pipeline.validate().unwrap();
    assert!(pipeline.is_validated());
}

#[test]
fn test_type_mismatch_creates_no_edge() {
    let mut pipeline = Pipeline::new();
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline.add_process(typed_sink("text_sink", TEXT)).unwrap();

    let err = pipeline.connect("src", "out", "text_sink", "in").unwrap_err();
    match err {
        PipelineError::TypeMismatch {
            src_type, dst_type, ..
        } => {
            assert_eq!(src_type, NUMBER);
            assert_eq!(dst_type, TEXT);
        }
        other => panic!("expected TypeMismatch, got {:?}", other),
    }
    assert!(err_is_structural(&pipeline.connect("src", "out", "text_sink", "in")));
    assert!(pipeline.edges().is_empty());
    assert_eq!(pipeline.output_edge_count("src", "out").unwrap(), 0);
}

fn err_is_structural<T>(result: &Result<T, PipelineError>) -> bool {
    result.as_ref().err().is_some_and(PipelineError::is_structural)
}

#[test]
fn test_structural_errors() {
    let mut pipeline = Pipeline::new();
    let (sink, _) = recorder("sink");
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline.add_process(sink).unwrap();

    assert_eq!(
        pipeline.add_process(relay("src")).unwrap_err(),
        PipelineError::DuplicateName("src".into())
    );
    assert_eq!(
        pipeline.connect("nope", "out", "sink", "in").unwrap_err(),
        PipelineError::UnknownProcess("nope".into())
    );
    // `out` exists but is not an input.
    assert!(matches!(
        pipeline.connect("src", "out", "src", "out").unwrap_err(),
        PipelineError::UnknownPort { ref port, direction: "input", .. } if port == "out"
    ));

    pipeline.connect("src", "out", "sink", "in").unwrap();
    assert_eq!(
        pipeline.connect("src", "out", "sink", "in").unwrap_err(),
        PipelineError::PortAlreadyConnected {
            process: "sink".into(),
            port: "in".into(),
        }
    );
    assert_eq!(pipeline.edges().len(), 1);
}

#[test]
fn test_duplicate_port_declaration() {
    let mut ports = PortSet::new("proc");
    ports.declare_input("value", NUMBER, true).unwrap();
    let err = ports
        .declare_output("value", TypeTag::new("other"), false)
        .unwrap_err();
    assert_eq!(
        err,
        PipelineError::DuplicatePort {
            process: "proc".into(),
            port: "value".into(),
        }
    );
    assert_eq!(ports.len(), 1);
}

#[test]
fn test_introspection() {
    let mut pipeline = Pipeline::new();
    let (a, _) = recorder("a");
    let (b, _) = recorder("b");
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline.add_process(adder("inc", 1)).unwrap();
    pipeline.add_process(a).unwrap();
    pipeline.add_process(b).unwrap();
    pipeline.connect("src", "out", "inc", "in").unwrap();
    pipeline.connect_with_capacity("inc", "out", "a", "in", Some(2)).unwrap();
    pipeline.connect_with_capacity("inc", "out", "b", "in", None).unwrap();

    assert_eq!(pipeline.process_names(), ["src", "inc", "a", "b"]);
    assert_eq!(pipeline.len(), 4);
    assert_eq!(pipeline.output_edge_count("inc", "out").unwrap(), 2);
    assert_eq!(pipeline.state("a").unwrap(), ProcessState::Constructed);

    let inputs: Vec<_> = pipeline
        .ports("a")
        .unwrap()
        .inputs()
        .map(|(_, p)| (p.name.clone(), p.required))
        .collect();
    assert_eq!(inputs, [("in".to_string(), true), ("extra".to_string(), false)]);

    let edges = pipeline.edges();
    assert_eq!(edges.len(), 3);
    assert_eq!(
        (edges[1].from_process.as_str(), edges[1].to_process.as_str()),
        ("inc", "a")
    );
    assert_eq!(edges[1].capacity, Some(2));
    assert_eq!(edges[2].capacity, None);
    assert_eq!(edges[0].capacity, Some(procflow::config::DEFAULT_EDGE_CAPACITY));
}

#[test]
fn test_second_configure_is_invalid_state() {
    let mut pipeline = Pipeline::new();
    let (sink, _) = recorder("sink");
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline.add_process(sink).unwrap();
    pipeline.connect("src", "out", "sink", "in").unwrap();
    pipeline.prepare().unwrap();
    assert_eq!(pipeline.state("src").unwrap(), ProcessState::Configured);

    let err = pipeline.configure("src").unwrap_err();
    assert_eq!(
        err,
        PipelineError::InvalidState {
            process: "src".into(),
            state: ProcessState::Configured,
            operation: "configure",
        }
    );
    // configure_all leaves configured processes alone.
    pipeline.configure_all().unwrap();
}

#[test]
fn test_configuration_error_names_process() {
    let mut pipeline = Pipeline::new();
    pipeline.add_process(counting_source("src", 1)).unwrap();
    pipeline
        .add_process(
            ImageSegmentorProcess::new(
                "seg",
                ConfigBlock::new().with("segmentor:type", "does_not_exist"),
            )
            .unwrap(),
        )
        .unwrap();

    let err = pipeline.configure_all().unwrap_err();
    match err {
        PipelineError::Configuration { process, message } => {
            assert_eq!(process, "seg");
            assert!(message.starts_with("Unable to create image_segmentor"));
            assert!(message.contains("does_not_exist"));
        }
        other => panic!("expected Configuration, got {:?}", other),
    }
    assert_eq!(pipeline.state("src").unwrap(), ProcessState::Configured);
    assert_eq!(pipeline.state("seg").unwrap(), ProcessState::Failed);
}

#[test]
fn test_run_requires_validation() {
    let mut pipeline = Pipeline::new();
    pipeline.add_process(counting_source("src", 1)).unwrap();
    let err = procflow::Scheduler::cooperative()
        .run(&mut pipeline)
        .unwrap_err();
    assert_eq!(err, PipelineError::NotValidated);

    pipeline.validate().unwrap();
    let err = procflow::Scheduler::cooperative()
        .run(&mut pipeline)
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidState { operation: "run", .. }));
}
