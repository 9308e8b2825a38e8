//! Property-style checks for the two pipeline invariants spec §8 calls out
//! explicitly: masking idempotence and the bindings-merge law across
//! multiple generations of child loggers.

use std::sync::Arc;
use std::time::Duration;

use logforge::context::matrix::matrix_from;
use logforge::masking::{MaskRule, MaskStrategy, MaskingEngine};
use logforge::sink::CaptureSink;
use logforge::value::Record;
use logforge::{context, Level, LoggerConfig};
use serde_json::json;

#[tokio::test]
async fn masking_a_record_twice_is_the_same_as_masking_it_once() {
    let engine = MaskingEngine::with_defaults();
    engine.add_rule(MaskRule::literal("ssn", MaskStrategy::Full));
    engine.add_rule(MaskRule::literal(
        "cardNumber",
        MaskStrategy::Partial { show_last: 4 },
    ));
    engine.add_rule(MaskRule::literal("pin", MaskStrategy::PreserveLength));

    let mut record = Record::new();
    record.insert("ssn".into(), json!("123-45-6789"));
    record.insert("cardNumber".into(), json!("4111111111111111"));
    record.insert("pin".into(), json!("7890"));
    record.insert(
        "nested".into(),
        json!({"ssn": "000-00-0000", "unrelated": "kept"}),
    );

    let once = engine.apply(record);
    let twice = engine.apply(once.clone());
    assert_eq!(once, twice);
}

#[tokio::test]
async fn bindings_accumulate_through_three_generations_with_the_latest_winning() {
    let capture = Arc::new(CaptureSink::new(Level::Trace));
    let mut config = LoggerConfig::new("orders");
    config.sinks.push(capture.clone());
    let root = config.build().unwrap();

    let mut gen1 = Record::new();
    gen1.insert("region".into(), json!("us-east"));
    gen1.insert("component".into(), json!("root"));
    let service = root.child(gen1);

    let mut gen2 = Record::new();
    gen2.insert("component".into(), json!("worker"));
    let worker = service.child(gen2);

    let mut gen3 = Record::new();
    gen3.insert("jobId".into(), json!("job-9"));
    let job = worker.child(gen3);

    job.info("processing").await;

    for _ in 0..100 {
        if !capture.entries().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let entry = &capture.entries()[0];
    assert_eq!(entry["region"], json!("us-east"));
    assert_eq!(entry["component"], json!("worker"));
    assert_eq!(entry["jobId"], json!("job-9"));
}

#[tokio::test]
#[serial_test::serial(context_globals)]
async fn the_logging_matrix_restricts_different_levels_independently() {
    let capture = Arc::new(CaptureSink::new(Level::Trace));
    let mut config = LoggerConfig::new("orders");
    config.sinks.push(capture.clone());
    config.logging_matrix = Some(matrix_from(vec![
        (Level::Info, vec!["userId".to_string()]),
        (Level::Error, vec!["userId".to_string(), "stack".to_string()]),
    ]));
    let logger = config.build().unwrap();

    context::run_scoped(Record::new(), async {
        context::set_correlation_id("req-1");
        let mut extra = Record::new();
        extra.insert("userId".into(), json!(7));
        extra.insert("stack".into(), json!("trace..."));
        context::run_nested(extra, async {
            logger.info("info event").await;
            logger.error("error event").await;
        })
        .await;
    })
    .await;

    for _ in 0..100 {
        if capture.entries().len() >= 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    let entries = capture.entries();
    let info_entry = entries.iter().find(|e| e["level"] == json!("info")).unwrap();
    let error_entry = entries.iter().find(|e| e["level"] == json!("error")).unwrap();

    assert!(info_entry.contains_key("userId"));
    assert!(!info_entry.contains_key("stack"));
    assert!(!info_entry.contains_key("correlationId"));

    assert!(error_entry.contains_key("userId"));
    assert!(error_entry.contains_key("stack"));

    context::configure_matrix(None);
}

