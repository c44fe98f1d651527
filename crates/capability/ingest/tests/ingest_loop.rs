use domain::LinkStatus;
use lora_dedup::RecencyFilter;
use lora_ingest::{IngestConfig, IngestError, IngestLoop, IterationOutcome};
use lora_publish::{MemoryPublisher, RetryPolicy};
use lora_radio::{RadioError, ScriptedLink};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn config() -> IngestConfig {
    IngestConfig {
        topic: "targets/hits".to_string(),
        retry: RetryPolicy {
            ack_timeout: Some(Duration::from_millis(100)),
            max_retries: 1,
            backoff: Duration::from_millis(10),
        },
        header_error_pause: Duration::from_secs(2),
    }
}

fn ingest(
    link: ScriptedLink,
    publisher: Arc<MemoryPublisher>,
) -> IngestLoop<ScriptedLink> {
    IngestLoop::new(link, RecencyFilter::new(10), publisher, config())
}

#[tokio::test]
async fn noisy_frame_is_extracted_enriched_and_published() {
    let link = ScriptedLink::new().with_frame("noise{\"id\":\"a1\"}trailing{bad", -57.0, 7.5);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    let outcome = ingest.run_once().await.expect("iteration");
    assert_eq!(
        outcome,
        IterationOutcome::Published {
            id: "a1".to_string(),
            attempts: 1
        }
    );

    let published = publisher.published().await;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].topic, "targets/hits");
    let body = published[0].json().expect("json");
    assert_eq!(body["id"], json!("a1"));
    assert_eq!(body["rssi"], json!(-57.0));
    assert_eq!(body["snr"], json!(7.5));
    assert!(body["timestamp"].as_f64().expect("timestamp") > 1_600_000_000.0);
    assert_eq!(body.as_object().expect("object").len(), 4);
}

#[tokio::test]
async fn duplicate_id_is_published_once() {
    let frame = r#"{"id":"a1","command":"status"}"#;
    let link = ScriptedLink::new()
        .with_frame(frame, -60.0, 5.0)
        .with_frame(frame, -61.0, 4.0);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    assert!(matches!(
        ingest.run_once().await.expect("first"),
        IterationOutcome::Published { .. }
    ));
    assert_eq!(
        ingest.run_once().await.expect("second"),
        IterationOutcome::Duplicate {
            id: "a1".to_string()
        }
    );
    assert_eq!(publisher.published().await.len(), 1);
    assert_eq!(ingest.filter().len(), 1);
}

#[tokio::test]
async fn frames_without_delimiters_are_skipped() {
    let link = ScriptedLink::new()
        .with_frame("no json here", -70.0, 1.0)
        .with_frame("{\"id\":\"a1\"", -70.0, 1.0)
        .with_frame("\"id\":\"a1\"}", -70.0, 1.0);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    for _ in 0..3 {
        assert_eq!(
            ingest.run_once().await.expect("iteration"),
            IterationOutcome::NoJson
        );
    }
    assert!(publisher.published().await.is_empty());
    assert!(ingest.filter().is_empty());
}

#[tokio::test]
async fn malformed_json_is_not_published() {
    let link = ScriptedLink::new()
        .with_frame(r#"{"id": }"#, -70.0, 1.0)
        .with_frame("[{\"id\":\"a1\"}]", -70.0, 1.0);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    assert_eq!(
        ingest.run_once().await.expect("iteration"),
        IterationOutcome::DecodeError
    );
    // 截取结果 `{"id":"a1"}` 为合法对象
    assert!(matches!(
        ingest.run_once().await.expect("iteration"),
        IterationOutcome::Published { .. }
    ));
    assert_eq!(publisher.published().await.len(), 1);
}

#[tokio::test]
async fn missing_or_non_string_id_is_skipped() {
    let link = ScriptedLink::new()
        .with_frame(r#"{"command":"status"}"#, -70.0, 1.0)
        .with_frame(r#"{"id":42}"#, -70.0, 1.0);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    assert_eq!(ingest.run_once().await.expect("first"), IterationOutcome::MissingId);
    assert_eq!(ingest.run_once().await.expect("second"), IterationOutcome::MissingId);
    assert!(publisher.published().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn header_error_pauses_before_next_iteration() {
    let link = ScriptedLink::new()
        .with_status(LinkStatus::HeaderError)
        .with_status(LinkStatus::CrcError);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    let started = tokio::time::Instant::now();
    assert_eq!(ingest.run_once().await.expect("header"), IterationOutcome::NoJson);
    assert!(started.elapsed() >= Duration::from_secs(2));

    let started = tokio::time::Instant::now();
    assert_eq!(ingest.run_once().await.expect("crc"), IterationOutcome::NoJson);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(publisher.published().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unacknowledged_publish_is_dropped_after_retries() {
    let link = ScriptedLink::new()
        .with_frame(r#"{"id":"a1"}"#, -70.0, 1.0)
        .with_frame(r#"{"id":"a2"}"#, -70.0, 1.0);
    // 两次提交（首次 + 1 次重试）均无确认
    let publisher = Arc::new(MemoryPublisher::withholding_first(2));
    let mut ingest = ingest(link, publisher.clone());

    assert_eq!(
        ingest.run_once().await.expect("first"),
        IterationOutcome::PublishFailed {
            id: "a1".to_string()
        }
    );
    assert_eq!(
        ingest.run_once().await.expect("second"),
        IterationOutcome::Published {
            id: "a2".to_string(),
            attempts: 1
        }
    );
    assert_eq!(publisher.published().await.len(), 3);
}

#[tokio::test]
async fn run_stops_when_radio_link_closes() {
    let link = ScriptedLink::new()
        .with_frame(r#"{"id":"a1"}"#, -70.0, 1.0)
        .with_frame(r#"{"id":"a2"}"#, -70.0, 1.0);
    let publisher = Arc::new(MemoryPublisher::new());
    let mut ingest = ingest(link, publisher.clone());

    let err = ingest.run().await.expect_err("link closed");
    assert!(matches!(err, IngestError::Radio(RadioError::Closed)));
    assert_eq!(publisher.published().await.len(), 2);
    assert_eq!(ingest.link().remaining(), 0);
}
