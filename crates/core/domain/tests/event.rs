use domain::{EnrichedEvent, Event, EventError, LinkQuality, LinkStatus, RawFrame};
use serde_json::{Value, json};

#[test]
fn event_requires_string_id() {
    let event = Event::from_value(json!({"id": "a1", "command": "status"})).expect("event");
    assert_eq!(event.id, "a1");
    assert_eq!(event.fields.get("command"), Some(&json!("status")));
    assert!(!event.fields.contains_key("id"));

    let err = Event::from_value(json!({"command": "status"})).expect_err("missing id");
    assert_eq!(err, EventError::MissingId("id"));
    let err = Event::from_value(json!({"id": 7})).expect_err("numeric id");
    assert_eq!(err, EventError::MissingId("id"));
    let err = Event::from_value(json!(["id", "a1"])).expect_err("array");
    assert_eq!(err, EventError::NotAnObject);
}

#[test]
fn enriched_event_round_trips_with_derived_fields() {
    let event = Event::from_value(json!({"id": "a1", "command": "status", "count": 3}))
        .expect("event");
    let enriched = event.enrich(
        LinkQuality {
            rssi: -42.0,
            snr: 9.25,
        },
        1_700_000_000.5,
    );
    assert_eq!(enriched.id(), "a1");

    let payload = enriched.to_payload().expect("payload");
    let value: Value = serde_json::from_slice(&payload).expect("json");
    let object = value.as_object().expect("object");
    let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["command", "count", "id", "rssi", "snr", "timestamp"]);
    assert!(object["rssi"].is_f64());
    assert!(object["snr"].is_f64());
    assert!(object["timestamp"].is_f64());
    assert_eq!(object["count"], json!(3));

    let decoded: EnrichedEvent = serde_json::from_slice(&payload).expect("decoded");
    assert_eq!(decoded, enriched);
    assert_eq!(decoded.event.fields.len(), 2);
}

#[test]
fn enrich_overwrites_inbound_derived_keys() {
    let event = Event::from_value(json!({"id": "a1", "rssi": "spoofed"})).expect("event");
    let enriched = event.enrich(LinkQuality { rssi: -80.0, snr: 1.0 }, 1.0);
    let value: Value = serde_json::from_slice(&enriched.to_payload().expect("payload"))
        .expect("json");
    assert_eq!(value["rssi"], json!(-80.0));
    assert!(enriched.event.fields.is_empty());
}

#[test]
fn raw_frame_text_is_lossy() {
    let frame = RawFrame::new(vec![b'{', 0xff, b'}']);
    assert_eq!(frame.len(), 3);
    assert_eq!(frame.text(), "{\u{fffd}}");
    assert_eq!(LinkStatus::default(), LinkStatus::Ok);
    assert_eq!(LinkStatus::HeaderError.as_str(), "header_error");
}
