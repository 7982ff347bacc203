use chrono::NaiveDateTime;

use super::*;

#[test]
fn weak_topic_display() {
    let one = WeakTopic {
        topic: "Sequence Models".to_string(),
        mistake_count: 1,
    };
    let many = WeakTopic {
        topic: "Supervised ML".to_string(),
        mistake_count: 5,
    };

    assert_eq!(one.to_string(), "Sequence Models (1 mistake)");
    assert_eq!(many.to_string(), "Supervised ML (5 mistakes)");
}

#[test]
fn timestamp_format_round_trips() {
    let parsed = NaiveDateTime::parse_from_str("2024-03-01 09:15:00", TIMESTAMP_FORMAT)
        .expect("timestamp should parse");
    assert_eq!(
        parsed.format(TIMESTAMP_FORMAT).to_string(),
        "2024-03-01 09:15:00"
    );
}
