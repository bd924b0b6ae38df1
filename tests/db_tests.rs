/// Storage tests covering the tag upsert invariant and reading history

use chrono::Local;
use rfid_tag_reader::core::db::{RecordOutcome, TagDatabase};
use rfid_tag_reader::core::tags::{signal_percent, TagRead};
use tempfile::TempDir;

fn sample_read(tag_id: &str, rssi: u8) -> TagRead {
    TagRead {
        tag_id: tag_id.to_string(),
        tag_type: 0x04,
        antenna: 0x01,
        rssi,
        rssi_percent: signal_percent(rssi),
        timestamp: Local::now(),
        reader_id: "default".to_string(),
    }
}

#[test]
fn test_first_read_inserts_new_tag() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    let outcome = db.record_read(&sample_read("E2003412", 0x90)).unwrap();
    assert_eq!(outcome, RecordOutcome::New);
    assert_eq!(db.tag_count().unwrap(), 1);

    let tags = db.all_tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].tag_id, "E2003412");
    assert_eq!(tags[0].first_seen, tags[0].last_seen);
    assert_eq!(tags[0].reader_id, "default");
}

#[test]
fn test_repeated_read_updates_instead_of_duplicating() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    let first = sample_read("E2003412", 0x85);
    db.record_read(&first).unwrap();

    let mut second = sample_read("E2003412", 0xA0);
    second.timestamp = first.timestamp + chrono::Duration::milliseconds(250);

    let outcome = db.record_read(&second).unwrap();
    assert_eq!(outcome, RecordOutcome::Updated);
    assert_eq!(db.tag_count().unwrap(), 1);

    let tags = db.all_tags().unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].first_seen, first.timestamp_string());
    assert_eq!(tags[0].last_seen, second.timestamp_string());
    assert_eq!(tags[0].rssi, 0xA0);
    assert_eq!(tags[0].rssi_percent, 100.0);
}

#[test]
fn test_every_read_appends_a_reading_row() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    db.record_read(&sample_read("AABB", 0x85)).unwrap();
    db.record_read(&sample_read("AABB", 0x90)).unwrap();
    db.record_read(&sample_read("CCDD", 0x95)).unwrap();

    let readings = db.readings_for("AABB", 10).unwrap();
    assert_eq!(readings.len(), 2);
    // Newest first
    assert_eq!(readings[0].rssi, 0x90);
    assert_eq!(readings[1].rssi, 0x85);

    assert_eq!(db.readings_for("CCDD", 10).unwrap().len(), 1);
    assert!(db.readings_for("UNKNOWN", 10).unwrap().is_empty());
}

#[test]
fn test_readings_limit() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    for rssi in 0x82u8..0x8C {
        db.record_read(&sample_read("AABB", rssi)).unwrap();
    }
    assert_eq!(db.readings_for("AABB", 3).unwrap().len(), 3);
}

#[test]
fn test_tags_ordered_by_last_seen_descending() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    let base = Local::now();
    let mut older = sample_read("OLDER", 0x90);
    older.timestamp = base;
    let mut newer = sample_read("NEWER", 0x90);
    newer.timestamp = base + chrono::Duration::seconds(5);

    db.record_read(&older).unwrap();
    db.record_read(&newer).unwrap();

    let tags = db.all_tags().unwrap();
    assert_eq!(tags[0].tag_id, "NEWER");
    assert_eq!(tags[1].tag_id, "OLDER");
}

#[test]
fn test_clear_removes_tags_and_readings() {
    let mut db = TagDatabase::open_in_memory().unwrap();

    db.record_read(&sample_read("AABB", 0x90)).unwrap();
    db.record_read(&sample_read("CCDD", 0x95)).unwrap();
    assert_eq!(db.tag_count().unwrap(), 2);

    db.clear().unwrap();
    assert_eq!(db.tag_count().unwrap(), 0);
    assert!(db.all_tags().unwrap().is_empty());
    assert!(db.readings_for("AABB", 10).unwrap().is_empty());
}

#[test]
fn test_export_json_round_trips() {
    let mut db = TagDatabase::open_in_memory().unwrap();
    db.record_read(&sample_read("E2003412", 0x90)).unwrap();

    let json = db.export_json().unwrap();
    assert!(json.contains("E2003412"));

    let parsed: Vec<rfid_tag_reader::TagRecord> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].tag_id, "E2003412");
}

#[test]
fn test_database_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tags.db");

    {
        let mut db = TagDatabase::open(&path).unwrap();
        db.record_read(&sample_read("E2003412", 0x90)).unwrap();
    }

    let db = TagDatabase::open(&path).unwrap();
    assert_eq!(db.tag_count().unwrap(), 1);
    assert_eq!(db.all_tags().unwrap()[0].tag_id, "E2003412");
}
