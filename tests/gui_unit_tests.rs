/// Unit tests for the display formatting the GUI relies on, without window creation

use chrono::Local;
use rfid_tag_reader::core::db::TagRecord;
use rfid_tag_reader::core::tags::{signal_percent, TagPacket, TagRead};
use rfid_tag_reader::core::utils::format_hex_spaced;
use rfid_tag_reader::core::poller::ReaderEvent;

#[test]
fn test_tag_read_display_fields() {
    let packet = TagPacket {
        tag_type: 0x04,
        antenna: 0x02,
        id: vec![0xE2, 0x00, 0x34, 0x12, 0x88, 0x99],
        rssi: 0x91,
    };
    let read = TagRead::from_packet(&packet, "default");

    // Tag id is rendered as plain uppercase hex, no separators
    assert_eq!(read.tag_id, "E20034128899");
    assert!(!read.tag_id.contains(' '));

    // Signal display is the rescaled percentage with one decimal
    let percent = signal_percent(0x91);
    assert_eq!(read.signal_display(), format!("{percent:.1}%"));

    // Timestamp carries millisecond precision for the latest-read panel
    let ts = read.timestamp_string();
    assert_eq!(ts.len(), "2025-01-01 00:00:00.000".len());
}

#[test]
fn test_tag_record_signal_column() {
    let record = TagRecord {
        tag_id: "E2003412".to_string(),
        first_seen: "2025-01-01 10:00:00.000".to_string(),
        last_seen: "2025-01-01 10:05:00.000".to_string(),
        rssi: 0xA0,
        rssi_percent: 100.0,
        antenna: 1,
        reader_id: "default".to_string(),
    };

    assert_eq!(format!("{:.1}%", record.rssi_percent), "100.0%");
    assert!(record.first_seen < record.last_seen);
}

#[test]
fn test_reader_events_carry_display_data() {
    let read = TagRead {
        tag_id: "AABB".to_string(),
        tag_type: 0x04,
        antenna: 0x01,
        rssi: 0x90,
        rssi_percent: signal_percent(0x90),
        timestamp: Local::now(),
        reader_id: "default".to_string(),
    };

    let event = ReaderEvent::NewTag(read.clone());
    match event {
        ReaderEvent::NewTag(inner) => {
            assert_eq!(inner.tag_id, read.tag_id);
            assert_eq!(inner.signal_display(), read.signal_display());
        }
        _ => panic!("Expected NewTag event"),
    }

    match ReaderEvent::Status("Reader connected".to_string()) {
        ReaderEvent::Status(message) => assert_eq!(message, "Reader connected"),
        _ => panic!("Expected Status event"),
    }
}

#[test]
fn test_raw_packet_logging_format() {
    // The driver logs raw packet bytes in spaced hex for debugging
    assert_eq!(format_hex_spaced(&[0xE2, 0x00, 0x34]), "E2 00 34");
}
