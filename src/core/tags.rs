use crate::core::utils::{format_hex, format_hex_spaced};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Raw RSSI value the vendor driver reports at the low end of its range
pub const RSSI_MIN: u8 = 0x82;
/// Raw RSSI value the vendor driver reports at the high end of its range
pub const RSSI_MAX: u8 = 0xA0;

/// Timestamp format used for display and storage
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Map a raw RSSI byte onto a 0-100% scale.
///
/// The vendor reports signal strength as a byte in the [0x82, 0xA0] range.
/// Values below the minimum map to 0, values above the maximum clamp to 100,
/// and the mapping is linear in between.
pub fn signal_percent(rssi: u8) -> f32 {
    if rssi <= RSSI_MIN {
        return 0.0;
    }
    if rssi >= RSSI_MAX {
        return 100.0;
    }
    let span = (RSSI_MAX - RSSI_MIN) as f32;
    ((rssi - RSSI_MIN) as f32 / span) * 100.0
}

/// One tag packet as unpacked from the driver's tag buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPacket {
    pub tag_type: u8,
    pub antenna: u8,
    pub id: Vec<u8>,
    pub rssi: u8,
}

/// Unpack tag packets from the driver's tag buffer.
///
/// The buffer holds `tag_count` consecutive packets, each laid out as
/// `[pack_len][tag_type][antenna][id bytes...][rssi]` where `pack_len` counts
/// the bytes that follow it. The tag id occupies body offsets `2..pack_len-1`.
/// Malformed or truncated packets are logged and skipped.
pub fn parse_tag_buffer(buffer: &[u8], tag_count: usize) -> Vec<TagPacket> {
    let mut packets = Vec::with_capacity(tag_count);
    let mut offset = 0usize;

    for index in 0..tag_count {
        if offset >= buffer.len() {
            log::warn!(
                "Tag buffer exhausted at packet {} of {}",
                index + 1,
                tag_count
            );
            break;
        }

        let pack_len = buffer[offset] as usize;
        // A packet needs at least type, antenna and rssi bytes
        if pack_len < 3 || offset + pack_len >= buffer.len() {
            log::warn!(
                "Skipping malformed tag packet {} (pack_len={}, offset={})",
                index + 1,
                pack_len,
                offset
            );
            break;
        }

        let body = &buffer[offset + 1..offset + 1 + pack_len];
        log::debug!(
            "Tag packet {} raw: {}",
            index + 1,
            format_hex_spaced(&buffer[offset..offset + 1 + pack_len])
        );
        packets.push(TagPacket {
            tag_type: body[0],
            antenna: body[1],
            id: body[2..pack_len - 1].to_vec(),
            rssi: body[pack_len - 1],
        });

        offset += pack_len + 1;
    }

    packets
}

/// A normalized tag reading ready for storage and display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagRead {
    pub tag_id: String,
    pub tag_type: u8,
    pub antenna: u8,
    pub rssi: u8,
    pub rssi_percent: f32,
    pub timestamp: DateTime<Local>,
    pub reader_id: String,
}

impl TagRead {
    /// Normalize a raw tag packet into a reading stamped with the current time
    pub fn from_packet(packet: &TagPacket, reader_id: &str) -> Self {
        Self {
            tag_id: format_hex(&packet.id),
            tag_type: packet.tag_type,
            antenna: packet.antenna,
            rssi: packet.rssi,
            rssi_percent: signal_percent(packet.rssi),
            timestamp: Local::now(),
            reader_id: reader_id.to_string(),
        }
    }

    /// Timestamp formatted for storage and display
    pub fn timestamp_string(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Signal strength formatted as a percentage string
    pub fn signal_display(&self) -> String {
        format!("{:.1}%", self.rssi_percent)
    }
}
