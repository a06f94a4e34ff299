//! On-disk layout of the shared admission counter.
//!
//! The record is a fixed 16-byte block: the window start as a big-endian
//! `u64` epoch second, the admission count as a big-endian `u32`, then four
//! reserved bytes that are written as zero and ignored on read.

pub const RECORD_LEN: usize = 16;

/// Bytes that must be present for a record to be considered readable.
const MIN_READABLE_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRecord {
    pub window_start_epoch_secs: u64,
    pub count: u32,
}

impl RateRecord {
    pub fn new(window_start_epoch_secs: u64, count: u32) -> Self {
        Self {
            window_start_epoch_secs,
            count,
        }
    }

    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[..8].copy_from_slice(&self.window_start_epoch_secs.to_be_bytes());
        buf[8..12].copy_from_slice(&self.count.to_be_bytes());
        buf
    }

    /// Returns `None` when fewer than twelve bytes are available, which is how
    /// a freshly created (empty) or truncated file reads.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < MIN_READABLE_LEN {
            return None;
        }
        let mut start = [0u8; 8];
        start.copy_from_slice(&bytes[..8]);
        let mut count = [0u8; 4];
        count.copy_from_slice(&bytes[8..12]);
        Some(Self {
            window_start_epoch_secs: u64::from_be_bytes(start),
            count: u32::from_be_bytes(count),
        })
    }

    /// True once `now` has left the window `[start, start + 1)`.
    ///
    /// A window start that lies in the future (wall clock stepped backwards)
    /// also counts as stale, otherwise a saturated window would stay closed
    /// until the clock caught up again.
    pub fn is_stale_at(&self, now_epoch_secs: u64) -> bool {
        now_epoch_secs != self.window_start_epoch_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_uses_big_endian_and_zeroed_reserved_bytes() {
        let bytes = RateRecord::new(0x0102_0304_0506_0708, 0x0A0B_0C0D).encode();
        assert_eq!(
            bytes,
            [1, 2, 3, 4, 5, 6, 7, 8, 0x0A, 0x0B, 0x0C, 0x0D, 0, 0, 0, 0]
        );
    }

    #[test]
    fn decode_ignores_reserved_bytes() {
        let mut bytes = RateRecord::new(1_700_000_000, 2).encode();
        bytes[12..].copy_from_slice(&[0xFF; 4]);
        assert_eq!(
            RateRecord::decode(&bytes),
            Some(RateRecord::new(1_700_000_000, 2))
        );
    }

    #[test]
    fn decode_rejects_short_input() {
        assert_eq!(RateRecord::decode(&[]), None);
        assert_eq!(RateRecord::decode(&[0u8; 11]), None);
        assert!(RateRecord::decode(&[0u8; 12]).is_some());
    }

    #[test]
    fn staleness_follows_whole_seconds() {
        let record = RateRecord::new(100, 2);
        assert!(!record.is_stale_at(100));
        assert!(record.is_stale_at(101));
        assert!(record.is_stale_at(250));
        assert!(record.is_stale_at(99));
    }
}
