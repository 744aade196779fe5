//! Telemetry frame codec.
//!
//! One frame is eleven little-endian 32-bit words:
//!
//! | Word | Type | Content |
//! |------|------|---------|
//! | 0  | u32 | start sentinel `0x80000001` |
//! | 1  | u32 | timestamp [µs] |
//! | 2  | u32 | total revolutions |
//! | 3  | f32 | ECT [°C] |
//! | 4  | f32 | IAT [°C] |
//! | 5  | f32 | MAP [kPa] |
//! | 6  | f32 | TPS [%] |
//! | 7  | f32 | AFR |
//! | 8  | f32 | cumulative pulse time [µs] |
//! | 9  | i32 | RPM |
//! | 10 | u32 | end sentinel `0x80000000` |
//!
//! The receiving side feeds raw bytes to [`FrameSync`], which locks onto the
//! start sentinel and skips anything that does not decode.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;
use thiserror::Error;

use crate::consts::{FRAME_END_SENTINEL, FRAME_START_SENTINEL, TELEMETRY_FRAME_LEN};

const WORDS: usize = 11;
const_assert_eq!(WORDS * 4, TELEMETRY_FRAME_LEN);

/// Telemetry decoding error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TelemetryError {
    #[error("frame length {actual} != {TELEMETRY_FRAME_LEN}")]
    Length { actual: usize },

    #[error("bad start sentinel 0x{0:08x}")]
    StartSentinel(u32),

    #[error("bad end sentinel 0x{0:08x}")]
    EndSentinel(u32),
}

/// One decoded telemetry sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub timestamp_us: u32,
    pub total_revolutions: u32,
    pub ect: f32,
    pub iat: f32,
    pub map: f32,
    pub tps: f32,
    pub afr: f32,
    pub total_pulse_time_us: f32,
    pub rpm: i32,
}

#[inline]
fn word(bytes: &[u8], index: usize) -> [u8; 4] {
    let o = index * 4;
    [bytes[o], bytes[o + 1], bytes[o + 2], bytes[o + 3]]
}

impl TelemetryFrame {
    /// Serialize to the 44-byte wire layout.
    pub fn encode(&self) -> [u8; TELEMETRY_FRAME_LEN] {
        let words: [[u8; 4]; WORDS] = [
            FRAME_START_SENTINEL.to_le_bytes(),
            self.timestamp_us.to_le_bytes(),
            self.total_revolutions.to_le_bytes(),
            self.ect.to_le_bytes(),
            self.iat.to_le_bytes(),
            self.map.to_le_bytes(),
            self.tps.to_le_bytes(),
            self.afr.to_le_bytes(),
            self.total_pulse_time_us.to_le_bytes(),
            self.rpm.to_le_bytes(),
            FRAME_END_SENTINEL.to_le_bytes(),
        ];
        let mut out = [0u8; TELEMETRY_FRAME_LEN];
        for (chunk, w) in out.chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(w);
        }
        out
    }

    /// Parse exactly one frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, TelemetryError> {
        if bytes.len() != TELEMETRY_FRAME_LEN {
            return Err(TelemetryError::Length {
                actual: bytes.len(),
            });
        }
        let start = u32::from_le_bytes(word(bytes, 0));
        if start != FRAME_START_SENTINEL {
            return Err(TelemetryError::StartSentinel(start));
        }
        let end = u32::from_le_bytes(word(bytes, 10));
        if end != FRAME_END_SENTINEL {
            return Err(TelemetryError::EndSentinel(end));
        }
        Ok(Self {
            timestamp_us: u32::from_le_bytes(word(bytes, 1)),
            total_revolutions: u32::from_le_bytes(word(bytes, 2)),
            ect: f32::from_le_bytes(word(bytes, 3)),
            iat: f32::from_le_bytes(word(bytes, 4)),
            map: f32::from_le_bytes(word(bytes, 5)),
            tps: f32::from_le_bytes(word(bytes, 6)),
            afr: f32::from_le_bytes(word(bytes, 7)),
            total_pulse_time_us: f32::from_le_bytes(word(bytes, 8)),
            rpm: i32::from_le_bytes(word(bytes, 9)),
        })
    }
}

/// Byte-stream frame synchroniser.
#[derive(Debug, Default)]
pub struct FrameSync {
    buf: Vec<u8>,
    discarded: usize,
}

impl FrameSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes thrown away while hunting for a frame.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Next complete frame, or `None` until more bytes arrive.
    pub fn next_frame(&mut self) -> Option<TelemetryFrame> {
        let start = FRAME_START_SENTINEL.to_le_bytes();
        loop {
            match self.buf.windows(4).position(|w| w == start) {
                Some(pos) => self.discard(pos),
                None => {
                    // Keep a partial sentinel at the tail.
                    let keep = self.buf.len().min(3);
                    self.discard(self.buf.len() - keep);
                    return None;
                }
            }
            if self.buf.len() < TELEMETRY_FRAME_LEN {
                return None;
            }
            match TelemetryFrame::decode(&self.buf[..TELEMETRY_FRAME_LEN]) {
                Ok(frame) => {
                    self.buf.drain(..TELEMETRY_FRAME_LEN);
                    return Some(frame);
                }
                Err(_) => self.discard(1),
            }
        }
    }

    fn discard(&mut self, n: usize) {
        self.buf.drain(..n);
        self.discarded += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetryFrame {
        TelemetryFrame {
            timestamp_us: 123_456,
            total_revolutions: 42,
            ect: 85.0,
            iat: 25.5,
            map: 35.0,
            tps: 2.0,
            afr: 14.7,
            total_pulse_time_us: 98_765.0,
            rpm: 1800,
        }
    }

    #[test]
    fn frame_layout() {
        let bytes = sample().encode();
        assert_eq!(bytes.len(), 44);
        assert_eq!(&bytes[0..4], &[0x01, 0x00, 0x00, 0x80]);
        assert_eq!(&bytes[40..44], &[0x00, 0x00, 0x00, 0x80]);
        assert_eq!(&bytes[36..40], &1800i32.to_le_bytes());
        assert_eq!(TelemetryFrame::decode(&bytes).unwrap(), sample());
    }

    #[test]
    fn decode_rejects_bad_frames() {
        let bytes = sample().encode();
        assert_eq!(
            TelemetryFrame::decode(&bytes[..43]),
            Err(TelemetryError::Length { actual: 43 })
        );

        let mut bad = bytes;
        bad[43] = 0x7f;
        assert!(matches!(
            TelemetryFrame::decode(&bad),
            Err(TelemetryError::EndSentinel(_))
        ));

        bad = bytes;
        bad[0] = 0;
        assert!(matches!(
            TelemetryFrame::decode(&bad),
            Err(TelemetryError::StartSentinel(_))
        ));
    }

    #[test]
    fn sync_recovers_after_garbage() {
        let mut sync = FrameSync::new();
        sync.push(&[0xde, 0xad, 0x01, 0x00]);
        sync.push(&sample().encode()[..20]);
        assert!(sync.next_frame().is_none());

        sync.push(&sample().encode()[20..]);
        let mut second = sample();
        second.rpm = 2000;
        sync.push(&second.encode());

        assert_eq!(sync.next_frame(), Some(sample()));
        assert_eq!(sync.next_frame(), Some(second));
        assert_eq!(sync.next_frame(), None);
        assert_eq!(sync.discarded(), 4);
    }

    #[test]
    fn sync_skips_false_start() {
        let mut sync = FrameSync::new();
        // Start sentinel with no valid end.
        sync.push(&FRAME_START_SENTINEL.to_le_bytes());
        sync.push(&[0u8; 8]);
        sync.push(&sample().encode());
        assert_eq!(sync.next_frame(), Some(sample()));
    }
}
