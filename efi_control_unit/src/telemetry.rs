//! Telemetry transmitter.
//!
//! Emits one 44-byte frame at most every `min_time_per_sample_us` while
//! transmission is enabled. The byte sink is any `io::Write` (serial port,
//! file, socket, test buffer).

use std::io::{self, Write};

use efi_common::control_unit::config::TelemetryConfig;
use efi_common::telemetry::TelemetryFrame;

#[derive(Debug, Clone)]
pub struct Transmitter {
    enabled: bool,
    min_interval_us: u64,
    last_sent_us: Option<u64>,
    frames_sent: u64,
}

impl Transmitter {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            enabled: config.transmit_on_start,
            min_interval_us: config.min_time_per_sample_us,
            last_sent_us: None,
            frames_sent: 0,
        }
    }

    /// Enable the stream. The next `try_send` emits immediately.
    pub fn start(&mut self) -> bool {
        self.enabled = true;
        self.last_sent_us = None;
        true
    }

    pub fn stop(&mut self) -> bool {
        self.enabled = false;
        true
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// True when a frame may go out at `now_us`.
    #[inline]
    pub fn due(&self, now_us: u64) -> bool {
        self.enabled
            && self
                .last_sent_us
                .is_none_or(|last| now_us.saturating_sub(last) >= self.min_interval_us)
    }

    /// Write `frame` if due. Returns whether a frame was written.
    ///
    /// The send time is only recorded after a successful write.
    pub fn try_send<W: Write + ?Sized>(
        &mut self,
        now_us: u64,
        frame: &TelemetryFrame,
        out: &mut W,
    ) -> io::Result<bool> {
        if !self.due(now_us) {
            return Ok(false);
        }
        out.write_all(&frame.encode())?;
        self.last_sent_us = Some(now_us);
        self.frames_sent += 1;
        Ok(true)
    }
}
