//! Guard bitflags for the control path.
//!
//! The control path never returns errors. Instead each cycle records which
//! guard absorbed an out-of-range condition.

use bitflags::bitflags;

bitflags! {
    /// Guards that fired during one control cycle.
    ///
    /// WARN flags (logged at `warn` when newly raised): PULSE_SKIPPED, TRIM_SATURATED.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GuardFlags: u8 {
        /// MAP reading outside the table axis; lookup clamped to the edge row.
        const MAP_CLAMPED    = 0x01;
        /// RPM outside the table axis; lookup clamped to the edge column.
        const RPM_CLAMPED    = 0x02;
        /// RPM window had no usable data; previous RPM held.
        const RPM_HELD       = 0x04;
        /// Injection event skipped because the previous off-timer was pending.
        const PULSE_SKIPPED  = 0x08;
        /// Pulse time limited by the duty-cycle or absolute ceiling.
        const PULSE_CLAMPED  = 0x10;
        /// A feedback trim sits at its bound.
        const TRIM_SATURATED = 0x20;
    }
}

impl GuardFlags {
    /// Flags worth a warning when they first appear.
    pub const WARN_MASK: Self =
        Self::from_bits_truncate(Self::PULSE_SKIPPED.bits() | Self::TRIM_SATURATED.bits());

    /// Returns true if any warning-level flag is set.
    #[inline]
    pub const fn has_warning(&self) -> bool {
        self.intersects(Self::WARN_MASK)
    }
}

impl Default for GuardFlags {
    fn default() -> Self {
        Self::empty()
    }
}
