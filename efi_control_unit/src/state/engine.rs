//! Engine-state monitor.
//!
//! `Stopped → Running` once RPM reaches `min_running_rpm` with a recent crank
//! edge. `Running → Stopped` when RPM stays below the threshold for the
//! debounce interval, or when no edge arrives within the stall timeout. The
//! stall check is needed because a silent crank leaves the last RPM held.

use efi_common::control_unit::config::MonitorConfig;
use efi_common::control_unit::state::EngineState;

/// Edge of the running/stopped state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineTransition {
    Started,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct EngineMonitor {
    config: MonitorConfig,
    state: EngineState,
    below_since_us: Option<u64>,
}

impl EngineMonitor {
    pub fn new(config: MonitorConfig) -> Self {
        Self {
            config,
            state: EngineState::Stopped,
            below_since_us: None,
        }
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        self.state
    }

    fn stalled(&self, now_us: u64, last_edge_us: Option<u64>) -> bool {
        match last_edge_us {
            Some(t) => now_us.saturating_sub(t) > self.config.stall_timeout_us,
            None => true,
        }
    }

    /// True when the engine should be considered off.
    pub fn detect_engine_off(&mut self, rpm: i32, now_us: u64, last_edge_us: Option<u64>) -> bool {
        if self.stalled(now_us, last_edge_us) {
            return true;
        }
        if rpm < self.config.min_running_rpm {
            let since = *self.below_since_us.get_or_insert(now_us);
            now_us.saturating_sub(since) >= self.config.debounce_us
        } else {
            self.below_since_us = None;
            false
        }
    }

    /// Advance the state machine; returns the transition taken, if any.
    pub fn check(
        &mut self,
        rpm: i32,
        now_us: u64,
        last_edge_us: Option<u64>,
    ) -> Option<EngineTransition> {
        match self.state {
            EngineState::Running => {
                if self.detect_engine_off(rpm, now_us, last_edge_us) {
                    self.state = EngineState::Stopped;
                    self.below_since_us = None;
                    Some(EngineTransition::Stopped)
                } else {
                    None
                }
            }
            EngineState::Stopped => {
                if rpm >= self.config.min_running_rpm && !self.stalled(now_us, last_edge_us) {
                    self.state = EngineState::Running;
                    self.below_since_us = None;
                    Some(EngineTransition::Started)
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> EngineMonitor {
        EngineMonitor::new(MonitorConfig {
            min_running_rpm: 150,
            debounce_us: 250_000,
            stall_timeout_us: 500_000,
        })
    }

    #[test]
    fn starts_when_spinning() {
        let mut m = monitor();
        assert_eq!(m.check(100, 10_000, Some(9_000)), None);
        assert_eq!(
            m.check(400, 20_000, Some(19_000)),
            Some(EngineTransition::Started)
        );
        assert_eq!(m.state(), EngineState::Running);
    }

    #[test]
    fn held_rpm_without_edges_does_not_start() {
        let mut m = monitor();
        assert_eq!(m.check(1800, 2_000_000, Some(1_000_000)), None);
        assert_eq!(m.check(1800, 2_000_000, None), None);
    }

    #[test]
    fn low_rpm_is_debounced() {
        let mut m = monitor();
        m.check(1000, 0, Some(0));
        assert_eq!(m.check(100, 100_000, Some(100_000)), None);
        assert_eq!(m.check(100, 300_000, Some(300_000)), None);
        // Recovery resets the debounce.
        assert_eq!(m.check(1000, 320_000, Some(320_000)), None);
        assert_eq!(m.check(100, 400_000, Some(400_000)), None);
        assert_eq!(
            m.check(100, 650_000, Some(650_000)),
            Some(EngineTransition::Stopped)
        );
    }

    #[test]
    fn stall_stops_with_held_rpm() {
        let mut m = monitor();
        m.check(1800, 0, Some(0));
        assert_eq!(m.check(1800, 400_000, Some(0)), None);
        assert_eq!(
            m.check(1800, 500_001, Some(0)),
            Some(EngineTransition::Stopped)
        );
        assert_eq!(m.state(), EngineState::Stopped);
    }
}
