//! Closed-loop trims and startup enrichment.
//!
//! - AFR trim: per-cell multiplier nudged by the relative AFR error.
//! - Idle trim: additive fraction from an integral + derivative law on the
//!   RPM error near idle, stepped once per fresh RPM sample and scaled by
//!   the time between samples.
//! - Startup modifier: enrichment multiplier that decays per revolution.
//!
//! All three are bounded; the controller decides when each loop is active.

use efi_common::control_unit::config::{AfrFeedbackConfig, IdleFeedbackConfig, StartupConfig};

// ─── AFR Trim ───────────────────────────────────────────────────────

/// One AFR trim step.
///
/// `trim += gain × (measured − target) / target`, clamped. Lean readings
/// raise the trim (more fuel), rich readings lower it. Returns the new trim
/// and whether it sits at a bound.
#[inline]
pub fn afr_trim_compute(
    trim: f64,
    measured: f64,
    target: f64,
    config: &AfrFeedbackConfig,
) -> (f64, bool) {
    if !(target > 0.0) || !measured.is_finite() {
        return (trim, false);
    }
    let raw = trim + config.gain * (measured - target) / target;
    let clamped = raw.clamp(config.trim_min, config.trim_max);
    (clamped, clamped != raw)
}

/// Rate limiter for the AFR loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct AfrLoopState {
    last_update_us: Option<u64>,
}

impl AfrLoopState {
    /// True (and stamps `now_us`) when `interval_us` has passed since the
    /// last accepted update.
    pub fn due(&mut self, now_us: u64, interval_us: u64) -> bool {
        match self.last_update_us {
            Some(last) if now_us.saturating_sub(last) < interval_us => false,
            _ => {
                self.last_update_us = Some(now_us);
                true
            }
        }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.last_update_us = None;
    }
}

// ─── Idle Trim ──────────────────────────────────────────────────────

/// Idle-speed loop state.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleState {
    /// Additive pulse fraction; the pulse scales by `1 + trim`.
    pub trim: f64,
    /// RPM error of the previous active step.
    prev_delta: Option<f64>,
    /// Time of the previous active step [µs].
    last_step_us: Option<u64>,
}

impl IdleState {
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Forget the previous step so re-entry starts without a derivative kick
    /// or an integral over the paused interval.
    #[inline]
    pub fn pause(&mut self) {
        self.prev_delta = None;
        self.last_step_us = None;
    }

    #[inline]
    pub fn prev_delta(&self) -> Option<f64> {
        self.prev_delta
    }
}

/// True when the operating point is close enough to idle for the loop.
#[inline]
pub fn idle_active(rpm: i32, tps: f64, config: &IdleFeedbackConfig) -> bool {
    tps <= config.max_tps && rpm <= config.max_rpm
}

/// One idle trim step for an RPM sample taken at `now_us`.
///
/// ```text
/// delta = desired − rpm
/// dt    = now − previous step [s]
/// trim += ki × delta × dt + kd × (delta − prev_delta) / dt
/// ```
///
/// The first step after a pause only records the sample. Returns whether
/// the trim sits at a bound.
pub fn idle_trim_compute(
    state: &mut IdleState,
    rpm: i32,
    now_us: u64,
    config: &IdleFeedbackConfig,
) -> bool {
    let delta = f64::from(config.desired_rpm) - f64::from(rpm);
    let (Some(last), Some(prev)) = (state.last_step_us, state.prev_delta) else {
        state.prev_delta = Some(delta);
        state.last_step_us = Some(now_us);
        return false;
    };
    if now_us <= last {
        return false;
    }
    let dt = (now_us - last) as f64 / 1e6;

    let raw = state.trim + config.ki * delta * dt + config.kd * (delta - prev) / dt;
    state.trim = raw.clamp(config.trim_min, config.trim_max);
    state.prev_delta = Some(delta);
    state.last_step_us = Some(now_us);
    state.trim != raw
}

// ─── Startup Modifier ───────────────────────────────────────────────

/// Startup enrichment multiplier in `[1, max]`.
#[derive(Debug, Clone, Copy)]
pub struct StartupModifier {
    value: f64,
    revs_at_last_decay: u64,
}

impl Default for StartupModifier {
    fn default() -> Self {
        Self {
            value: 1.0,
            revs_at_last_decay: 0,
        }
    }
}

impl StartupModifier {
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Apply the initial enrichment at engine start.
    pub fn set(&mut self, config: &StartupConfig, total_revolutions: u64) {
        self.value = bound(config.initial, config.max);
        self.revs_at_last_decay = total_revolutions;
    }

    /// Step up by `raise_step`, capped at `max`.
    pub fn raise(&mut self, config: &StartupConfig) {
        self.value = bound(self.value + config.raise_step, config.max);
    }

    /// Decay by `decay_per_rev` for each revolution since the last decay.
    pub fn lower(&mut self, config: &StartupConfig, total_revolutions: u64) {
        let revs = total_revolutions.saturating_sub(self.revs_at_last_decay);
        self.revs_at_last_decay = total_revolutions;
        if revs == 0 {
            return;
        }
        self.value = bound(self.value - config.decay_per_rev * revs as f64, config.max);
    }
}

#[inline]
fn bound(value: f64, max: f64) -> f64 {
    value.min(max).max(1.0)
}
