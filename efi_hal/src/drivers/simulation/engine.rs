//! Engine and exhaust model.
//!
//! Produces crank edges from a scripted speed profile and turns each completed
//! injector pulse into an exhaust AFR, using the same ideal-gas charge model
//! the control core calibrates against. A flow scale other than 1.0 makes the
//! real injector deliver more or less fuel than the core assumes.

use efi_common::config::EfiConfig;
use efi_common::consts::{KELVIN_OFFSET, MICROS_PER_MINUTE, R_AIR};
use efi_common::control_unit::config::SensorConfig;
use efi_common::hal::config::ProfilePoint;
use efi_common::hal::types::SensorReadings;

/// Below this speed the crank stops producing edges.
const STALL_RPM: f64 = 30.0;

/// Fraction of the new combustion AFR mixed into the exhaust per event.
const EXHAUST_MIX: f64 = 0.5;

/// Combustion events without fuel before the exhaust reads free air.
const LEAN_OUT_EVENTS: u32 = 4;

/// Wideband output span [V].
const SENSOR_VOLTS_MAX: f64 = 5.0;

/// Crank, air and exhaust state of the simulated engine.
#[derive(Debug, Clone)]
pub struct EngineModel {
    profile: Vec<ProfilePoint>,
    edges_per_revolution: u32,
    ect_c: f64,
    iat_c: f64,
    charge_volume_m3: f64,
    true_flow_kg_per_s: f64,
    sensor: SensorConfig,
    next_edge_us: Option<u64>,
    edges: u64,
    edges_since_fuel: u32,
    afr: f64,
}

impl EngineModel {
    /// Build from the full configuration.
    pub fn new(config: &EfiConfig) -> Self {
        let sim = &config.simulation;
        let sensor = config.sensors.clone();
        let free_air = sensor.volts_to_afr(SENSOR_VOLTS_MAX);
        Self {
            profile: sim.profile.clone(),
            edges_per_revolution: sim.edges_per_revolution.max(1),
            ect_c: sim.ect_c,
            iat_c: sim.iat_c,
            charge_volume_m3: config.engine.charge_volume_m3(),
            true_flow_kg_per_s: config.injector.flow_rate_kg_per_s() * sim.injector_flow_scale,
            sensor,
            next_edge_us: None,
            edges: 0,
            edges_since_fuel: 0,
            afr: free_air,
        }
    }

    /// Operating point at `t_us`, linearly interpolated along the profile.
    pub fn operating_point(&self, t_us: u64) -> ProfilePoint {
        let t = t_us as f64 * 1e-6;
        let (Some(first), Some(last)) = (self.profile.first(), self.profile.last()) else {
            return ProfilePoint::new(t, 0.0, 100.0, 0.0);
        };
        if t <= first.t_s {
            return *first;
        }
        if t >= last.t_s {
            return *last;
        }
        for w in self.profile.windows(2) {
            let (a, b) = (w[0], w[1]);
            if t >= a.t_s && t <= b.t_s {
                let span = b.t_s - a.t_s;
                let f = if span > 0.0 { (t - a.t_s) / span } else { 1.0 };
                return ProfilePoint::new(
                    t,
                    a.rpm + f * (b.rpm - a.rpm),
                    a.map_kpa + f * (b.map_kpa - a.map_kpa),
                    a.tps_pct + f * (b.tps_pct - a.tps_pct),
                );
            }
        }
        *last
    }

    fn edge_period_us(&self, rpm: f64) -> Option<u64> {
        if rpm < STALL_RPM {
            return None;
        }
        let period = MICROS_PER_MINUTE as f64 / (rpm * self.edges_per_revolution as f64);
        Some(period.round().max(1.0) as u64)
    }

    /// Bring the edge schedule in line with the speed at `now_us`.
    ///
    /// Called at the start of each step. An edge is pulled forward when the
    /// engine has sped up since it was scheduled.
    pub fn schedule(&mut self, now_us: u64) {
        let rpm = self.operating_point(now_us).rpm;
        match (self.edge_period_us(rpm), self.next_edge_us) {
            (None, _) => self.next_edge_us = None,
            (Some(p), None) => self.next_edge_us = Some(now_us + p),
            (Some(p), Some(next)) if now_us + p < next => self.next_edge_us = Some(now_us + p),
            _ => {}
        }
    }

    /// Next crank edge, if the engine is turning.
    pub fn next_edge_us(&self) -> Option<u64> {
        self.next_edge_us
    }

    /// Consume the pending edge and schedule the following one.
    pub fn fire_edge(&mut self) {
        let Some(t) = self.next_edge_us else {
            return;
        };
        self.edges += 1;
        let rpm = self.operating_point(t).rpm;
        self.next_edge_us = self.edge_period_us(rpm).map(|p| t + p);

        if self.edges % u64::from(self.edges_per_revolution) == 0 {
            self.edges_since_fuel = self.edges_since_fuel.saturating_add(1);
            if self.edges_since_fuel > LEAN_OUT_EVENTS {
                self.afr = self.sensor.volts_to_afr(SENSOR_VOLTS_MAX);
            }
        }
    }

    /// Burn one injector pulse of `pulse_us` against the charge at `t_us`.
    pub fn burn(&mut self, pulse_us: u64, t_us: u64) {
        if pulse_us == 0 {
            return;
        }
        let op = self.operating_point(t_us);
        let air_kg = op.map_kpa * 1000.0 * self.charge_volume_m3
            / (R_AIR * (self.iat_c + KELVIN_OFFSET));
        let fuel_kg = pulse_us as f64 * 1e-6 * self.true_flow_kg_per_s;
        let combustion_afr = air_kg / fuel_kg;
        self.afr += EXHAUST_MIX * (combustion_afr - self.afr);
        self.edges_since_fuel = 0;
    }

    /// Crank edges produced so far.
    pub fn edges(&self) -> u64 {
        self.edges
    }

    /// Exhaust AFR as the engine produces it (before the sensor clips).
    pub fn exhaust_afr(&self) -> f64 {
        self.afr
    }

    /// Analog inputs at `t_us`.
    pub fn readings(&self, t_us: u64) -> SensorReadings {
        let op = self.operating_point(t_us);
        SensorReadings {
            map_kpa: op.map_kpa,
            afr_volts: self
                .sensor
                .afr_to_volts(self.afr)
                .clamp(0.0, SENSOR_VOLTS_MAX),
            ect_c: self.ect_c,
            iat_c: self.iat_c,
            tps_pct: op.tps_pct,
        }
    }
}
