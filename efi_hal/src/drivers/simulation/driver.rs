//! Simulation driver implementation.
//!
//! The `SimulationDriver` implements the `EfiDriver` trait on top of a
//! virtual clock. Each cycle walks the step event by event: crank edges from
//! the engine model and off-timer expiries from the injector are delivered to
//! the interrupt sink in timestamp order, with the clock set to the event time
//! first. An expiry and an edge at the same instant deliver the expiry first.

use super::clock::SimClock;
use super::engine::EngineModel;
use super::injector::SimInjector;
use efi_common::config::EfiConfig;
use efi_common::hal::driver::{
    DriverDiagnostics, EfiDriver, HalError, InjectorOutput, InterruptSink, MicrosClock,
};
use efi_common::hal::types::SensorReadings;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Simulation driver implementing the EfiDriver trait.
pub struct SimulationDriver {
    name: &'static str,
    version: &'static str,
    initialized: bool,
    clock: Arc<SimClock>,
    injector: Arc<SimInjector>,
    engine: Option<EngineModel>,
    diagnostics: DriverDiagnostics,
}

enum Event {
    Edge(u64),
    TimerExpiry(u64),
}

impl SimulationDriver {
    /// Create a new simulation driver instance.
    pub fn new() -> Self {
        let clock = Arc::new(SimClock::new());
        let injector = Arc::new(SimInjector::new(clock.clone()));
        Self {
            name: "simulation",
            version: env!("CARGO_PKG_VERSION"),
            initialized: false,
            clock,
            injector,
            engine: None,
            diagnostics: DriverDiagnostics::default(),
        }
    }

    /// Concrete injector handle, for inspection in tests and tools.
    pub fn sim_injector(&self) -> Arc<SimInjector> {
        self.injector.clone()
    }

    /// Engine model, once initialized.
    pub fn engine(&self) -> Option<&EngineModel> {
        self.engine.as_ref()
    }

    fn next_event(&self, engine: &EngineModel, until_us: u64) -> Option<Event> {
        let edge = engine.next_edge_us().filter(|&t| t <= until_us);
        let expiry = self.injector.deadline_us().filter(|&t| t <= until_us);
        match (edge, expiry) {
            (Some(e), Some(x)) if x <= e => Some(Event::TimerExpiry(x)),
            (Some(e), _) => Some(Event::Edge(e)),
            (None, Some(x)) => Some(Event::TimerExpiry(x)),
            (None, None) => None,
        }
    }
}

impl Default for SimulationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl EfiDriver for SimulationDriver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn version(&self) -> &'static str {
        self.version
    }

    fn init(&mut self, config: &EfiConfig) -> Result<(), HalError> {
        config
            .simulation
            .validate()
            .map_err(|e| HalError::ConfigError(e.to_string()))?;

        info!(
            "Initializing simulation driver: {} profile points, {} edges/rev, flow scale {:.3}",
            config.simulation.profile.len(),
            config.simulation.edges_per_revolution,
            config.simulation.injector_flow_scale
        );

        self.engine = Some(EngineModel::new(config));
        self.diagnostics = DriverDiagnostics::default();
        self.initialized = true;
        Ok(())
    }

    fn injector(&self) -> Arc<dyn InjectorOutput> {
        self.injector.clone()
    }

    fn clock(&self) -> Arc<dyn MicrosClock> {
        self.clock.clone()
    }

    fn cycle(&mut self, sink: &dyn InterruptSink, dt: Duration) -> SensorReadings {
        if !self.initialized {
            return SensorReadings::default();
        }
        let Some(mut engine) = self.engine.take() else {
            return SensorReadings::default();
        };

        let start = self.clock.now_us();
        let end = start + dt.as_micros() as u64;
        engine.schedule(start);

        while let Some(event) = self.next_event(&engine, end) {
            match event {
                Event::TimerExpiry(t) => {
                    self.clock.set(t);
                    self.injector.take_deadline();
                    self.diagnostics.timer_expiries += 1;
                    sink.off_timer_expired(t);
                }
                Event::Edge(t) => {
                    self.clock.set(t);
                    engine.fire_edge();
                    self.diagnostics.crank_edges += 1;
                    sink.crank_edge(t);
                }
            }
            if let Some(width) = self.injector.take_completed_pulse() {
                engine.burn(width, self.clock.now_us());
            }
        }

        self.clock.set(end);
        self.diagnostics.cycle_count += 1;
        self.diagnostics.injector_on_time_us = self.injector.on_time_us();
        let readings = engine.readings(end);
        self.engine = Some(engine);
        readings
    }

    fn shutdown(&mut self) -> Result<(), HalError> {
        self.injector.cancel_off_timer();
        self.injector.set_output(false);
        debug!(
            "Simulation driver shutdown after {} cycles, {} crank edges",
            self.diagnostics.cycle_count, self.diagnostics.crank_edges
        );
        self.initialized = false;
        Ok(())
    }

    fn diagnostics(&self) -> Option<DriverDiagnostics> {
        Some(self.diagnostics.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use efi_common::hal::config::SimulationConfig;
    use parking_lot::Mutex;

    /// Records events and fires a fixed pulse on every edge.
    struct Recorder {
        injector: Arc<dyn InjectorOutput>,
        pulse_us: u32,
        edges: Mutex<Vec<u64>>,
        expiries: Mutex<Vec<u64>>,
    }

    impl InterruptSink for Recorder {
        fn crank_edge(&self, timestamp_us: u64) {
            self.edges.lock().push(timestamp_us);
            if self.pulse_us > 0 && !self.injector.off_timer_pending() {
                self.injector.set_output(true);
                self.injector.arm_off_timer(self.pulse_us);
            }
        }

        fn off_timer_expired(&self, timestamp_us: u64) {
            self.expiries.lock().push(timestamp_us);
            self.injector.set_output(false);
        }
    }

    fn driver(rpm: f64) -> SimulationDriver {
        let config = EfiConfig {
            simulation: SimulationConfig::steady(rpm, 40.0, 0.0),
            ..Default::default()
        };
        let mut d = SimulationDriver::new();
        d.init(&config).unwrap();
        d
    }

    #[test]
    fn test_cycle_before_init_is_inert() {
        let mut d = SimulationDriver::new();
        let sink = Recorder {
            injector: d.injector(),
            pulse_us: 0,
            edges: Mutex::new(vec![]),
            expiries: Mutex::new(vec![]),
        };
        let r = d.cycle(&sink, Duration::from_millis(100));
        assert_eq!(r, SensorReadings::default());
        assert!(sink.edges.lock().is_empty());
    }

    #[test]
    fn test_edges_and_expiries_in_order() {
        let mut d = driver(2000.0);
        let sink = Recorder {
            injector: d.injector(),
            pulse_us: 2_000,
            edges: Mutex::new(vec![]),
            expiries: Mutex::new(vec![]),
        };

        for _ in 0..45 {
            d.cycle(&sink, Duration::from_millis(1));
        }

        assert_eq!(*sink.edges.lock(), vec![15_000, 30_000, 45_000]);
        // The pulse armed at 45 ms expires after this window.
        assert_eq!(*sink.expiries.lock(), vec![17_000, 32_000]);
        assert!(d.sim_injector().output_is_high());
        assert_eq!(d.clock().now_us(), 45_000);

        let diag = d.diagnostics().unwrap();
        assert_eq!(diag.cycle_count, 45);
        assert_eq!(diag.crank_edges, 3);
        assert_eq!(diag.timer_expiries, 2);
        assert_eq!(diag.injector_on_time_us, 4_000);
    }

    #[test]
    fn test_expiry_inside_same_step() {
        let mut d = driver(2000.0);
        let sink = Recorder {
            injector: d.injector(),
            pulse_us: 500,
            edges: Mutex::new(vec![]),
            expiries: Mutex::new(vec![]),
        };
        d.cycle(&sink, Duration::from_millis(16));
        assert_eq!(*sink.edges.lock(), vec![15_000]);
        assert_eq!(*sink.expiries.lock(), vec![15_500]);
        assert!(!d.sim_injector().output_is_high());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut d = driver(0.0);
        let sink = Recorder {
            injector: d.injector(),
            pulse_us: 0,
            edges: Mutex::new(vec![]),
            expiries: Mutex::new(vec![]),
        };
        d.injector().set_output(true);
        d.injector().arm_off_timer(500);
        d.injector().cancel_off_timer();
        d.cycle(&sink, Duration::from_millis(1));
        assert!(sink.expiries.lock().is_empty());
    }

    #[test]
    fn test_readings_follow_profile() {
        let mut d = driver(1800.0);
        let sink = Recorder {
            injector: d.injector(),
            pulse_us: 0,
            edges: Mutex::new(vec![]),
            expiries: Mutex::new(vec![]),
        };
        let r = d.cycle(&sink, Duration::from_millis(1));
        assert_eq!(r.map_kpa, 40.0);
        assert_eq!(r.iat_c, 25.0);
        // No fuel yet: sensor pinned at the lean end.
        assert_eq!(r.afr_volts, 5.0);
    }

    #[test]
    fn test_shutdown_leaves_output_low() {
        let mut d = driver(1800.0);
        d.injector().set_output(true);
        d.injector().arm_off_timer(1000);
        d.shutdown().unwrap();
        assert!(!d.sim_injector().output_is_high());
        assert!(!d.sim_injector().off_timer_pending());
    }
}
