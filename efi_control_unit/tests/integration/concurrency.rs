//! Interrupt traffic from another thread against the main-loop consumers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use efi_common::config::EfiConfig;
use efi_common::control_unit::state::InjectorState;
use efi_common::hal::driver::{InjectorOutput, InterruptSink, MicrosClock};
use efi_control_unit::Controller;
use efi_control_unit::revolution::RpmUpdate;

const EDGES: u64 = 200_000;

/// Clock that ticks one microsecond per read.
#[derive(Default)]
struct TickClock(AtomicU64);

impl MicrosClock for TickClock {
    fn now_us(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Output whose timer expires as soon as it is polled again.
#[derive(Default)]
struct LoosePin {
    high: AtomicBool,
    pending: AtomicBool,
}

impl InjectorOutput for LoosePin {
    fn set_output(&self, high: bool) {
        self.high.store(high, Ordering::SeqCst);
    }
    fn output_is_high(&self) -> bool {
        self.high.load(Ordering::SeqCst)
    }
    fn arm_off_timer(&self, _duration_us: u32) {
        self.pending.store(true, Ordering::SeqCst);
    }
    fn cancel_off_timer(&self) {
        self.pending.store(false, Ordering::SeqCst);
    }
    fn off_timer_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

fn controller() -> (Controller, Arc<TickClock>, Arc<LoosePin>) {
    let clock = Arc::new(TickClock::default());
    let pin = Arc::new(LoosePin::default());
    let ctl = Controller::new(&EfiConfig::default(), pin.clone(), clock.clone());
    (ctl, clock, pin)
}

#[test]
fn no_edge_lost_or_double_counted() {
    let (mut ctl, clock, _pin) = controller();
    let handle = ctl.isr_handle();
    let producer_clock = clock.clone();

    let producer = thread::spawn(move || {
        for _ in 0..EDGES {
            handle.crank_edge(producer_clock.now_us());
        }
    });

    let mut consumed = 0u64;
    while !producer.is_finished() {
        if let RpmUpdate::Updated { revolutions, .. } = ctl.update_rpm() {
            consumed += u64::from(revolutions);
        }
    }
    producer.join().unwrap();

    // Drain whatever the last pass left behind.
    if let RpmUpdate::Updated { revolutions, .. } = ctl.update_rpm() {
        consumed += u64::from(revolutions);
    }

    assert_eq!(ctl.total_revolutions(), EDGES);
    assert_eq!(consumed, EDGES);
}

#[test]
fn disable_races_with_pulses() {
    let (ctl, clock, pin) = controller();
    let shared = ctl.isr_handle();
    shared.shared().injector().schedule(500);
    ctl.enable_inj();

    let stop = Arc::new(AtomicBool::new(false));
    let isr = {
        let handle = ctl.isr_handle();
        let stop = stop.clone();
        let clock = clock.clone();
        thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let t = clock.now_us();
                handle.crank_edge(t);
                handle.off_timer_expired(t);
            }
        })
    };

    for i in 0..20_000 {
        if i % 2 == 0 {
            ctl.disable_inj();
            assert_ne!(ctl.injector_state(), InjectorState::Pulsing);
        } else {
            ctl.enable_inj();
        }
    }
    ctl.disable_inj();
    stop.store(true, Ordering::SeqCst);
    isr.join().unwrap();

    assert_eq!(ctl.injector_state(), InjectorState::Disabled);
    assert!(!pin.output_is_high());

    let injector = shared.shared().injector();
    assert_eq!(injector.total_pulse_us(), injector.pulses() * 500);
}
