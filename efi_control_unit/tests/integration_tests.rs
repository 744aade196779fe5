//! Integration tests for the EFI Control Unit.
//!
//! These tests run the controller against the simulation driver or against
//! concurrent interrupt traffic, covering workflows that span the revolution
//! counter, the feedback loops, the injector actuator and telemetry.

mod integration;
