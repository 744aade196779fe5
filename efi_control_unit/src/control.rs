//! Control engine root.
//!
//! Fueling corrections layered on top of the base pulse table:
//! closed-loop AFR and idle trims, startup enrichment, acceleration
//! enrichment, plus the input filters they read from.

pub mod feedback;
pub mod filters;
pub mod throttle;
