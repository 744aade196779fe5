//! Control core shared types.
//!
//! Everything the control unit shares with drivers, tools and tests:
//! state enums, guard bitflags, commands and configuration sections.

pub mod command;
pub mod config;
pub mod error;
pub mod state;
