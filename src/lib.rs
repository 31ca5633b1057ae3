//! undivided: fractional ownership chains of undivided real property
//!
//! An ownership chain starts at an original owner holding 100% and follows
//! conveyances of fractional interests to heirs and grantees. The crate
//! computes who holds what share, lays the chain out in tiers, and keeps
//! the chain in a JSON ledger edited through the `undivided` CLI.
//!
//! Layers, innermost first:
//! - [`domain`]: entities, the interest calculator, layout, fractions
//! - [`application`]: validated ledger edits and computed report views
//! - [`infrastructure`]: the JSON ledger store and service wiring
//! - [`cli`]: argument parsing and command dispatch

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod infrastructure;
pub mod util;
