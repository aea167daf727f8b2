//! Deterministic random number generation
//!
//! Uses xorshift64* for fast, reproducible draws.
//! CRITICAL: every random decision in a synthesis run (calendar sampling,
//! exchange-rate walk, invoice amounts, address rotation) MUST go through
//! the single `RngManager` owned by the run context.

mod xorshift;

pub use xorshift::RngManager;
