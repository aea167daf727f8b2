//! Python bindings (enabled with the `pyo3` feature)

pub mod synthesizer;
pub mod types;
