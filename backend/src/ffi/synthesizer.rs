//! PyO3 wrapper for the Synthesizer
//!
//! This module provides the Python interface to a synthesis run.

use pyo3::exceptions::PyRuntimeError;
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use super::types::{parse_config, summary_to_py, synthesis_error_to_py, wallet_to_py};
use crate::synthesis::{compute_config_hash, SynthConfig, SynthesisOutput, Synthesizer};

/// Python wrapper for a synthesis run
///
/// # Example (from Python)
///
/// ```python
/// from txgen_core_rs import Synthesizer
///
/// synth = Synthesizer('{"seed": 7, "invoices": {"count": 500}}')
/// data = json.loads(synth.run())
/// print(synth.last_summary()["total_transactions"])
/// ```
#[pyclass(name = "Synthesizer")]
pub struct PySynthesizer {
    config: SynthConfig,
    last_output: Option<SynthesisOutput>,
}

#[pymethods]
impl PySynthesizer {
    /// Create a synthesizer from a JSON config (defaults when omitted)
    ///
    /// # Errors
    ///
    /// Raises ValueError if the JSON is malformed or the config is invalid
    #[new]
    #[pyo3(signature = (config_json=None))]
    fn new(config_json: Option<&str>) -> PyResult<Self> {
        let config = parse_config(config_json)?;
        // Validate eagerly so a bad config fails at construction
        Synthesizer::new(config.clone()).map_err(synthesis_error_to_py)?;
        Ok(PySynthesizer {
            config,
            last_output: None,
        })
    }

    /// Run the synthesis and return the full output as JSON
    fn run(&mut self) -> PyResult<String> {
        let output = Synthesizer::new(self.config.clone())
            .and_then(|s| s.run())
            .map_err(synthesis_error_to_py)?;
        let json = serde_json::to_string(&output)
            .map_err(|e| PyRuntimeError::new_err(format!("Serialization failed: {}", e)))?;
        self.last_output = Some(output);
        Ok(json)
    }

    /// Summary of the last run, or None before the first run
    fn last_summary<'py>(&self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyDict>>> {
        self.last_output
            .as_ref()
            .map(|output| summary_to_py(py, &output.summary))
            .transpose()
    }

    /// Wallet snapshots of the last run
    fn last_wallets<'py>(&self, py: Python<'py>) -> PyResult<Bound<'py, PyList>> {
        let list = PyList::empty_bound(py);
        if let Some(output) = &self.last_output {
            for wallet in &output.wallets {
                list.append(wallet_to_py(py, wallet)?)?;
            }
        }
        Ok(list)
    }

    /// SHA-256 of the canonical config
    fn config_hash(&self) -> PyResult<String> {
        compute_config_hash(&self.config)
            .map_err(|e| PyRuntimeError::new_err(format!("Config hashing failed: {}", e)))
    }

    /// Effective config (defaults filled in) as JSON
    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(&self.config)
            .map_err(|e| PyRuntimeError::new_err(format!("Serialization failed: {}", e)))
    }
}
