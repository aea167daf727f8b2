//! Type conversion utilities for the FFI boundary
//!
//! Converts run results into Python dicts and maps Rust errors onto Python
//! exception types.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::synthesis::{SummaryStats, SynthConfig, SynthesisError, WalletSnapshot};

/// Parse an optional JSON config; `None` gives the default scenario
pub fn parse_config(config_json: Option<&str>) -> PyResult<SynthConfig> {
    match config_json {
        None => Ok(SynthConfig::default()),
        Some(json) => serde_json::from_str(json)
            .map_err(|e| PyValueError::new_err(format!("Invalid config JSON: {}", e))),
    }
}

/// Config problems are the caller's fault; everything else is a run failure
pub fn synthesis_error_to_py(err: SynthesisError) -> PyErr {
    match err {
        SynthesisError::InvalidConfig(_) | SynthesisError::Schedule(_) => {
            PyValueError::new_err(err.to_string())
        }
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Summary statistics as a dict keyed like the exported `summary.json`
pub fn summary_to_py<'py>(
    py: Python<'py>,
    summary: &SummaryStats,
) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("total_transactions", summary.total_transactions)?;
    dict.set_item("total_sats_moved", summary.total_sats_moved)?;
    dict.set_item("total_usd_cents_moved", summary.total_usd_cents_moved)?;
    dict.set_item("total_fees_sats", summary.total_fees_sats)?;
    dict.set_item("min_tx_sats", summary.min_tx_sats)?;
    dict.set_item("max_tx_sats", summary.max_tx_sats)?;
    dict.set_item("mean_tx_sats", summary.mean_tx_sats)?;

    let by_category = PyDict::new_bound(py);
    for (category, count) in &summary.by_category {
        by_category.set_item(category.as_str(), count)?;
    }
    dict.set_item("by_category", by_category)?;

    let wallets = PyDict::new_bound(py);
    for (label, stats) in &summary.wallets {
        let w = PyDict::new_bound(py);
        w.set_item("incoming_count", stats.incoming_count)?;
        w.set_item("outgoing_count", stats.outgoing_count)?;
        w.set_item("sats_in", stats.sats_in)?;
        w.set_item("sats_out", stats.sats_out)?;
        w.set_item("usd_cents_in", stats.usd_cents_in)?;
        w.set_item("usd_cents_out", stats.usd_cents_out)?;
        w.set_item("final_balance_sats", stats.final_balance_sats)?;
        wallets.set_item(label.as_str(), w)?;
    }
    dict.set_item("wallets", wallets)?;

    Ok(dict)
}

pub fn wallet_to_py<'py>(py: Python<'py>, wallet: &WalletSnapshot) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("label", wallet.label.as_str())?;
    dict.set_item("derivation_root", &wallet.derivation_root)?;
    dict.set_item("receive_address", &wallet.receive_address)?;
    dict.set_item("addresses_used", wallet.addresses_used)?;
    dict.set_item("addresses", &wallet.addresses)?;
    dict.set_item("unspent_count", wallet.unspent_count)?;
    dict.set_item("final_balance_sats", wallet.balance_sats)?;
    Ok(dict)
}
