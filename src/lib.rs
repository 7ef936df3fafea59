//! ITR Engine library crate.
//!
//! This crate exposes the Indian income tax regime calculators and the
//! comparison engine as reusable modules.  External applications may
//! depend on the `itr_engine` crate and call `engine::compare` or the
//! per-regime functions in `tax` directly, or embed the HTTP API via
//! `api::router`.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod input;
pub mod models;
pub mod rules;
pub mod tax;

pub use engine::{compare, compare_batch, compare_with_rules, CompareOptions};
pub use models::{ComparisonResult, Regime, RegimeResult, TaxInputRecord};
pub use tax::{compute_hra_exemption, compute_new_regime, compute_old_regime, slab_tax};
