//! CGM Flux - Deterministic analytics for continuous glucose monitor data
//!
//! Flux turns timestamped glucose readings and insulin pump history into the
//! numbers a diabetes dashboard renders: normalization → range categorization
//! → AGP percentiles → rate of change → hypoglycemia episodes → insulin on
//! board.
//!
//! ## Modules
//!
//! - **Analytics**: `categorizer`, `agp`, `roc`, `hypo`, `iob` are pure
//!   functions over sorted readings
//! - **Boundary**: `input`, `config` and `ffi` parse and validate JSON
//! - **Report**: `pipeline` runs everything for one selection of readings

pub mod agp;
pub mod categorizer;
pub mod config;
pub mod error;
pub mod hypo;
pub mod input;
pub mod iob;
pub mod normalizer;
pub mod pipeline;
pub mod roc;
pub mod stats;
pub mod types;

#[cfg(feature = "cli")]
pub mod logging;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use config::AnalysisConfig;
pub use error::ComputeError;
pub use pipeline::{build_report, report_to_json, GlucoseReport};
pub use types::{
    CategoryStats, GlucoseReading, GlucoseThresholds, GlucoseUnit, InsulinHistory,
    RangeCategoryMode,
};

/// Library version
pub const FLUX_VERSION: &str = env!("CARGO_PKG_VERSION");
