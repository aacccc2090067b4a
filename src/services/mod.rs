//! Services module - Pure business logic for extraction and validation.
//!
//! The services are **framework-agnostic** and have no dependencies on the
//! orchestrator or the front end, making them testable and reusable.
//!
//! # Components
//!
//! - [`Comparator`]: validates extracted CSV and JSON outputs against reference
//!   fixtures. Handles:
//!   - Row-by-row CSV comparison with a numeric tolerance
//!   - Structural JSON comparison per file name
//!   - Collecting every discrepancy into a [`ValidationReport`]
//!
//! - [`ExtractionInvoker`]: launches the external extraction executable and
//!   reports launch failures or non-zero exits
//!
//! - [`TestModule`] and [`ModuleRegistry`]: the named units of work a run
//!   executes, including [`DataExtractionModule`] and the placeholder modules
//!
//! # Usage Example
//!
//! ```ignore
//! use autotest::services::{Comparator, ValidationOptions};
//!
//! let comparator = Comparator::new(ValidationOptions::default());
//! let report = comparator.compare(&out_csv, &ref_csv, &out_json, &ref_json)?;
//! if !report.is_ok() {
//!     println!("{}", report.message());
//! }
//! ```

pub mod extraction;
pub mod modules;
pub mod validation;

pub use extraction::{ExtractionError, ExtractionInvoker};
pub use modules::{
    DataExtractionModule, DEFAULT_MODULES, ExtractionLayout, ModuleDescriptor, ModuleError,
    ModuleRegistry, PlaceholderModule, RegistryError, RunPaths, TestModule,
};
pub use validation::{
    Comparator, Discrepancy, ValidationError, ValidationOptions, ValidationReport,
};
