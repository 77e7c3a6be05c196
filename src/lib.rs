//! # nmrjson - Bruker NMR Data Extraction and Canonical JSON Normalization
//!
//! `nmrjson` reads a Bruker TopSpin-style dataset directory, classifies and
//! parses the experiments it contains, and normalizes the result into a
//! single canonical JSON document suitable for submission to a remote
//! structure-assignment analysis service.
//!
//! ## Pipeline
//!
//! ```text
//! dataset root ──► Inventory (reader) ──► user selection ──► CanonicalDocument (convert)
//!                     │                       (external GUI)
//!                     └─ per directory: params ► peaklist/integrals ► classify
//! ```
//!
//! The crate covers extraction and normalization only. Peak assignment,
//! chemical-shift prediction, and spectral analysis belong to the remote
//! service; directory picking and role assignment belong to the host GUI,
//! which consumes the [`reader::Inventory`] and produces a
//! [`convert::UserSelection`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use nmrjson::prelude::*;
//!
//! let rules = RuleTable::builtin();
//! let inventory = Inventory::read(Path::new("/data/sample"), &rules)?;
//!
//! // A GUI would gather this from the user; auto-select takes every
//! // classified experiment that has peaks.
//! let selection = UserSelection::auto_select(&inventory);
//!
//! let document = build_document(&inventory, &selection, Some("c1ccccc1"))?;
//! println!("{}", document.to_json_pretty()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error posture
//!
//! Only two conditions reach the caller as errors:
//! [`params::ParamError::MissingRequiredParameter`] (a directory's
//! parameters cannot determine nucleus or dimensionality; the directory is
//! excluded and the reader logs it) and [`convert::SelectionError`] (a
//! user selection that cannot produce a sound document). Everything else —
//! malformed peak rows, unrecognized experiment types, absent integrals —
//! degrades to counted, flagged partial data that stays visible in the
//! inventory.
//!
//! ## Architecture
//!
//! - [`params`]: JCAMP-DX style parameter file parsing with typed accessors
//! - [`peaklist`]: `peaklist.xml` parsing with malformed-row accounting
//! - [`integrals`]: `int2d` integration-region parsing
//! - [`classify`]: ordered-rule experiment-type classification
//! - [`reader`]: directory walking and inventory assembly
//! - [`convert`]: selection validation and canonical document construction

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]

pub mod classify;
pub mod convert;
pub mod integrals;
pub mod params;
pub mod peaklist;
pub mod reader;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::classify::{ExperimentKind, ExperimentRule, ExperimentSignature, RuleTable};
    pub use crate::convert::{
        build_document, CanonicalDocument, ExperimentBlock, Role, SelectionEntry, SelectionError,
        UserSelection,
    };
    pub use crate::integrals::{IntegralList, IntegrationRegion};
    pub use crate::params::{ParamError, ParamMap, ParamValue};
    pub use crate::peaklist::{Dimensionality, PeakEntry, PeakList};
    pub use crate::reader::{ExperimentDirectory, ExperimentSummary, Inventory, ProcData};
}
