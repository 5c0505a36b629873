//! buildrules-lib: the rule execution engine behind `br`.
//!
//! This crate provides the pieces a build is assembled from:
//! - `ConfigStore`: schema-validated, read-only configuration documents
//! - `Fingerprint`: deterministic content hashes used for change detection
//! - `Rule`: one executable or loggable step of a build plan
//! - `Executor` / `Builder`: sequential, fail-fast execution of a rule list
//! - `InstalledStateLedger`: persisted fingerprints of installed units
//! - `Deployer`: post-build strategies appended after the build rules

pub mod config;
pub mod consts;
pub mod deploy;
pub mod execute;
pub mod gate;
pub mod ledger;
pub mod rule;
pub mod target;
pub mod util;
