//! Domain logic for the Autobids portal.
//!
//! Everything in this crate is free of database access so it can be unit
//! tested in isolation: DICOM query modelling, cfmm2tar/tar2bids argument
//! building and output parsing, dataset naming, directory trees, study
//! request validation, and the shared subprocess runner.

pub mod cfmm2tar;
pub mod dicom;
pub mod error;
pub mod filesystem;
pub mod heuristics;
pub mod naming;
pub mod process;
pub mod roles;
pub mod study;
pub mod tar2bids;
pub mod types;
