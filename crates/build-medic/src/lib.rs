//! build-medic: command-line front end for `medic-engine`.
//!
//! Loads layered configuration, runs one repair session and writes a JSON
//! session report.

pub mod config;
pub mod report;
