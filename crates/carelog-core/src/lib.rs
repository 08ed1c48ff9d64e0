//! Core domain + application logic for carelog.
//!
//! Turns short chat messages about a baby's day into structured care records
//! and reconciles them against a store keyed by (time, category). This crate
//! is transport-agnostic: chat platforms and databases live behind ports
//! (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod parser;
pub mod service;
pub mod store;
pub mod utils;

pub use errors::{Error, Result};
