//! AUGUR: trust-weighted market forecasting with a closed feedback loop
//!
//! Library crate exposing all modules for use by integration tests
//! and the worker binary.

pub mod config;
pub mod types;
pub mod feed;
pub mod llm;
pub mod strategy;
pub mod engine;
pub mod storage;
pub mod worker;
