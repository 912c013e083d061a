//! SBCPILOT: Squad Building Challenge autopilot
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod control;
pub mod engine;
pub mod host;
pub mod prices;
pub mod pricing;
pub mod settings;
pub mod solver;
pub mod state;
pub mod storage;
pub mod types;
