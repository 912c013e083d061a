//! Core engine: inventory sync, price cache, candidate pricing, solution
//! mapping and the challenge queue orchestrator that ties them together.

pub mod candidates;
pub mod descriptor;
pub mod hooks;
pub mod inventory;
pub mod mapper;
pub mod orchestrator;
pub mod price_cache;

pub use hooks::CoreHooks;
pub use orchestrator::{ChainOutcome, Orchestrator};
