//! Integration tests: the orchestrator driven end to end against in-memory
//! host, solver and price collaborators.

mod mock_host;
mod workflow;
