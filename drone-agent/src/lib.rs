//! Library surface for the drone mission agent binary: the pieces `main.rs`
//! wires together, and what integration tests exercise directly.

pub mod agent;
pub mod behaviors;
pub mod controller;
pub mod detector;
pub mod dispatch;
pub mod machine;
pub mod simulated;
pub mod snapshot;
pub mod strategy;

pub use agent::{run, AgentContext};
