//! # hitl-core
//!
//! Human response bridge: delivers an agent's question to a human over a remote chat relay
//! (Telegram) or a local on-screen dialog, waits for the reply under a deadline, and normalizes
//! the result. Also hosts the MCP stdio server that exposes the bridge as tools.

pub mod bridge;
pub mod channel;
pub mod models;
pub mod providers;
pub mod server;
pub mod services;

pub use bridge::{BridgeCoordinator, HealthReport, Resolution};
