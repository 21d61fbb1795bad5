//! Services layered over the bridge: tool-call handling and logging

pub mod interaction;
pub mod logging;

pub use interaction::{result_payload, InteractionService};
