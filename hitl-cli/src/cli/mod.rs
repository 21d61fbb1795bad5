//! CLI command handling

pub mod handlers;
pub mod provider;
pub mod provider_handlers;
