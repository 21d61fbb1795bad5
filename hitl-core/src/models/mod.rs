//! Data models for the human-in-the-loop bridge

pub mod configuration;
pub mod outcome;
pub mod request;
pub mod validation;

pub use configuration::*;
pub use outcome::*;
pub use request::*;
pub use validation::*;
