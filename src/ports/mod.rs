//! Port traits for the engine's external collaborators.

pub mod cache_port;
pub mod config_port;
pub mod data_port;
pub mod range_port;
