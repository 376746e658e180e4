//! Command handlers.

pub mod config;
pub mod estimate;
pub mod events;
pub mod label;
pub mod logs;
mod output;
pub mod serve;
pub mod types;
