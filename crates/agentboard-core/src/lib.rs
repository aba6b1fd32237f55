//! Core agentboard library (streaming decoder, session engine, task phases, tab registry).

pub mod api;
pub mod config;
pub mod core;
pub mod logging;
