//! Core module: streaming conversation state and session orchestration.
//!
//! - `events`: conversation types and observer update channels
//! - `turn`: per-turn event folding (`TurnAccumulator`)
//! - `session`: per-session lifecycle state machine
//! - `task`: plan-then-execute task controller
//! - `tabs`: bounded registry of live session tabs

pub mod events;
pub mod session;
pub mod tabs;
pub mod task;
pub mod turn;
