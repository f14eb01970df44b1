//! podium library crate — ranking sessions as a resumable state machine.
//!
//! The primary interface is the `podium` binary. This lib.rs exposes the
//! engine underneath it — rosters and judgments, the three ranking drivers,
//! the comparison cache, snapshot undo, and session persistence — so that
//! integration tests and the simulation harness can drive a full session
//! without a terminal.

pub mod cache;
pub mod candidate;
pub mod config;
pub mod driver;
pub mod error;
pub mod export;
pub mod interactive;
pub mod judgment;
pub mod progress;
pub mod session;
pub mod sim;
pub mod store;
pub mod telemetry;
pub mod tier;
pub mod undo;
