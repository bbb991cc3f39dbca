//! Capture & streaming controller
//!
//! A single dispatch task owns the session state machine and reacts to
//! three inputs: control commands, inbound server events, and captured
//! audio blocks. No session state is touched anywhere else.

mod controller;
mod state;

pub use controller::{Command, ControllerHandle, SessionStats, StreamController};
pub use state::{InvalidTransition, SessionPhase};
