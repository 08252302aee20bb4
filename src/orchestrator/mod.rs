//! Application-level orchestration.
//!
//! This module owns the session lifecycle (trigger, open, close, delete) and the active
//! statistics poller. UI and headless layers call into it so the presentation code never
//! talks to the network or the store directly.

mod controller;
mod trigger;

pub(crate) use controller::{run_controller, UiCommand};
pub(crate) use trigger::trigger_session;
