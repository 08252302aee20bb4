//! Network side: the backend API client and the statistics poller.

mod client;
mod poller;

pub use client::{ApiClient, ApiError};
pub use poller::{spawn_poller, PollHandle, PollMachine, PollState};
