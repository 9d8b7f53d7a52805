//! Persistent-worker subprocess channel.
//!
//! A worker is a long-lived child process (emotion, response, or TTS) that
//! speaks newline-delimited JSON over its own stdin/stdout. [`WorkerChannel`]
//! owns the spawn/restart/backoff lifecycle and the one-in-one-out call
//! protocol; the domain modules (`emotion`, `response`, `tts`) build typed
//! requests and replies on top of it.

mod channel;
mod error;
pub mod stdio_loop;

pub use channel::{backoff_for_attempt, WorkerChannel, WorkerHealth, WorkerSpec, WorkerState};
pub use error::WorkerError;
