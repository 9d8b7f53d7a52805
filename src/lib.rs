//! Fae: the inference-serving core of a multimodal emotional-therapy
//! assistant.
//!
//! A Turn Orchestrator fans each conversational turn out across three
//! persistent worker subprocesses:
//! - **Emotion Worker**: classifies text (optionally fused with voice
//!   features) into a fine-grained emotion taxonomy.
//! - **Response Worker**: generates a therapist-style reply via `mistralrs`,
//!   behind a hard quality floor with scripted emotion-specific fallbacks.
//! - **TTS Worker**: renders the reply to speech via a native platform
//!   synthesizer.
//!
//! Workers are owned and supervised through a generic [`worker::WorkerChannel`]
//! (spawn, restart-with-backoff, health, newline-delimited JSON wire
//! protocol) shared across all three.

// Fail early with a clear message when the metal feature is enabled but the
// Metal Toolchain is not installed. Without this, mistralrs panics deep in a
// build script with an opaque error.
#[cfg(missing_metal_toolchain)]
compile_error!(
    "The `metal` feature requires Apple's Metal Toolchain. Install it with:\n\n    \
     xcodebuild -downloadComponent MetalToolchain\n\n\
     This is a one-time ~700 MB download."
);

pub mod config;
pub mod emotion;
pub mod error;
pub mod orchestrator;
pub mod response;
pub mod tts;
pub mod worker;

pub use error::{CoreError, Result};
