//! Response Worker (C3): produces a therapist-style reply conditioned on the
//! current text, the classified emotion, and bounded dialogue history,
//! behind a hard quality floor with emotion-specific scripted fallbacks.
//!
//! Holds the classification-adjacent algorithms and wire protocol shared by
//! the `fae-response-worker` binary and, for in-process testing, the
//! orchestrator.

pub mod extract;
pub mod fallback;
pub mod generator;
pub mod prompt;
pub mod protocol;
pub mod quality;

pub use generator::{GeneratedCandidate, ModelBackend, PatternBackend, ResponseBackend, generate_with_gate};
pub use protocol::{ModelInfo, QualityIndicators, ResponseReply, ResponseRequest, handle_request};
pub use quality::QualitySignals;
