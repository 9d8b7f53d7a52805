//! Emotion Worker (C2): classifies text (optionally enriched with audio) into
//! the fine-grained emotion taxonomy described in the glossary.
//!
//! This module holds the classification algorithms and wire protocol shared
//! by the `fae-emotion-worker` binary (which runs them behind stdin/stdout)
//! and, for in-process testing, the orchestrator.

pub mod context;
pub mod fusion;
pub mod labels;
pub mod protocol;
pub mod text;
pub mod voice;

pub use fusion::{CombinedEmotion, fuse};
pub use labels::EmotionLabel;
pub use protocol::{EmotionRequest, handle_request};
pub use text::{TextEmotionResult, classify_text};
pub use voice::{VoiceEmotionResult, VoiceFeatures, classify_voice, extract_features, neutral_no_audio};
