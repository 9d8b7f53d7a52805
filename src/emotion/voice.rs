//! Voice-path (spectral) emotion classification.
//!
//! Reads a mono PCM WAV clip and derives four scalar features — RMS energy,
//! zero-crossing rate, a coarse autocorrelation pitch estimate, and a
//! single-FFT spectral centroid — then applies a fixed decision table. This
//! is the "fast spectral" path from the component design: cheap enough to
//! run on every turn, deliberately capped below 0.70 confidence since it
//! exists to disambiguate the text path rather than dominate it.

use super::labels::EmotionLabel;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Only the first this many seconds of a clip influence the features.
const MAX_ANALYSIS_SECS: f32 = 10.0;

/// Autocorrelation lag search range (in samples, at the clip's native rate),
/// corresponding to a pitch search window of roughly 80 Hz - 800 Hz at 16 kHz.
const PITCH_LAG_MIN: usize = 20;
const PITCH_LAG_MAX: usize = 200;

/// Errors decoding or analyzing an audio clip.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// The clip could not be found or opened.
    #[error("audio file not found or unreadable: {0}")]
    NotFound(String),
    /// The WAV container could not be parsed.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// The clip decoded to zero samples.
    #[error("audio clip is empty")]
    Empty,
    /// A computed feature was non-finite (NaN/inf) — a fatal extraction error
    /// per the data model's `VoiceFeatures` invariant.
    #[error("non-finite value encountered extracting feature: {0}")]
    NonFinite(&'static str),
}

/// Scalar acoustic features extracted from a clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceFeatures {
    /// RMS energy over the analyzed window.
    pub energy: f64,
    /// Zero-crossing rate (crossings per sample).
    pub zero_crossing_rate: f64,
    /// Coarse pitch estimate in Hz; 0.0 when unvoiced / no clear peak.
    pub pitch_hz: f64,
    /// Spectral centroid in Hz.
    pub spectral_centroid_hz: f64,
    /// Estimated tempo in BPM, when derivable; omitted from the fast path.
    pub tempo_bpm: Option<f64>,
    /// Duration of the analyzed window, in seconds.
    pub duration: f64,
}

/// Result of the voice-path classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceEmotionResult {
    pub label: EmotionLabel,
    pub confidence: f64,
    pub features: VoiceFeatures,
}

/// Decodes `path` as a mono PCM WAV and extracts [`VoiceFeatures`] from the
/// first [`MAX_ANALYSIS_SECS`] seconds.
pub fn extract_features(path: &Path) -> Result<VoiceFeatures, VoiceError> {
    let mut reader =
        hound::WavReader::open(path).map_err(|e| VoiceError::NotFound(e.to_string()))?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate as f64;
    let channels = spec.channels.max(1) as usize;

    let max_samples = (MAX_ANALYSIS_SECS as f64 * sample_rate) as usize * channels;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .take(max_samples)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| VoiceError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .take(max_samples)
                .map(|s| s.map(|v| v as f32 / max_value))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| VoiceError::Decode(e.to_string()))?
        }
    };

    if samples.is_empty() {
        return Err(VoiceError::Empty);
    }

    // Downmix to mono if needed.
    let mono: Vec<f32> = if channels > 1 {
        samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    } else {
        samples
    };

    let duration = mono.len() as f64 / sample_rate;

    let rms = {
        let sum_sq: f64 = mono.iter().map(|&s| (s as f64).powi(2)).sum();
        (sum_sq / mono.len() as f64).sqrt()
    };
    if !rms.is_finite() {
        return Err(VoiceError::NonFinite("energy"));
    }

    let zcr = zero_crossing_rate(&mono);
    if !zcr.is_finite() {
        return Err(VoiceError::NonFinite("zero_crossing_rate"));
    }

    let pitch_hz = estimate_pitch(&mono, sample_rate);
    if !pitch_hz.is_finite() {
        return Err(VoiceError::NonFinite("pitch_hz"));
    }

    let centroid = spectral_centroid(&mono, sample_rate);
    if !centroid.is_finite() {
        return Err(VoiceError::NonFinite("spectral_centroid_hz"));
    }

    Ok(VoiceFeatures {
        energy: rms,
        zero_crossing_rate: zcr,
        pitch_hz,
        spectral_centroid_hz: centroid,
        tempo_bpm: None,
        duration,
    })
}

fn zero_crossing_rate(samples: &[f32]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

/// Coarse pitch estimate via an autocorrelation peak search over
/// [`PITCH_LAG_MIN`, `PITCH_LAG_MAX`] sample lags. Returns 0.0 if no clear
/// peak is found (unvoiced).
fn estimate_pitch(samples: &[f32], sample_rate: f64) -> f64 {
    let max_lag = PITCH_LAG_MAX.min(samples.len().saturating_sub(1));
    if max_lag <= PITCH_LAG_MIN {
        return 0.0;
    }

    let mut best_lag = 0usize;
    let mut best_value = 0.0f64;
    for lag in PITCH_LAG_MIN..=max_lag {
        let mut sum = 0.0f64;
        for i in 0..(samples.len() - lag) {
            sum += (samples[i] as f64) * (samples[i + lag] as f64);
        }
        if sum > best_value {
            best_value = sum;
            best_lag = lag;
        }
    }

    if best_lag == 0 || best_value <= 0.0 {
        0.0
    } else {
        sample_rate / best_lag as f64
    }
}

/// Spectral centroid (Hz) from a single FFT over the whole analyzed window.
fn spectral_centroid(samples: &[f32], sample_rate: f64) -> f64 {
    let n = samples.len().next_power_of_two().max(2);
    let mut buffer: Vec<Complex<f32>> = samples
        .iter()
        .map(|&s| Complex { re: s, im: 0.0 })
        .chain(std::iter::repeat(Complex { re: 0.0, im: 0.0 }))
        .take(n)
        .collect();

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(n);
    fft.process(&mut buffer);

    let half = n / 2;
    let bin_hz = sample_rate / n as f64;

    let mut weighted_sum = 0.0f64;
    let mut magnitude_sum = 0.0f64;
    for (i, bin) in buffer.iter().take(half).enumerate() {
        let magnitude = bin.norm() as f64;
        weighted_sum += magnitude * (i as f64 * bin_hz);
        magnitude_sum += magnitude;
    }

    if magnitude_sum <= f64::EPSILON {
        0.0
    } else {
        weighted_sum / magnitude_sum
    }
}

/// Applies the decision table from the component design to a feature set.
pub fn classify_voice(features: VoiceFeatures) -> VoiceEmotionResult {
    let VoiceFeatures {
        energy,
        zero_crossing_rate: zcr,
        pitch_hz,
        ..
    } = features;

    let (label, confidence) = if energy > 0.1 && pitch_hz > 200.0 && zcr < 0.8 {
        (EmotionLabel::Joy, 0.70)
    } else if energy > 0.1 && (pitch_hz <= 200.0 || zcr >= 0.8) {
        (EmotionLabel::Anger, 0.65 + 0.05 * (zcr.min(1.0)))
    } else if energy < 0.05 {
        (EmotionLabel::Sadness, 0.65)
    } else if zcr > 1.0 {
        (EmotionLabel::Fear, 0.60)
    } else {
        (EmotionLabel::Neutral, 0.60)
    };

    VoiceEmotionResult {
        label,
        confidence: confidence.min(0.70),
        features,
    }
}

/// The result used when no audio is supplied at all.
pub fn neutral_no_audio() -> VoiceEmotionResult {
    VoiceEmotionResult {
        label: EmotionLabel::Neutral,
        confidence: 0.5,
        features: VoiceFeatures {
            energy: 0.0,
            zero_crossing_rate: 0.0,
            pitch_hz: 0.0,
            spectral_centroid_hz: 0.0,
            tempo_bpm: None,
            duration: 0.0,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(energy: f64, zcr: f64, pitch: f64) -> VoiceFeatures {
        VoiceFeatures {
            energy,
            zero_crossing_rate: zcr,
            pitch_hz: pitch,
            spectral_centroid_hz: 1000.0,
            tempo_bpm: None,
            duration: 2.0,
        }
    }

    #[test]
    fn loud_high_pitch_low_zcr_is_joy() {
        let result = classify_voice(features(0.2, 0.3, 250.0));
        assert_eq!(result.label, EmotionLabel::Joy);
        assert_eq!(result.confidence, 0.70);
    }

    #[test]
    fn loud_low_pitch_is_anger() {
        let result = classify_voice(features(0.2, 0.3, 150.0));
        assert_eq!(result.label, EmotionLabel::Anger);
    }

    #[test]
    fn quiet_is_sadness() {
        let result = classify_voice(features(0.02, 0.3, 150.0));
        assert_eq!(result.label, EmotionLabel::Sadness);
        assert_eq!(result.confidence, 0.65);
    }

    #[test]
    fn high_zcr_is_fear() {
        let result = classify_voice(features(0.07, 1.5, 150.0));
        assert_eq!(result.label, EmotionLabel::Fear);
    }

    #[test]
    fn otherwise_neutral() {
        let result = classify_voice(features(0.07, 0.5, 150.0));
        assert_eq!(result.label, EmotionLabel::Neutral);
    }

    #[test]
    fn voice_confidence_never_exceeds_point_seven() {
        for energy in [0.0, 0.05, 0.1, 0.5, 1.0] {
            for zcr in [0.0, 0.5, 0.8, 1.0, 2.0] {
                for pitch in [0.0, 100.0, 200.0, 500.0] {
                    let result = classify_voice(features(energy, zcr, pitch));
                    assert!(result.confidence <= 0.70);
                }
            }
        }
    }

    #[test]
    fn no_audio_yields_neutral_half_confidence() {
        let result = neutral_no_audio();
        assert_eq!(result.label, EmotionLabel::Neutral);
        assert_eq!(result.confidence, 0.5);
    }

    #[test]
    fn zero_crossing_rate_of_alternating_signal_is_near_one() {
        let samples: Vec<f32> = (0..100)
            .map(|i| if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let zcr = zero_crossing_rate(&samples);
        assert!(zcr > 0.9);
    }
}
