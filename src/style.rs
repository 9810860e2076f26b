//! Map a [`Prediction`] onto the prosody and voice of an utterance.
//!
//! Accent handling is a stand-in: it only picks a platform voice at a position
//! proportional to the predicted accent. Nothing here transforms the voice
//! itself.

use crate::model::Prediction;
use crate::platform::{UtteranceRequest, Voice};

pub const MIN_RATE: f32 = 0.8;
pub const RATE_SPAN: f32 = 0.4;
pub const MIN_PITCH: f32 = 0.5;

/// Speaking rate for a predicted tone, in `[0.8, 1.2]`.
pub fn rate_for_tone(tone: f32) -> f32 {
    MIN_RATE + tone * RATE_SPAN
}

/// Platform pitch for a predicted pitch, in `[0.5, 1.5]`.
pub fn pitch_for(pitch: f32) -> f32 {
    MIN_PITCH + pitch
}

/// Voice at `floor(accent * voices.len())`, if that position exists.
pub fn voice_for_accent(accent: f32, voices: &[Voice]) -> Option<&Voice> {
    let index = (accent * voices.len() as f32).floor();
    if index.is_nan() || index < 0.0 {
        return None;
    }
    voices.get(index as usize)
}

/// Overwrite pitch and rate from `params`, and the voice when the accent maps
/// onto one. An empty or too short voice list keeps the request's voice.
pub fn apply_style(request: &mut UtteranceRequest, params: &Prediction, voices: &[Voice]) {
    request.pitch = pitch_for(params.pitch);
    request.rate = rate_for_tone(params.tone);

    if let Some(voice) = voice_for_accent(params.accent, voices) {
        request.voice = Some(voice.clone());
    }
}
