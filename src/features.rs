//! Numeric descriptors of the text being spoken and of user feedback.

/// Number of input features consumed by the parameter model.
pub const FEATURE_DIM: usize = 5;

/// Number of values the parameter model predicts (accent, tone, pitch).
pub const TARGET_DIM: usize = 3;

/// `[style index, character count, word count, sentence count, exclamation count]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f32; FEATURE_DIM]);

impl FeatureVector {
    /// Describe `text` spoken in the style at `style_index`.
    ///
    /// Length is counted in UTF-16 code units, so characters outside the
    /// Basic Multilingual Plane (most emoji) count twice.
    /// Words are the pieces left by splitting on single spaces, so empty text
    /// still counts one word and runs of spaces count empty words. Sentences
    /// and exclamations are plain counts of `.` and `!`.
    pub fn from_text(style_index: usize, text: &str) -> Self {
        let chars = text.encode_utf16().count();
        let words = text.split(' ').count();
        let sentences = text.matches('.').count();
        let exclamations = text.matches('!').count();

        Self([
            style_index as f32,
            chars as f32,
            words as f32,
            sentences as f32,
            exclamations as f32,
        ])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

/// Raw feedback slider positions, each 0-100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliderValues {
    pub accent: u8,
    pub tone: u8,
    pub pitch: u8,
}

impl SliderValues {
    pub const MAX: u8 = 100;

    pub fn new(accent: u8, tone: u8, pitch: u8) -> Self {
        Self { accent, tone, pitch }
    }

    /// Training target `[accent, tone, pitch]` in [0, 1]. Positions past
    /// [`MAX`](Self::MAX) count as `MAX`.
    pub fn target(&self) -> [f32; TARGET_DIM] {
        let norm = |v: u8| v.min(Self::MAX) as f32 / Self::MAX as f32;
        [norm(self.accent), norm(self.tone), norm(self.pitch)]
    }
}
