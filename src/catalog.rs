use crate::platform::{SpeechSynthesizer, Voice};

/// Label of the leading "no choice" option.
pub const PLACEHOLDER_LABEL: &str = "Select a voice";

/// One entry of the voice picker. `index: None` is the placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceOption {
    pub index: Option<usize>,
    pub label: String,
}

/// Voices last reported by the synthesizer, in platform order.
///
/// Platforms often enumerate voices lazily, so the catalog is refreshed again
/// whenever the synthesizer signals a change. An empty catalog is valid.
#[derive(Debug, Clone, Default)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-read the voice list from `synth`.
    pub fn refresh<S: SpeechSynthesizer + ?Sized>(&mut self, synth: &S) {
        self.voices = synth.voices();
        log::info!("Loaded {} voices", self.voices.len());
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn get(&self, index: usize) -> Option<&Voice> {
        self.voices.get(index)
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Picker entries: the placeholder followed by `"{name} ({lang})"` per voice.
    pub fn options(&self) -> Vec<VoiceOption> {
        std::iter::once(VoiceOption {
            index: None,
            label: PLACEHOLDER_LABEL.to_string(),
        })
        .chain(self.voices.iter().enumerate().map(|(i, v)| VoiceOption {
            index: Some(i),
            label: v.label(),
        }))
        .collect()
    }
}
