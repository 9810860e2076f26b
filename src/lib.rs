//! # tts-tuner
//!
//! A Rust library that speaks text through a platform speech synthesizer,
//! records what was spoken, and tunes pitch, rate and voice with a tiny
//! regression model trained from user feedback.
//!
//! ## Features
//!
//! - **Speech sessions**: one [`Session`] drives speak, pause, resume, stop and
//!   download over any [`SpeechSynthesizer`](platform::SpeechSynthesizer) and
//!   [`AudioCapture`](platform::AudioCapture)
//! - **Recording**: capture chunks are joined into a downloadable [`CapturedAudio`]
//! - **Feedback tuning**: slider feedback trains a 5→10→3 [`ParameterModel`] online
//! - **Loopback platform**: a headless synthesizer and WAV recorder (`loopback` feature)
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! tts-tuner = "2026.10"
//! ```
//!
//! ```ignore
//! use tts_tuner::platform::{DirectorySaver, LogNotifier};
//! use tts_tuner::{Session, SessionConfig, SliderValues};
//!
//! let mut session = Session::new(SessionConfig::default(), synth, capture, LogNotifier);
//! session.initialize_model();
//! session.set_text("Hello world.");
//! session.speak()?;
//! // ...relay platform events through session.handle_event(...)
//! session.download(&mut DirectorySaver::new("downloads"))?;
//! session.submit_feedback(SliderValues::new(80, 40, 60))?;
//! # Ok::<(), tts_tuner::SessionError>(())
//! ```

pub mod catalog;
pub mod config;
pub mod controls;
pub mod features;
pub mod model;
pub mod platform;
pub mod session;
pub mod style;

pub use catalog::VoiceCatalog;
pub use config::SessionConfig;
pub use controls::{ControlFlags, ControlPoller};
pub use features::{FeatureVector, SliderValues};
pub use model::{ModelError, ModelParams, ParameterModel, Prediction};
pub use session::{CycleState, Session, SessionError, SessionEvent};

/// The recording of one utterance, as produced by the capture pipeline.
///
/// The container format is whatever the capture declared in `mime_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedAudio {
    /// Capture chunks joined in arrival order
    pub bytes: Vec<u8>,
    /// Container type declared by the capture (e.g. `"audio/wav"`)
    pub mime_type: String,
}

impl CapturedAudio {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
