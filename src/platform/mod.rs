//! Platform capabilities consumed by a [`Session`](crate::session::Session).
//!
//! A session never talks to audio hardware directly. It drives a
//! [`SpeechSynthesizer`] and an [`AudioCapture`] through commands, and the host
//! feeds back whatever the platform reports as [`PlatformEvent`]s.
//!
//! # Available Platforms
//!
//! Enable platforms via Cargo features:
//! - `loopback` - headless synthesizer and WAV capture (enabled by default)

#[cfg(feature = "loopback")]
pub mod loopback;

use std::fs;
use std::path::{Path, PathBuf};

use derive_builder::Builder;

#[derive(thiserror::Error, Debug)]
pub enum PlatformError {
    #[error("Platform capability unavailable: {0}")]
    Unavailable(String),
    #[error("Platform operation failed: {0}")]
    Failed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A synthesis voice as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag (e.g. `"en-US"`).
    pub lang: String,
    /// Opaque platform handle used to address the voice.
    pub id: String,
    /// Whether the platform marks this as its default voice.
    pub default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            lang: lang.into(),
            default: false,
        }
    }

    /// Display label, `"{name} ({lang})"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.lang)
    }
}

/// One text-to-speech playback request.
///
/// `voice: None` lets the platform pick its default voice.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(setter(into))]
pub struct UtteranceRequest {
    pub text: String,
    #[builder(default)]
    pub voice: Option<Voice>,
    #[builder(default = "1.0")]
    pub pitch: f32,
    #[builder(default = "1.0")]
    pub rate: f32,
}

impl UtteranceRequest {
    /// A request at neutral pitch and rate.
    pub fn new(text: impl Into<String>, voice: Option<Voice>) -> Self {
        Self {
            text: text.into(),
            voice,
            pitch: 1.0,
            rate: 1.0,
        }
    }

    pub fn builder() -> UtteranceRequestBuilder {
        UtteranceRequestBuilder::default()
    }
}

/// Playback state as observed on the synthesizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
}

impl PlaybackState {
    /// Collapse the platform's `speaking`/`paused` pair. Paused wins.
    pub fn from_flags(speaking: bool, paused: bool) -> Self {
        match (speaking, paused) {
            (_, true) => PlaybackState::Paused,
            (true, false) => PlaybackState::Speaking,
            (false, false) => PlaybackState::Idle,
        }
    }
}

/// Asynchronous notifications the host relays from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// The synthesizer's voice list changed (or finished loading lazily).
    VoicesChanged,
    /// The current utterance finished playing naturally.
    UtteranceEnded,
    /// A recorded chunk, delivered in arrival order.
    CaptureData(Vec<u8>),
    /// The capture pipeline flushed its last chunk and stopped.
    CaptureStopped,
}

/// Speech synthesizer provided by the platform.
pub trait SpeechSynthesizer {
    /// Voices currently known to the platform. May be empty until the
    /// platform finishes loading them.
    fn voices(&self) -> Vec<Voice>;

    /// Queue an utterance. Completion is reported as
    /// [`PlatformEvent::UtteranceEnded`].
    fn speak(&mut self, request: &UtteranceRequest) -> Result<(), PlatformError>;

    fn pause(&mut self);

    fn resume(&mut self);

    /// Drop the current utterance without emitting an end event.
    fn cancel(&mut self);

    fn is_speaking(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn playback_state(&self) -> PlaybackState {
        PlaybackState::from_flags(self.is_speaking(), self.is_paused())
    }
}

/// Recorder bound to the synthesizer's audio output.
///
/// Chunks arrive as [`PlatformEvent::CaptureData`]; after [`stop`](Self::stop)
/// the pipeline flushes and reports [`PlatformEvent::CaptureStopped`].
pub trait AudioCapture {
    fn start(&mut self) -> Result<(), PlatformError>;

    fn stop(&mut self) -> Result<(), PlatformError>;

    /// Container type of the produced bytes (e.g. `"audio/wav"`).
    fn mime_type(&self) -> &str;
}

/// User-facing "save file" action.
pub trait FileSaver {
    fn save(&mut self, bytes: &[u8], filename: &str, mime_type: &str) -> Result<(), PlatformError>;
}

/// User-facing modal acknowledgment.
pub trait Notifier {
    fn notify(&mut self, message: &str);
}

/// Saves downloads into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    dir: PathBuf,
}

impl DirectorySaver {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl FileSaver for DirectorySaver {
    fn save(&mut self, bytes: &[u8], filename: &str, mime_type: &str) -> Result<(), PlatformError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(filename);
        fs::write(&path, bytes)?;
        log::info!(
            "Saved {} bytes ({mime_type}) to {}",
            bytes.len(),
            path.display()
        );
        Ok(())
    }
}

/// Notifier that writes messages to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&mut self, message: &str) {
        log::info!("{message}");
    }
}
