//! Headless platform: a placeholder sine synthesizer and an in-memory WAV recorder.
//!
//! Nothing here reaches an audio device. The host moves audio and events by
//! hand, which is what the demos and tests do:
//!
//! ```rust
//! use tts_tuner::platform::loopback::{LoopbackSynthesizer, WavCapture};
//! use tts_tuner::platform::{AudioCapture, PlatformEvent, SpeechSynthesizer, UtteranceRequest};
//!
//! let mut synth = LoopbackSynthesizer::new(vec![]);
//! let mut capture = WavCapture::new();
//!
//! capture.start()?;
//! synth.speak(&UtteranceRequest::builder().text("Hi.").build()?)?;
//! capture.feed(&synth.render());
//! assert_eq!(synth.finish(), Some(PlatformEvent::UtteranceEnded));
//! capture.stop()?;
//! assert_eq!(capture.drain_events().last(), Some(&PlatformEvent::CaptureStopped));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::VecDeque;
use std::f32::consts::TAU;
use std::io::Cursor;

use super::{AudioCapture, PlatformError, PlatformEvent, SpeechSynthesizer, UtteranceRequest, Voice};

/// Output sample rate of the loopback synthesizer.
pub const SAMPLE_RATE: u32 = 24000;

/// Rendered duration per input character at rate 1.0.
const SECS_PER_CHAR: f32 = 0.06;

/// Base tone frequency at pitch 1.0.
const BASE_FREQ_HZ: f32 = 220.0;

const AMPLITUDE: f32 = 0.2;

/// Size of the WAV pieces emitted as [`PlatformEvent::CaptureData`].
pub const DEFAULT_CHUNK_BYTES: usize = 4096;

/// Synthesizer that "speaks" by rendering a tone whose length follows the
/// text and rate and whose frequency follows the pitch.
#[derive(Debug, Default)]
pub struct LoopbackSynthesizer {
    voices: Vec<Voice>,
    pending_voices: Option<Vec<Voice>>,
    current: Option<UtteranceRequest>,
    paused: bool,
    unavailable: bool,
    history: Vec<UtteranceRequest>,
}

impl LoopbackSynthesizer {
    pub fn new(voices: Vec<Voice>) -> Self {
        Self {
            voices,
            ..Default::default()
        }
    }

    /// A synthesizer whose voice list stays empty until [`load_voices`](Self::load_voices).
    pub fn lazy(voices: Vec<Voice>) -> Self {
        Self {
            pending_voices: Some(voices),
            ..Default::default()
        }
    }

    /// A synthesizer that refuses every utterance.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Default::default()
        }
    }

    /// Make every following [`speak`](SpeechSynthesizer::speak) fail (or succeed again).
    pub fn set_unavailable(&mut self, unavailable: bool) {
        self.unavailable = unavailable;
    }

    /// Finish the lazy voice load.
    pub fn load_voices(&mut self) -> Option<PlatformEvent> {
        let voices = self.pending_voices.take()?;
        log::debug!("Loopback voices loaded ({})", voices.len());
        self.voices = voices;
        Some(PlatformEvent::VoicesChanged)
    }

    /// The utterance currently playing, if any.
    pub fn current(&self) -> Option<&UtteranceRequest> {
        self.current.as_ref()
    }

    /// Every utterance accepted so far, in order.
    pub fn history(&self) -> &[UtteranceRequest] {
        &self.history
    }

    /// Render the current utterance. Empty when nothing is playing.
    pub fn render(&self) -> Vec<f32> {
        let Some(request) = &self.current else {
            return Vec::new();
        };

        let rate = request.rate.max(0.1);
        let secs = request.text.chars().count() as f32 * SECS_PER_CHAR / rate;
        let n_samples = (secs * SAMPLE_RATE as f32) as usize;
        let freq = BASE_FREQ_HZ * request.pitch.max(0.1);

        (0..n_samples)
            .map(|i| AMPLITUDE * (TAU * freq * i as f32 / SAMPLE_RATE as f32).sin())
            .collect()
    }

    /// End the current utterance naturally.
    pub fn finish(&mut self) -> Option<PlatformEvent> {
        self.current.take()?;
        self.paused = false;
        Some(PlatformEvent::UtteranceEnded)
    }
}

impl SpeechSynthesizer for LoopbackSynthesizer {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, request: &UtteranceRequest) -> Result<(), PlatformError> {
        if self.unavailable {
            return Err(PlatformError::Unavailable(
                "speech synthesis is not supported".to_string(),
            ));
        }
        log::debug!(
            "Loopback speak: {} chars, pitch={:.2}, rate={:.2}",
            request.text.chars().count(),
            request.pitch,
            request.rate
        );
        self.current = Some(request.clone());
        self.paused = false;
        self.history.push(request.clone());
        Ok(())
    }

    fn pause(&mut self) {
        if self.current.is_some() {
            self.paused = true;
        }
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn cancel(&mut self) {
        self.current = None;
        self.paused = false;
    }

    fn is_speaking(&self) -> bool {
        self.current.is_some()
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

/// Recorder that buffers fed samples and, on stop, emits them as a 32-bit
/// float WAV file split into chunks.
#[derive(Debug)]
pub struct WavCapture {
    samples: Vec<f32>,
    recording: bool,
    sample_rate: u32,
    chunk_bytes: usize,
    events: VecDeque<PlatformEvent>,
    unavailable: bool,
}

impl Default for WavCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl WavCapture {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
            recording: false,
            sample_rate: SAMPLE_RATE,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            events: VecDeque::new(),
            unavailable: false,
        }
    }

    /// A recorder that cannot be started.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new()
        }
    }

    pub fn with_chunk_bytes(mut self, chunk_bytes: usize) -> Self {
        self.chunk_bytes = chunk_bytes.max(1);
        self
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Append synthesizer output. Ignored while not recording.
    pub fn feed(&mut self, samples: &[f32]) {
        if self.recording {
            self.samples.extend_from_slice(samples);
        }
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> Vec<PlatformEvent> {
        self.events.drain(..).collect()
    }

    fn encode(&self) -> Result<Vec<u8>, PlatformError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut buf = Vec::new();
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buf), spec)
            .map_err(|e| PlatformError::Failed(format!("WAV header: {e}")))?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .map_err(|e| PlatformError::Failed(format!("WAV sample: {e}")))?;
        }
        writer
            .finalize()
            .map_err(|e| PlatformError::Failed(format!("WAV finalize: {e}")))?;
        Ok(buf)
    }
}

impl AudioCapture for WavCapture {
    fn start(&mut self) -> Result<(), PlatformError> {
        if self.unavailable {
            return Err(PlatformError::Unavailable(
                "audio capture is not supported".to_string(),
            ));
        }
        if self.recording {
            return Err(PlatformError::Failed("capture already recording".to_string()));
        }
        self.samples.clear();
        self.recording = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PlatformError> {
        if !self.recording {
            return Err(PlatformError::Failed("capture is not recording".to_string()));
        }
        self.recording = false;

        let wav = self.encode()?;
        log::debug!(
            "Loopback capture flushed {} samples as {} bytes",
            self.samples.len(),
            wav.len()
        );
        for chunk in wav.chunks(self.chunk_bytes) {
            self.events.push_back(PlatformEvent::CaptureData(chunk.to_vec()));
        }
        self.events.push_back(PlatformEvent::CaptureStopped);
        self.samples.clear();
        Ok(())
    }

    fn mime_type(&self) -> &str {
        "audio/wav"
    }
}
