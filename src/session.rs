use crate::catalog::{VoiceCatalog, VoiceOption};
use crate::config::SessionConfig;
use crate::controls::{ControlFlags, ControlPoller};
use crate::features::{FeatureVector, SliderValues};
use crate::model::{ModelError, ParameterModel};
use crate::platform::{
    AudioCapture, FileSaver, Notifier, PlatformError, PlatformEvent, PlaybackState,
    SpeechSynthesizer, UtteranceRequest, Voice,
};
use crate::style::apply_style;
use crate::CapturedAudio;

/// Shown after a feedback submission has been trained in.
pub const FEEDBACK_OK_MESSAGE: &str = "Feedback submitted and model updated!";

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("{0} is not initialized")]
    NotReady(&'static str),
    #[error("Malformed model input: {0}")]
    Shape(#[from] ModelError),
    #[error("A speak cycle is already in progress")]
    Busy,
    #[error("Platform unavailable: {0}")]
    PlatformUnavailable(String),
    #[error("No voice selected")]
    NoVoiceSelected,
    #[error("Voice {0} is not in the catalog")]
    UnknownVoice(usize),
    #[error("Style {0} does not exist")]
    UnknownStyle(usize),
    #[error("Platform error: {0}")]
    Platform(PlatformError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Config(String),
}

impl From<PlatformError> for SessionError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::Unavailable(what) => SessionError::PlatformUnavailable(what),
            other => SessionError::Platform(other),
        }
    }
}

/// Progress of the current speak cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    /// Parameters predicted and request built; capture not yet running.
    Requested,
    /// Capture running and utterance playing (or paused).
    Speaking,
    /// Utterance ended; waiting for the capture to flush.
    Finalizing,
}

/// What a handled [`PlatformEvent`] changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The voice catalog was re-read; holds the new voice count.
    CatalogRefreshed(usize),
    /// Playback ended and the capture was asked to flush.
    Finalizing,
    /// The recording is assembled and can be downloaded.
    ArtifactReady,
}

/// One speech page: voice picker, text, style, parameter model, recorder and
/// the transport controls over them.
///
/// Commands come from the user through methods such as [`speak`](Self::speak)
/// and [`stop`](Self::stop); platform callbacks come in through
/// [`handle_event`](Self::handle_event). Everything runs on the caller's thread.
///
/// ```rust,no_run
/// # #[cfg(feature = "loopback")] {
/// use tts_tuner::platform::loopback::{LoopbackSynthesizer, WavCapture};
/// use tts_tuner::platform::{DirectorySaver, LogNotifier};
/// use tts_tuner::{Session, SessionConfig, SliderValues};
///
/// let mut session = Session::new(
///     SessionConfig::default(),
///     LoopbackSynthesizer::new(vec![]),
///     WavCapture::new(),
///     LogNotifier,
/// );
/// session.initialize_model();
/// session.set_text("Hello world.");
/// session.speak()?;
///
/// let samples = session.synthesizer().render();
/// session.capture_mut().feed(&samples);
/// if let Some(ended) = session.synthesizer_mut().finish() {
///     session.handle_event(ended)?;
/// }
/// for event in session.capture_mut().drain_events() {
///     session.handle_event(event)?;
/// }
///
/// session.download(&mut DirectorySaver::new("out"))?;
/// session.submit_feedback(SliderValues::new(80, 40, 60))?;
/// # }
/// # Ok::<(), tts_tuner::SessionError>(())
/// ```
pub struct Session<S: SpeechSynthesizer, C: AudioCapture> {
    config: SessionConfig,
    synth: S,
    capture: C,
    notifier: Box<dyn Notifier>,
    catalog: VoiceCatalog,
    model: Option<ParameterModel>,
    state: CycleState,
    text: String,
    style_index: usize,
    selected_voice: Option<usize>,
    chunks: Vec<Vec<u8>>,
    artifact: Option<CapturedAudio>,
    /// Captures stopped by a cancel whose flush has not arrived yet.
    stale_flushes: usize,
}

impl<S: SpeechSynthesizer, C: AudioCapture> Session<S, C> {
    /// Create a session and read whatever voices the platform already has.
    ///
    /// The parameter model is not built yet; call
    /// [`initialize_model`](Self::initialize_model) before speaking.
    pub fn new(config: SessionConfig, synth: S, capture: C, notifier: impl Notifier + 'static) -> Self {
        let mut catalog = VoiceCatalog::new();
        catalog.refresh(&synth);
        Self {
            config,
            synth,
            capture,
            notifier: Box::new(notifier),
            catalog,
            model: None,
            state: CycleState::Idle,
            text: String::new(),
            style_index: 0,
            selected_voice: None,
            chunks: Vec::new(),
            artifact: None,
            stale_flushes: 0,
        }
    }

    /// Build the parameter model from the session config. Replaces any
    /// existing model.
    pub fn initialize_model(&mut self) {
        self.model = Some(ParameterModel::new(self.config.model_params()));
    }

    pub fn model(&self) -> Option<&ParameterModel> {
        self.model.as_ref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn style_index(&self) -> usize {
        self.style_index
    }

    pub fn style_name(&self) -> &str {
        self.config
            .styles
            .get(self.style_index)
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn select_style(&mut self, index: usize) -> Result<(), SessionError> {
        if index >= self.config.styles.len() {
            return Err(SessionError::UnknownStyle(index));
        }
        self.style_index = index;
        Ok(())
    }

    pub fn catalog(&self) -> &VoiceCatalog {
        &self.catalog
    }

    pub fn voice_options(&self) -> Vec<VoiceOption> {
        self.catalog.options()
    }

    /// Pick a catalog voice, or `None` for the platform default.
    pub fn select_voice(&mut self, index: Option<usize>) -> Result<(), SessionError> {
        if let Some(i) = index {
            if self.catalog.get(i).is_none() {
                return Err(SessionError::UnknownVoice(i));
            }
        }
        self.selected_voice = index;
        Ok(())
    }

    pub fn selected_voice(&self) -> Result<&Voice, SessionError> {
        self.selected_voice
            .and_then(|i| self.catalog.get(i))
            .ok_or(SessionError::NoVoiceSelected)
    }

    /// Descriptor of the current text and style.
    pub fn features(&self) -> FeatureVector {
        FeatureVector::from_text(self.style_index, &self.text)
    }

    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    pub fn synthesizer_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    pub fn capture(&self) -> &C {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut C {
        &mut self.capture
    }

    /// The last finished recording, if it is still downloadable.
    pub fn artifact(&self) -> Option<&CapturedAudio> {
        self.artifact.as_ref()
    }

    /// Control enablement for the current playback state. Speak additionally
    /// stays disabled until the running cycle is back to idle.
    pub fn controls(&self) -> ControlFlags {
        let mut flags = ControlFlags::sample(&self.synth, self.artifact.is_some());
        if self.state != CycleState::Idle {
            flags.speak = false;
        }
        flags
    }

    /// A sampler at the configured poll interval, for hosts without playback
    /// events.
    pub fn poller(&self) -> ControlPoller {
        ControlPoller::new(self.config.poll_interval())
    }

    /// Speak the current text, recording it.
    ///
    /// Returns once playback has started; the recording becomes available
    /// after [`PlatformEvent::UtteranceEnded`] and
    /// [`PlatformEvent::CaptureStopped`] have been handled. Empty text is a
    /// no-op.
    pub fn speak(&mut self) -> Result<(), SessionError> {
        if self.text.is_empty() {
            log::debug!("Speak ignored: no text");
            return Ok(());
        }
        if self.state != CycleState::Idle {
            return Err(SessionError::Busy);
        }
        let model = self
            .model
            .as_ref()
            .ok_or(SessionError::NotReady("parameter model"))?;

        let features = self.features();
        let params = model.predict(features.as_slice())?;

        let voice = match self.selected_voice() {
            Ok(v) => Some(v.clone()),
            Err(e) => {
                log::debug!("{e}, using the platform default");
                None
            }
        };
        let mut request = UtteranceRequest::new(self.text.clone(), voice);
        apply_style(&mut request, &params, self.catalog.voices());

        self.chunks.clear();
        self.state = CycleState::Requested;
        log::info!(
            "Speaking {} chars (style '{}', pitch={:.2}, rate={:.2}, voice={})",
            request.text.chars().count(),
            self.style_name(),
            request.pitch,
            request.rate,
            request.voice.as_ref().map(|v| v.name.as_str()).unwrap_or("default")
        );

        if let Err(e) = self.capture.start() {
            return Err(self.abort_start(e));
        }
        if let Err(e) = self.synth.speak(&request) {
            match self.capture.stop() {
                Ok(()) => self.stale_flushes += 1,
                Err(stop_err) => log::warn!("Capture did not stop after failed start: {stop_err}"),
            }
            return Err(self.abort_start(e));
        }
        self.artifact = None;
        self.state = CycleState::Speaking;
        Ok(())
    }

    fn abort_start(&mut self, e: PlatformError) -> SessionError {
        self.state = CycleState::Idle;
        self.chunks.clear();
        let err = SessionError::from(e);
        log::error!("Speech could not start: {err}");
        self.notifier.notify(&format!("Speech could not start: {err}"));
        err
    }

    /// Apply a platform callback.
    ///
    /// Events that do not fit the current state (late chunks after a stop, an
    /// end event for a cancelled utterance) are dropped. The flush of a
    /// cancelled capture is dropped even when a new cycle is already running.
    pub fn handle_event(&mut self, event: PlatformEvent) -> Result<Option<SessionEvent>, SessionError> {
        match event {
            PlatformEvent::VoicesChanged => {
                self.catalog.refresh(&self.synth);
                self.selected_voice = None;
                Ok(Some(SessionEvent::CatalogRefreshed(self.catalog.len())))
            }
            PlatformEvent::CaptureData(chunk) if self.stale_flushes > 0 => {
                log::debug!("Dropping {} byte chunk from a cancelled capture", chunk.len());
                Ok(None)
            }
            PlatformEvent::CaptureStopped if self.stale_flushes > 0 => {
                self.stale_flushes -= 1;
                log::debug!("Cancelled capture flushed");
                Ok(None)
            }
            PlatformEvent::UtteranceEnded if self.state == CycleState::Speaking => {
                self.state = CycleState::Finalizing;
                if let Err(e) = self.capture.stop() {
                    self.state = CycleState::Idle;
                    self.chunks.clear();
                    let err = SessionError::from(e);
                    log::error!("Recording could not be finalized: {err}");
                    self.notifier
                        .notify(&format!("Recording could not be finalized: {err}"));
                    return Err(err);
                }
                Ok(Some(SessionEvent::Finalizing))
            }
            PlatformEvent::CaptureData(chunk)
                if matches!(self.state, CycleState::Speaking | CycleState::Finalizing) =>
            {
                self.chunks.push(chunk);
                Ok(None)
            }
            PlatformEvent::CaptureStopped if self.state == CycleState::Finalizing => {
                let bytes = self.chunks.concat();
                self.chunks.clear();
                log::info!("Recording ready ({} bytes)", bytes.len());
                self.artifact = Some(CapturedAudio::new(bytes, self.capture.mime_type()));
                self.state = CycleState::Idle;
                Ok(Some(SessionEvent::ArtifactReady))
            }
            PlatformEvent::CaptureData(chunk) => {
                log::debug!("Ignoring {} byte chunk in state {:?}", chunk.len(), self.state);
                Ok(None)
            }
            other => {
                log::debug!("Ignoring {other:?} in state {:?}", self.state);
                Ok(None)
            }
        }
    }

    /// Pause playback. Acts only while speaking and not already paused.
    pub fn pause(&mut self) -> bool {
        if self.synth.playback_state() != PlaybackState::Speaking {
            return false;
        }
        self.synth.pause();
        true
    }

    /// Resume playback. Acts only while paused.
    pub fn resume(&mut self) -> bool {
        if self.synth.playback_state() != PlaybackState::Paused {
            return false;
        }
        self.synth.resume();
        true
    }

    /// Cancel playback and drop any recording, finished or not.
    ///
    /// Safe in every state. The capture is asked to stop but its flush is not
    /// awaited; chunks it still delivers are ignored, also after a new speak.
    pub fn stop(&mut self) {
        self.synth.cancel();
        match self.state {
            CycleState::Requested | CycleState::Speaking => match self.capture.stop() {
                Ok(()) => self.stale_flushes += 1,
                Err(e) => log::warn!("Capture did not stop cleanly: {e}"),
            },
            // already asked to stop; its flush is still on the way
            CycleState::Finalizing => self.stale_flushes += 1,
            CycleState::Idle => {}
        }
        if self.state != CycleState::Idle {
            log::info!("Stopped during {:?}", self.state);
        }
        self.state = CycleState::Idle;
        self.chunks.clear();
        self.artifact = None;
    }

    /// Hand the recording to `saver`. Returns `false` when there is none.
    pub fn download(&mut self, saver: &mut dyn FileSaver) -> Result<bool, SessionError> {
        let Some(artifact) = &self.artifact else {
            return Ok(false);
        };
        if let Err(e) = saver.save(&artifact.bytes, &self.config.download_filename, &artifact.mime_type) {
            let err = SessionError::from(e);
            self.notifier.notify(&format!("Download failed: {err}"));
            return Err(err);
        }
        Ok(true)
    }

    /// Train the model toward the slider positions for the current text and
    /// style, then tell the user how it went. Returns the loss after training.
    pub fn submit_feedback(&mut self, sliders: SliderValues) -> Result<f32, SessionError> {
        match self.train_on_feedback(sliders) {
            Ok(loss) => {
                self.notifier.notify(FEEDBACK_OK_MESSAGE);
                Ok(loss)
            }
            Err(e) => {
                log::warn!("Feedback rejected: {e}");
                self.notifier
                    .notify(&format!("Feedback could not be applied: {e}"));
                Err(e)
            }
        }
    }

    fn train_on_feedback(&mut self, sliders: SliderValues) -> Result<f32, SessionError> {
        let features = self.features();
        let target = sliders.target();
        let model = self
            .model
            .as_mut()
            .ok_or(SessionError::NotReady("parameter model"))?;

        log::info!("Training on feedback {target:?} for {:?}", features.0);
        Ok(model.train(features.as_slice(), &target, self.config.feedback_steps)?)
    }
}

impl<S: SpeechSynthesizer, C: AudioCapture> Drop for Session<S, C> {
    fn drop(&mut self) {
        if self.state != CycleState::Idle {
            self.stop();
        }
    }
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::model::ModelParams;
    use crate::platform::loopback::{LoopbackSynthesizer, WavCapture};
    use crate::platform::DirectorySaver;

    type TestSession = Session<LoopbackSynthesizer, WavCapture>;

    #[derive(Clone, Default)]
    struct Inbox(Rc<RefCell<Vec<String>>>);

    impl Notifier for Inbox {
        fn notify(&mut self, message: &str) {
            self.0.borrow_mut().push(message.to_string());
        }
    }

    impl Inbox {
        fn messages(&self) -> Vec<String> {
            self.0.borrow().clone()
        }
    }

    fn config() -> SessionConfig {
        SessionConfig {
            seed: Some(11),
            ..Default::default()
        }
    }

    fn session_with(synth: LoopbackSynthesizer, capture: WavCapture) -> (TestSession, Inbox) {
        let inbox = Inbox::default();
        let mut session = Session::new(config(), synth, capture, inbox.clone());
        session.initialize_model();
        (session, inbox)
    }

    fn session() -> (TestSession, Inbox) {
        session_with(
            LoopbackSynthesizer::new(vec![
                Voice::new("Alex", "en-US"),
                Voice::new("Amelie", "fr-CA"),
            ]),
            WavCapture::new().with_chunk_bytes(512),
        )
    }

    /// Play the current utterance to its natural end and flush the capture.
    fn run_to_completion(session: &mut TestSession) -> Vec<Option<SessionEvent>> {
        let samples = session.synthesizer().render();
        session.capture_mut().feed(&samples);
        let ended = session.synthesizer_mut().finish().unwrap();

        let mut events = vec![session.handle_event(ended).unwrap()];
        for event in session.capture_mut().drain_events() {
            events.push(session.handle_event(event).unwrap());
        }
        events
    }

    #[test]
    fn full_cycle_yields_one_artifact() {
        let (mut session, _) = session();
        session.set_text("Hello world.");
        session.speak().unwrap();

        assert_eq!(session.state(), CycleState::Speaking);
        assert!(session.capture().is_recording());
        let controls = session.controls();
        assert!(!controls.speak && controls.stop && !controls.download);

        let events = run_to_completion(&mut session);
        assert_eq!(events.first(), Some(&Some(SessionEvent::Finalizing)));
        assert_eq!(events.last(), Some(&Some(SessionEvent::ArtifactReady)));
        assert_eq!(
            events.iter().filter(|e| **e == Some(SessionEvent::ArtifactReady)).count(),
            1
        );

        assert_eq!(session.state(), CycleState::Idle);
        let artifact = session.artifact().unwrap();
        assert_eq!(artifact.mime_type, "audio/wav");
        assert_eq!(&artifact.bytes[..4], b"RIFF");
        assert!(session.controls().download);
        assert!(session.controls().speak);
    }

    #[test]
    fn chunks_are_joined_in_arrival_order() {
        let (mut session, _) = session();
        session.set_text("Hi.");
        session.speak().unwrap();
        session.synthesizer_mut().finish().unwrap();
        session.handle_event(PlatformEvent::UtteranceEnded).unwrap();
        session.capture_mut().drain_events();

        session.handle_event(PlatformEvent::CaptureData(vec![1, 2])).unwrap();
        session.handle_event(PlatformEvent::CaptureData(vec![3])).unwrap();
        session.handle_event(PlatformEvent::CaptureStopped).unwrap();
        assert_eq!(session.artifact().unwrap().bytes, vec![1, 2, 3]);
    }

    #[test]
    fn stop_before_completion_yields_no_artifact() {
        let (mut session, _) = session();
        session.set_text("Hello world.");
        session.speak().unwrap();
        let samples = session.synthesizer().render();
        session.capture_mut().feed(&samples);

        session.stop();
        assert_eq!(session.state(), CycleState::Idle);
        assert!(!session.synthesizer().is_speaking());

        // late flush from the cancelled capture
        for event in session.capture_mut().drain_events() {
            assert_eq!(session.handle_event(event).unwrap(), None);
        }
        assert!(session.artifact().is_none());
        assert!(!session.controls().download);

        let dir = std::env::temp_dir().join(format!("tts-tuner-stop-{}", std::process::id()));
        assert!(!session.download(&mut DirectorySaver::new(&dir)).unwrap());
    }

    fn wav_samples(artifact: &CapturedAudio) -> usize {
        hound::WavReader::new(std::io::Cursor::new(&artifact.bytes[..]))
            .unwrap()
            .len() as usize
    }

    /// Start an utterance, record some of it, then cancel.
    fn speak_and_cancel(session: &mut TestSession) {
        session.set_text("This sentence gets cut off long before it is done.");
        session.speak().unwrap();
        let samples = session.synthesizer().render();
        session.capture_mut().feed(&samples);
        session.stop();
    }

    #[test]
    fn cancelled_flush_during_finalizing_is_dropped() {
        let (mut session, _) = session();
        speak_and_cancel(&mut session);

        session.set_text("Hi.");
        session.speak().unwrap();
        let expected = session.synthesizer().render().len();

        // stale chunks are still queued ahead of the new flush
        let events = run_to_completion(&mut session);
        assert_eq!(
            events.iter().filter(|e| **e == Some(SessionEvent::ArtifactReady)).count(),
            1
        );
        assert_eq!(wav_samples(session.artifact().unwrap()), expected);
    }

    #[test]
    fn cancelled_flush_during_speaking_is_dropped() {
        let (mut session, _) = session();
        speak_and_cancel(&mut session);

        session.set_text("Hi.");
        session.speak().unwrap();
        let expected = session.synthesizer().render().len();
        for event in session.capture_mut().drain_events() {
            assert_eq!(session.handle_event(event).unwrap(), None);
        }
        assert_eq!(session.state(), CycleState::Speaking);

        run_to_completion(&mut session);
        assert_eq!(wav_samples(session.artifact().unwrap()), expected);
    }

    #[test]
    fn stop_while_finalizing_drops_pending_flush() {
        let (mut session, _) = session();
        session.set_text("The first take is finished but never flushed.");
        session.speak().unwrap();
        let samples = session.synthesizer().render();
        session.capture_mut().feed(&samples);
        session.synthesizer_mut().finish().unwrap();
        session.handle_event(PlatformEvent::UtteranceEnded).unwrap();
        assert_eq!(session.state(), CycleState::Finalizing);
        session.stop();

        session.set_text("Second.");
        session.speak().unwrap();
        let expected = session.synthesizer().render().len();
        run_to_completion(&mut session);
        assert_eq!(wav_samples(session.artifact().unwrap()), expected);
    }

    #[test]
    fn failed_start_keeps_previous_recording() {
        let (mut session, _) = session();
        session.set_text("Keep me.");
        session.speak().unwrap();
        run_to_completion(&mut session);
        let kept = session.artifact().cloned().unwrap();

        session.synthesizer_mut().set_unavailable(true);
        assert!(matches!(
            session.speak(),
            Err(SessionError::PlatformUnavailable(_))
        ));
        assert_eq!(session.artifact(), Some(&kept));
        assert!(session.controls().download);

        // the aborted capture's flush does not replace it either
        session.synthesizer_mut().set_unavailable(false);
        session.set_text("Next.");
        session.speak().unwrap();
        let expected = session.synthesizer().render().len();
        run_to_completion(&mut session);
        assert_eq!(wav_samples(session.artifact().unwrap()), expected);
    }

    #[test]
    fn stop_is_safe_when_idle() {
        let (mut session, _) = session();
        session.stop();
        session.stop();
        assert_eq!(session.state(), CycleState::Idle);
    }

    #[test]
    fn stop_disables_a_finished_recording() {
        let (mut session, _) = session();
        session.set_text("Done.");
        session.speak().unwrap();
        run_to_completion(&mut session);
        assert!(session.artifact().is_some());

        session.stop();
        assert!(session.artifact().is_none());
    }

    #[test]
    fn overlapping_speak_is_busy() {
        let (mut session, _) = session();
        session.set_text("First.");
        session.speak().unwrap();
        assert!(matches!(session.speak(), Err(SessionError::Busy)));

        session.synthesizer_mut().finish().unwrap();
        session.handle_event(PlatformEvent::UtteranceEnded).unwrap();
        assert_eq!(session.state(), CycleState::Finalizing);
        assert!(matches!(session.speak(), Err(SessionError::Busy)));
        assert!(!session.controls().speak);
    }

    #[test]
    fn speak_needs_a_model() {
        let mut session = Session::new(
            config(),
            LoopbackSynthesizer::new(vec![]),
            WavCapture::new(),
            Inbox::default(),
        );
        session.set_text("Hello");
        assert!(matches!(
            session.speak(),
            Err(SessionError::NotReady("parameter model"))
        ));
        assert_eq!(session.state(), CycleState::Idle);
    }

    #[test]
    fn empty_text_does_nothing() {
        let (mut session, _) = session();
        session.speak().unwrap();
        assert_eq!(session.state(), CycleState::Idle);
        assert!(session.synthesizer().history().is_empty());
    }

    #[test]
    fn new_speak_discards_previous_artifact() {
        let (mut session, _) = session();
        session.set_text("One.");
        session.speak().unwrap();
        run_to_completion(&mut session);
        assert!(session.artifact().is_some());

        session.set_text("Two.");
        session.speak().unwrap();
        assert!(session.artifact().is_none());
        assert!(!session.controls().download);

        run_to_completion(&mut session);
        assert!(session.artifact().is_some());
    }

    #[test]
    fn request_carries_styled_prosody() {
        let (mut session, _) = session();
        session.set_text("Hello world!");
        session.speak().unwrap();

        let request = &session.synthesizer().history()[0];
        assert_eq!(request.text, "Hello world!");
        assert!((0.5..=1.5).contains(&request.pitch));
        assert!((0.8..=1.2).contains(&request.rate));
    }

    #[test]
    fn selected_voice_reaches_the_request() {
        let synth = LoopbackSynthesizer::new(vec![Voice::new("Only", "en-US")]);
        let (mut session, _) = session_with(synth, WavCapture::new());
        session.select_voice(Some(0)).unwrap();
        session.set_text("Hi");
        session.speak().unwrap();

        let voice = session.synthesizer().history()[0].voice.clone();
        assert_eq!(voice.map(|v| v.name), Some("Only".to_string()));
    }

    #[test]
    fn voices_changed_refreshes_catalog() {
        let synth = LoopbackSynthesizer::lazy(vec![
            Voice::new("Alex", "en-US"),
            Voice::new("Karen", "en-AU"),
        ]);
        let (mut session, _) = session_with(synth, WavCapture::new());
        assert_eq!(session.voice_options().len(), 1);
        assert!(matches!(session.select_voice(Some(0)), Err(SessionError::UnknownVoice(0))));

        let loaded = session.synthesizer_mut().load_voices().unwrap();
        assert_eq!(
            session.handle_event(loaded).unwrap(),
            Some(SessionEvent::CatalogRefreshed(2))
        );
        assert_eq!(session.voice_options()[2].label, "Karen (en-AU)");

        session.select_voice(Some(1)).unwrap();
        assert_eq!(session.selected_voice().unwrap().name, "Karen");
        session.handle_event(PlatformEvent::VoicesChanged).unwrap();
        assert!(matches!(session.selected_voice(), Err(SessionError::NoVoiceSelected)));
    }

    #[test]
    fn pause_and_resume_only_when_valid() {
        let (mut session, _) = session();
        assert!(!session.pause());
        assert!(!session.resume());

        session.set_text("Hello world.");
        session.speak().unwrap();
        assert!(!session.resume());
        assert!(session.pause());
        assert!(!session.pause());
        assert!(session.controls().resume);
        assert!(session.resume());
        assert!(!session.resume());

        // pause is not an end event
        assert_eq!(session.state(), CycleState::Speaking);
    }

    #[test]
    fn poller_tracks_session_playback() {
        let (mut session, _) = session();
        let mut poller = session.poller();
        assert_eq!(poller.interval(), std::time::Duration::from_millis(100));
        assert!(poller.poll(session.synthesizer(), false).unwrap().speak);

        session.set_text("Hello world.");
        session.speak().unwrap();
        let flags = poller.poll(session.synthesizer(), false).unwrap();
        assert!(!flags.speak && flags.pause && flags.stop && !flags.resume);
    }

    #[test]
    fn unknown_style_is_rejected() {
        let (mut session, _) = session();
        session.select_style(3).unwrap();
        assert_eq!(session.style_name(), "excited");
        assert!(matches!(session.select_style(99), Err(SessionError::UnknownStyle(99))));
        assert_eq!(session.style_index(), 3);
    }

    #[test]
    fn feedback_trains_toward_normalized_sliders() {
        let (mut session, inbox) = session();
        session.select_style(1).unwrap();
        session.set_text("Hello world.");

        let mut reference = ParameterModel::new(ModelParams {
            seed: Some(11),
            ..Default::default()
        });
        let features = session.features();
        let expected_loss = reference
            .train(features.as_slice(), &[0.8, 0.4, 0.6], 10)
            .unwrap();

        let loss = session.submit_feedback(SliderValues::new(80, 40, 60)).unwrap();
        assert_eq!(loss, expected_loss);
        assert_eq!(
            session.model().unwrap().predict(features.as_slice()).unwrap(),
            reference.predict(features.as_slice()).unwrap()
        );
        assert_eq!(inbox.messages(), [FEEDBACK_OK_MESSAGE]);
    }

    #[test]
    fn feedback_uses_current_text() {
        let (mut session, _) = session();
        session.set_text("Spoken.");
        session.speak().unwrap();
        session.set_text("Edited afterwards!");
        assert_eq!(session.features(), FeatureVector::from_text(0, "Edited afterwards!"));
    }

    #[test]
    fn feedback_without_model_reports_failure() {
        let inbox = Inbox::default();
        let mut session = Session::new(
            config(),
            LoopbackSynthesizer::new(vec![]),
            WavCapture::new(),
            inbox.clone(),
        );
        let err = session.submit_feedback(SliderValues::new(10, 20, 30)).unwrap_err();
        assert!(matches!(err, SessionError::NotReady(_)));

        let messages = inbox.messages();
        assert_eq!(messages.len(), 1);
        assert_ne!(messages[0], FEEDBACK_OK_MESSAGE);
        assert!(messages[0].starts_with("Feedback could not be applied"));
    }

    #[test]
    fn unavailable_synthesizer_is_reported_not_fatal() {
        let (mut session, inbox) =
            session_with(LoopbackSynthesizer::unavailable(), WavCapture::new());
        session.set_text("Hello");
        let err = session.speak().unwrap_err();

        assert!(matches!(err, SessionError::PlatformUnavailable(_)));
        assert_eq!(session.state(), CycleState::Idle);
        assert!(!session.capture().is_recording());
        assert!(inbox.messages()[0].starts_with("Speech could not start"));

        // late flush from the aborted capture is ignored
        for event in session.capture_mut().drain_events() {
            session.handle_event(event).unwrap();
        }
        assert!(session.artifact().is_none());
    }

    #[test]
    fn unavailable_capture_is_reported() {
        let (mut session, inbox) =
            session_with(LoopbackSynthesizer::new(vec![]), WavCapture::unavailable());
        session.set_text("Hello");
        assert!(matches!(
            session.speak(),
            Err(SessionError::PlatformUnavailable(_))
        ));
        assert!(session.synthesizer().history().is_empty());
        assert_eq!(inbox.messages().len(), 1);
    }

    #[test]
    fn download_saves_speech_wav() {
        let (mut session, _) = session();
        session.set_text("Save me.");
        session.speak().unwrap();
        run_to_completion(&mut session);

        let dir = std::env::temp_dir().join(format!("tts-tuner-download-{}", std::process::id()));
        let mut saver = DirectorySaver::new(&dir);
        assert!(session.download(&mut saver).unwrap());
        let saved = std::fs::read(dir.join("speech.wav")).unwrap();
        assert_eq!(saved, session.artifact().unwrap().bytes);

        // still downloadable afterwards
        assert!(session.download(&mut saver).unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
