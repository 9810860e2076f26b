//! Enablement of the transport controls, derived from playback state.

use std::time::Duration;

use crate::platform::SpeechSynthesizer;

/// Sampling period of [`ControlPoller`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Which controls are enabled (`true`) right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFlags {
    pub speak: bool,
    pub pause: bool,
    pub resume: bool,
    pub stop: bool,
    pub download: bool,
}

impl ControlFlags {
    pub fn from_playback(speaking: bool, paused: bool, artifact_ready: bool) -> Self {
        Self {
            speak: !(speaking && !paused),
            pause: speaking && !paused,
            resume: paused,
            stop: speaking,
            download: artifact_ready,
        }
    }

    pub fn sample<S: SpeechSynthesizer + ?Sized>(synth: &S, artifact_ready: bool) -> Self {
        Self::from_playback(synth.is_speaking(), synth.is_paused(), artifact_ready)
    }
}

/// Fixed-period sampler for hosts that cannot subscribe to playback events.
///
/// The host calls [`poll`](Self::poll) every [`interval`](Self::interval); it
/// returns new flags only when they differ from the last sample.
#[derive(Debug, Clone)]
pub struct ControlPoller {
    interval: Duration,
    last: Option<ControlFlags>,
}

impl Default for ControlPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl ControlPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last(&self) -> Option<ControlFlags> {
        self.last
    }

    pub fn poll<S: SpeechSynthesizer + ?Sized>(
        &mut self,
        synth: &S,
        artifact_ready: bool,
    ) -> Option<ControlFlags> {
        let flags = ControlFlags::sample(synth, artifact_ready);
        if self.last == Some(flags) {
            return None;
        }
        self.last = Some(flags);
        Some(flags)
    }
}
