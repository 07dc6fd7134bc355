use crate::audio::AudioFrame;
use crate::config::VadConfig;
use crate::provider::{VadEvent, VoiceActivityDetector};
use std::time::Duration;

/// Energy-threshold detector with start debounce and end hangover.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold_dbfs: f32,
    min_speech: Duration,
    min_silence: Duration,
    speaking: bool,
    speech_run: Duration,
    silence_run: Duration,
}

impl EnergyVad {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            threshold_dbfs: config.threshold_dbfs,
            min_speech: Duration::from_millis(config.min_speech_ms),
            min_silence: Duration::from_millis(config.min_silence_ms),
            speaking: false,
            speech_run: Duration::ZERO,
            silence_run: Duration::ZERO,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn process(&mut self, frame: &AudioFrame) -> VadEvent {
        let voiced = frame.rms_dbfs() >= self.threshold_dbfs;
        let len = frame.duration();

        if voiced {
            self.silence_run = Duration::ZERO;
            self.speech_run += len;
        } else {
            self.speech_run = Duration::ZERO;
            self.silence_run += len;
        }

        match (self.speaking, voiced) {
            (false, true) if self.speech_run >= self.min_speech => {
                self.speaking = true;
                VadEvent::SpeechStart
            }
            (false, _) => VadEvent::Silence,
            (true, false) if self.silence_run >= self.min_silence => {
                self.speaking = false;
                VadEvent::SpeechEnd
            }
            (true, _) => VadEvent::Speaking,
        }
    }
}
