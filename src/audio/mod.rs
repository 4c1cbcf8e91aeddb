//! Audio system
//!
//! Procedurally generated sound effects and a step-sequenced music track.
//! [`AudioEngine`] owns all audio state and drives a [`Synth`] backend: Web
//! Audio in the browser, [`NullSynth`] for native builds and tests.

mod engine;
mod music;
mod scores;
#[cfg(target_arch = "wasm32")]
mod web;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::{AudioDebug, AudioEngine, AudioMode, SfxKey};
pub use music::{
    Layers, LimiterStats, MusicScheduler, PUMP_INTERVAL_MS, SchedulerState, WeaponMask,
};
pub use scores::{BassLine, Drums, LeadFx, PadVoice, SCORE_IDS, Score, ScoreBook};
#[cfg(target_arch = "wasm32")]
pub use web::WebSynth;

/// Audio backend failures; callers log and carry on without sound
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("audio backend unavailable: {0}")]
    Unavailable(String),
    #[error("audio context failed to resume: {0}")]
    Resume(String),
    #[error("invalid score data: {0}")]
    Score(#[from] serde_json::Error),
}

/// Oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Wave {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

/// Mixer bus a voice is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bus {
    Sfx,
    Music,
    /// Low-passed pad bus feeding the music bus
    Pad,
    /// Lead bus with a feedback delay, feeding the music bus
    Lead,
}

/// Gain stage addressed by [`Synth::set_gain`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainStage {
    Master,
    Sfx,
    Music,
}

/// One enveloped oscillator note
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub wave: Wave,
    pub freq: f32,
    /// Absolute start time on the synth clock
    pub at: f64,
    pub dur: f32,
    pub gain: f32,
    /// Cents
    pub detune: f32,
    pub attack: f32,
    pub bus: Bus,
    /// Exponential pitch glide to `(freq, seconds)`
    pub glide: Option<(f32, f32)>,
}

impl Tone {
    pub fn new(wave: Wave, freq: f32, dur: f32, gain: f32) -> Self {
        Self {
            wave,
            freq,
            at: 0.0,
            dur,
            gain,
            detune: 0.0,
            attack: 0.008,
            bus: Bus::Sfx,
            glide: None,
        }
    }

    pub fn at(mut self, at: f64) -> Self {
        self.at = at;
        self
    }

    pub fn detune(mut self, cents: f32) -> Self {
        self.detune = cents;
        self
    }

    pub fn attack(mut self, attack: f32) -> Self {
        self.attack = attack;
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }

    pub fn glide(mut self, to: f32, secs: f32) -> Self {
        self.glide = Some((to, secs));
        self
    }
}

/// Decaying white-noise burst
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Noise {
    pub at: f64,
    pub dur: f32,
    pub gain: f32,
    pub attack: f32,
    pub bus: Bus,
}

impl Noise {
    pub fn new(dur: f32, gain: f32) -> Self {
        Self {
            at: 0.0,
            dur,
            gain,
            attack: 0.008,
            bus: Bus::Sfx,
        }
    }

    pub fn at(mut self, at: f64) -> Self {
        self.at = at;
        self
    }

    pub fn attack(mut self, attack: f32) -> Self {
        self.attack = attack;
        self
    }

    pub fn bus(mut self, bus: Bus) -> Self {
        self.bus = bus;
        self
    }
}

/// Lead delay settings, already scaled to safe ranges
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LeadDelay {
    pub time: f32,
    pub feedback: f32,
    pub mix: f32,
}

/// Sound-producing backend
///
/// Notes are fire-and-forget: once handed to the synth they play. Times are
/// absolute on the synth's own clock (seconds).
pub trait Synth {
    fn now(&self) -> f64;
    /// Start or resume output; must be called from a user gesture in browsers
    fn resume(&mut self) -> Result<(), AudioError>;
    fn tone(&mut self, tone: &Tone);
    fn noise(&mut self, noise: &Noise);
    fn set_gain(&mut self, stage: GainStage, value: f32);
    fn set_pad_filter(&mut self, freq: f32, at: f64);
    fn set_lead_delay(&mut self, fx: LeadDelay, at: f64);
    /// Release backend resources
    fn close(&mut self) {}
}

impl<S: Synth + ?Sized> Synth for Box<S> {
    fn now(&self) -> f64 {
        (**self).now()
    }
    fn resume(&mut self) -> Result<(), AudioError> {
        (**self).resume()
    }
    fn tone(&mut self, tone: &Tone) {
        (**self).tone(tone)
    }
    fn noise(&mut self, noise: &Noise) {
        (**self).noise(noise)
    }
    fn set_gain(&mut self, stage: GainStage, value: f32) {
        (**self).set_gain(stage, value)
    }
    fn set_pad_filter(&mut self, freq: f32, at: f64) {
        (**self).set_pad_filter(freq, at)
    }
    fn set_lead_delay(&mut self, fx: LeadDelay, at: f64) {
        (**self).set_lead_delay(fx, at)
    }
    fn close(&mut self) {
        (**self).close()
    }
}

/// MIDI note number to Hz
pub fn midi_to_freq(midi: i32) -> f32 {
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}

/// Silent backend with a manually advanced clock
///
/// Records everything it is asked to play, so it doubles as a test probe and
/// as the headless runner's audio sink.
#[derive(Debug, Default)]
pub struct NullSynth {
    clock: f64,
    pub tones: Vec<Tone>,
    pub noises: Vec<Noise>,
    pub master: f32,
    pub sfx: f32,
    pub music: f32,
    pub pad_filter: Option<f32>,
    pub lead_delay: Option<LeadDelay>,
    /// Make `resume` fail, like a browser without an audio device
    pub fail_resume: bool,
    pub closed: bool,
}

impl NullSynth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, secs: f64) {
        self.clock += secs.max(0.0);
    }

    pub fn clear(&mut self) {
        self.tones.clear();
        self.noises.clear();
    }

    pub fn voices(&self) -> usize {
        self.tones.len() + self.noises.len()
    }
}

impl Synth for NullSynth {
    fn now(&self) -> f64 {
        self.clock
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.fail_resume {
            return Err(AudioError::Unavailable("no output device".into()));
        }
        self.closed = false;
        Ok(())
    }

    fn tone(&mut self, tone: &Tone) {
        self.tones.push(*tone);
    }

    fn noise(&mut self, noise: &Noise) {
        self.noises.push(*noise);
    }

    fn set_gain(&mut self, stage: GainStage, value: f32) {
        match stage {
            GainStage::Master => self.master = value,
            GainStage::Sfx => self.sfx = value,
            GainStage::Music => self.music = value,
        }
    }

    fn set_pad_filter(&mut self, freq: f32, _at: f64) {
        self.pad_filter = Some(freq);
    }

    fn set_lead_delay(&mut self, fx: LeadDelay, _at: f64) {
        self.lead_delay = Some(fx);
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midi_to_freq() {
        assert!((midi_to_freq(69) - 440.0).abs() < 1e-3);
        assert!((midi_to_freq(57) - 220.0).abs() < 1e-3);
        assert!((midi_to_freq(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_null_synth_records() {
        let mut synth = NullSynth::new();
        synth.advance(1.5);
        synth.tone(&Tone::new(Wave::Square, 420.0, 0.05, 0.06).at(synth.now()));
        synth.noise(&Noise::new(0.03, 0.08));
        assert_eq!(synth.voices(), 2);
        assert_eq!(synth.tones[0].at, 1.5);

        synth.fail_resume = true;
        assert!(synth.resume().is_err());
    }
}
