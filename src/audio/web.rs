//! Web Audio backend
//!
//! Graph: sfx -> master, pad -> lowpass -> music, lead -> (dry + feedback
//! delay) -> music, music -> master -> destination.

use wasm_bindgen::JsValue;
use web_sys::{
    AudioContext, AudioContextState, AudioParam, BiquadFilterNode, BiquadFilterType, DelayNode,
    GainNode, OscillatorType,
};

use super::{AudioError, Bus, GainStage, LeadDelay, Noise, Synth, Tone, Wave};

const FLOOR: f32 = 0.0001;

fn js_err(e: JsValue) -> AudioError {
    AudioError::Unavailable(format!("{e:?}"))
}

/// Exponential attack/decay envelope starting at `t0`
fn envelope(param: &AudioParam, t0: f64, peak: f32, dur: f32, attack: f32) {
    param.cancel_scheduled_values(t0).ok();
    param.set_value_at_time(FLOOR, t0).ok();
    param
        .exponential_ramp_to_value_at_time(peak.max(FLOOR), t0 + attack.max(0.001) as f64)
        .ok();
    param
        .exponential_ramp_to_value_at_time(FLOOR, t0 + dur as f64)
        .ok();
}

fn osc_type(wave: Wave) -> OscillatorType {
    match wave {
        Wave::Sine => OscillatorType::Sine,
        Wave::Square => OscillatorType::Square,
        Wave::Sawtooth => OscillatorType::Sawtooth,
        Wave::Triangle => OscillatorType::Triangle,
    }
}

pub struct WebSynth {
    ctx: AudioContext,
    master: GainNode,
    sfx: GainNode,
    music: GainNode,
    pad: GainNode,
    pad_filter: BiquadFilterNode,
    lead: GainNode,
    lead_delay: DelayNode,
    lead_fb: GainNode,
    lead_wet: GainNode,
}

impl WebSynth {
    /// Build the context and bus graph; fails outside a secure context
    pub fn new() -> Result<Self, AudioError> {
        let ctx = AudioContext::new().map_err(js_err)?;

        let master = ctx.create_gain().map_err(js_err)?;
        let sfx = ctx.create_gain().map_err(js_err)?;
        let music = ctx.create_gain().map_err(js_err)?;
        let pad = ctx.create_gain().map_err(js_err)?;
        let pad_filter = ctx.create_biquad_filter().map_err(js_err)?;
        let lead = ctx.create_gain().map_err(js_err)?;
        let lead_delay = ctx.create_delay_with_max_delay_time(0.35).map_err(js_err)?;
        let lead_fb = ctx.create_gain().map_err(js_err)?;
        let lead_wet = ctx.create_gain().map_err(js_err)?;

        pad_filter.set_type(BiquadFilterType::Lowpass);
        pad_filter.q().set_value(0.7);
        pad_filter.frequency().set_value(900.0);
        music.gain().set_value(0.95);
        lead_fb.gain().set_value(0.0);
        lead_wet.gain().set_value(0.0);

        master
            .connect_with_audio_node(&ctx.destination())
            .map_err(js_err)?;
        sfx.connect_with_audio_node(&master).map_err(js_err)?;
        music.connect_with_audio_node(&master).map_err(js_err)?;
        pad.connect_with_audio_node(&pad_filter).map_err(js_err)?;
        pad_filter.connect_with_audio_node(&music).map_err(js_err)?;
        lead.connect_with_audio_node(&music).map_err(js_err)?;
        lead.connect_with_audio_node(&lead_delay).map_err(js_err)?;
        lead_delay.connect_with_audio_node(&lead_wet).map_err(js_err)?;
        lead_wet.connect_with_audio_node(&music).map_err(js_err)?;
        lead_delay.connect_with_audio_node(&lead_fb).map_err(js_err)?;
        lead_fb.connect_with_audio_node(&lead_delay).map_err(js_err)?;

        Ok(Self {
            ctx,
            master,
            sfx,
            music,
            pad,
            pad_filter,
            lead,
            lead_delay,
            lead_fb,
            lead_wet,
        })
    }

    fn bus(&self, bus: Bus) -> &GainNode {
        match bus {
            Bus::Sfx => &self.sfx,
            Bus::Music => &self.music,
            Bus::Pad => &self.pad,
            Bus::Lead => &self.lead,
        }
    }

    fn play_tone(&self, tone: &Tone) -> Option<()> {
        let osc = self.ctx.create_oscillator().ok()?;
        let gain = self.ctx.create_gain().ok()?;
        let t0 = tone.at.max(self.ctx.current_time());

        osc.set_type(osc_type(tone.wave));
        osc.frequency().set_value_at_time(tone.freq, t0).ok()?;
        if let Some((to, secs)) = tone.glide {
            osc.frequency()
                .exponential_ramp_to_value_at_time(to.max(1.0), t0 + secs as f64)
                .ok();
        }
        osc.detune().set_value(tone.detune);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(self.bus(tone.bus)).ok()?;

        envelope(&gain.gain(), t0, tone.gain, tone.dur, tone.attack);
        osc.start_with_when(t0).ok()?;
        osc.stop_with_when(t0 + tone.dur as f64 + 0.02).ok()
    }

    fn play_noise(&self, noise: &Noise) -> Option<()> {
        let rate = self.ctx.sample_rate();
        let len = ((rate * noise.dur) as u32).max(1);
        let samples: Vec<f32> = (0..len)
            .map(|i| (rand::random::<f32>() * 2.0 - 1.0) * (1.0 - i as f32 / len as f32))
            .collect();
        let buf = self.ctx.create_buffer(1, len, rate).ok()?;
        buf.copy_to_channel(&samples, 0).ok()?;

        let src = self.ctx.create_buffer_source().ok()?;
        let gain = self.ctx.create_gain().ok()?;
        let t0 = noise.at.max(self.ctx.current_time());
        src.set_buffer(Some(&buf));
        src.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(self.bus(noise.bus)).ok()?;

        envelope(&gain.gain(), t0, noise.gain, noise.dur, noise.attack);
        src.start_with_when(t0).ok()?;
        src.stop_with_when(t0 + noise.dur as f64 + 0.02).ok()
    }

    /// Silent blip; some mobile browsers only unlock once a node has played
    fn prime(&self) -> Option<()> {
        let osc = self.ctx.create_oscillator().ok()?;
        let gain = self.ctx.create_gain().ok()?;
        gain.gain().set_value(0.0);
        osc.connect_with_audio_node(&gain).ok()?;
        gain.connect_with_audio_node(&self.master).ok()?;
        let t0 = self.ctx.current_time();
        osc.start_with_when(t0).ok()?;
        osc.stop_with_when(t0 + 0.01).ok()
    }
}

impl Synth for WebSynth {
    fn now(&self) -> f64 {
        self.ctx.current_time()
    }

    fn resume(&mut self) -> Result<(), AudioError> {
        if self.ctx.state() == AudioContextState::Suspended {
            // The returned promise settles later; rejection is not actionable
            self.ctx
                .resume()
                .map_err(|e| AudioError::Resume(format!("{e:?}")))?;
        }
        self.prime();
        Ok(())
    }

    fn tone(&mut self, tone: &Tone) {
        self.play_tone(tone);
    }

    fn noise(&mut self, noise: &Noise) {
        self.play_noise(noise);
    }

    fn set_gain(&mut self, stage: GainStage, value: f32) {
        let node = match stage {
            GainStage::Master => &self.master,
            GainStage::Sfx => &self.sfx,
            GainStage::Music => &self.music,
        };
        node.gain().set_value(value);
    }

    fn set_pad_filter(&mut self, freq: f32, at: f64) {
        self.pad_filter.frequency().set_value_at_time(freq, at).ok();
    }

    fn set_lead_delay(&mut self, fx: LeadDelay, at: f64) {
        self.lead_delay
            .delay_time()
            .set_value_at_time(fx.time, at)
            .ok();
        self.lead_fb.gain().set_value_at_time(fx.feedback, at).ok();
        self.lead_wet.gain().set_value_at_time(fx.mix, at).ok();
    }

    fn close(&mut self) {
        self.ctx.close().ok();
    }
}
