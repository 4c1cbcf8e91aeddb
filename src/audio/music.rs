//! Procedural music scheduler
//!
//! A 16th-note step sequencer. The host pumps it on a short timer; each pump
//! schedules every step that falls inside the lookahead window at its exact
//! grid time. Layers are gated by intensity and by the weapons the player
//! owns, and a per-step trigger budget keeps dense moments from turning into
//! noise.

use serde::Serialize;

use super::scores::{Drums, LeadFx, Score};
use super::{Bus, LeadDelay, Noise, Synth, Tone, Wave, midi_to_freq};
use crate::sim::WeaponId;

pub const STEPS_PER_BAR: u64 = 16;
/// How far ahead of the synth clock steps are scheduled (seconds)
pub const LOOKAHEAD: f64 = 0.14;
/// Host timer period for [`MusicScheduler::pump`]
pub const PUMP_INTERVAL_MS: u32 = 25;
const START_DELAY: f64 = 0.02;
/// Falling further behind than this skips steps instead of bursting
const MAX_LAG: f64 = 0.25;

/// Triggers allowed per step across all voices
pub const MAX_PER_STEP: u32 = 5;

const PAD_AT: f32 = 0.18;
const BASS_AT: f32 = 0.48;
const HAT_AT: f32 = 0.78;
const ARP_AT: f32 = 0.12;
const DRUMS_AT: f32 = 0.18;
const LEAD_AT: f32 = 0.28;
const TEXTURE_AT: f32 = 0.35;
const SECTION_HAT_AT: f32 = 0.55;
const INTRO_MUL: f32 = 0.55;

const LEAD_WEAPONS: [WeaponId; 3] = [WeaponId::Lance, WeaponId::Tesla, WeaponId::Laser];

/// Owned weapons as seen by the music side
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeaponMask {
    bits: u16,
    count: u32,
}

impl WeaponMask {
    pub fn from_weapons(ids: impl IntoIterator<Item = WeaponId>) -> Self {
        let mut mask = Self::default();
        for id in ids {
            let bit = 1u16 << (id as u16);
            if mask.bits & bit == 0 {
                mask.bits |= bit;
                mask.count += 1;
            }
        }
        mask
    }

    pub fn has(self, id: WeaponId) -> bool {
        self.bits & (1u16 << (id as u16)) != 0
    }

    pub fn count(self) -> u32 {
        self.count
    }
}

/// Which layers are audible
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layers {
    pub pad: bool,
    pub bass: bool,
    pub hat: bool,
    pub arp: bool,
    pub drums: bool,
    pub lead: bool,
    pub texture: bool,
}

impl Layers {
    /// Threshold gates; raising intensity never turns a layer off
    pub fn gate(intensity: f32, mask: WeaponMask) -> Self {
        let wc = mask.count();
        Self {
            pad: intensity >= PAD_AT,
            bass: intensity >= BASS_AT,
            hat: intensity >= HAT_AT,
            arp: mask.has(WeaponId::Pistol) && wc >= 1 && intensity >= ARP_AT,
            drums: mask.has(WeaponId::Shotgun) && wc >= 2 && intensity >= DRUMS_AT,
            lead: LEAD_WEAPONS.iter().any(|&w| mask.has(w)) && wc >= 2 && intensity >= LEAD_AT,
            texture: mask.has(WeaponId::Flame) && wc >= 3 && intensity >= TEXTURE_AT,
        }
    }

    pub fn count(self) -> u32 {
        [
            self.pad,
            self.bass,
            self.hat,
            self.arp,
            self.drums,
            self.lead,
            self.texture,
        ]
        .iter()
        .filter(|&&on| on)
        .count() as u32
    }

    /// True when every layer on in `self` is also on in `other`
    pub fn is_subset_of(self, other: Layers) -> bool {
        (!self.pad || other.pad)
            && (!self.bass || other.bass)
            && (!self.hat || other.hat)
            && (!self.arp || other.arp)
            && (!self.drums || other.drums)
            && (!self.lead || other.lead)
            && (!self.texture || other.texture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Voice {
    Pad,
    Bass,
    Kick,
    Snare,
    Hat,
    Arp,
    Lead,
    Texture,
}

impl Voice {
    fn limit(self) -> u8 {
        match self {
            Voice::Hat => 2,
            _ => 1,
        }
    }
}

/// Anti-cacophony counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LimiterStats {
    pub max_per_step: u32,
    pub last_step: u64,
    pub step_triggers: u32,
    /// Triggers refused by a voice's own per-step limit
    pub drop_kind: u64,
    /// Triggers refused by the global per-step budget
    pub drop_budget: u64,
    pub notes_scheduled: u64,
}

#[derive(Debug, Default)]
struct StepBudget {
    per_voice: [u8; 8],
    total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    #[default]
    Stopped,
    Scheduling,
}

#[derive(Debug, Default)]
pub struct MusicScheduler {
    state: SchedulerState,
    step: u64,
    next_t: f64,
    step_dur: f64,
    intro_bars: u64,
    chord_degree: i32,
    /// Pattern position per weapon
    cursors: [usize; 9],
    budget: StepBudget,
    stats: LimiterStats,
}

impl MusicScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Scheduling
    }

    pub fn step(&self) -> u64 {
        self.step
    }

    pub fn step_dur(&self) -> f64 {
        self.step_dur
    }

    pub fn chord_degree(&self) -> i32 {
        self.chord_degree
    }

    pub fn stats(&self) -> LimiterStats {
        self.stats
    }

    /// Begin scheduling from a fresh phase origin; no-op if already running
    pub fn start(&mut self, now: f64, score: &Score) {
        if self.is_running() {
            return;
        }
        self.next_t = now + START_DELAY;
        self.step = 0;
        self.step_dur = score.step_dur();
        self.intro_bars = score.intro_bars as u64;
        self.budget = StepBudget::default();
        self.state = SchedulerState::Scheduling;
        log::debug!("music: scheduler started ({}, {} bpm)", score.id, score.bpm);
    }

    pub fn stop(&mut self) {
        if self.is_running() {
            log::debug!("music: scheduler stopped at step {}", self.step);
        }
        self.state = SchedulerState::Stopped;
    }

    /// Forget pattern positions (score change)
    pub fn reset_cursors(&mut self) {
        self.cursors = [0; 9];
    }

    /// Schedule every step inside the lookahead window; returns steps scheduled
    pub fn pump<S: Synth>(
        &mut self,
        synth: &mut S,
        score: &Score,
        intensity: f32,
        mask: WeaponMask,
    ) -> u32 {
        if !self.is_running() || self.step_dur <= 0.0 {
            return 0;
        }
        let now = synth.now();
        let lag = now - self.next_t;
        if lag > MAX_LAG {
            let missed = (lag / self.step_dur).floor() as u64;
            self.step += missed;
            self.next_t += missed as f64 * self.step_dur;
        }

        let intensity = intensity.clamp(0.0, 1.0);
        let mut scheduled = 0;
        while self.next_t < now + LOOKAHEAD {
            self.schedule_step(synth, score, self.next_t, intensity, mask);
            self.step += 1;
            self.next_t += self.step_dur;
            scheduled += 1;
        }
        scheduled
    }

    fn admit(&mut self, voice: Voice) -> bool {
        let slot = &mut self.budget.per_voice[voice as usize];
        if *slot >= voice.limit() {
            self.stats.drop_kind += 1;
            return false;
        }
        if self.budget.total >= MAX_PER_STEP {
            self.stats.drop_budget += 1;
            return false;
        }
        *slot += 1;
        self.budget.total += 1;
        self.stats.step_triggers = self.budget.total;
        true
    }

    fn next_degree(&mut self, score: &Score, weapon: WeaponId) -> i32 {
        let pattern = score.pattern_for(weapon);
        let cursor = &mut self.cursors[weapon as usize];
        let degree = pattern[*cursor % pattern.len()];
        *cursor = cursor.wrapping_add(1);
        degree
    }

    fn swung(&self, score: &Score, t0: f64, in_bar: u64) -> f64 {
        if in_bar % 2 == 1 {
            t0 + self.step_dur * score.swing as f64
        } else {
            t0
        }
    }

    fn schedule_step<S: Synth>(
        &mut self,
        synth: &mut S,
        score: &Score,
        t0: f64,
        intensity: f32,
        mask: WeaponMask,
    ) {
        let bar = self.step / STEPS_PER_BAR;
        let in_bar = self.step % STEPS_PER_BAR;
        let in_intro = bar < self.intro_bars;
        let layers = Layers::gate(intensity, mask);

        self.budget = StepBudget::default();
        self.stats.max_per_step = MAX_PER_STEP;
        self.stats.last_step = self.step;
        self.stats.step_triggers = 0;

        if in_bar == 0 {
            let prog = &score.chord_prog;
            let len = prog.len().max(1) as u64;
            let at = |bar: u64| prog.get((bar % len) as usize).copied().unwrap_or(0);
            let mut degree = at(bar);
            if len <= 4 && bar % 8 == 7 {
                degree = at(bar + 1);
            }
            self.chord_degree = degree;
            synth.set_lead_delay(lead_delay(&score.fx), t0);
            if !in_intro {
                self.chord(synth, score, t0, bar, intensity, layers);
            }
        }

        let ts = self.swung(score, t0, in_bar);
        let section = match score.section_bars {
            0 => 0,
            n => (bar / n as u64) % 2,
        };

        if let Some(drums) = &score.drums {
            let hit = |steps: &[u32]| steps.contains(&(in_bar as u32));
            if in_intro {
                self.drum_hits(synth, drums, t0, ts, [INTRO_MUL; 3], &hit);
            }
            if layers.drums {
                let muls = [
                    0.75 + 0.55 * intensity,
                    0.65 + 0.45 * intensity,
                    0.60 + 0.55 * intensity,
                ];
                self.drum_hits(synth, drums, t0, ts, muls, &hit);
                if section == 1 && intensity >= SECTION_HAT_AT && in_bar % 2 == 1 {
                    self.hat(synth, ts, drums.hat_gain * 0.55);
                }
            } else if layers.hat && hit(drums.hat.as_slice()) {
                self.hat(synth, ts, drums.hat_gain * (0.45 + 0.4 * intensity));
            }
        }

        if let Some(bass) = &score.bass
            && (layers.bass || in_intro)
            && let Some(Some(offset)) = bass.pat.get(in_bar as usize).copied()
            && self.admit(Voice::Bass)
        {
            let mul = if in_intro { INTRO_MUL } else { 1.0 };
            let midi = score.root_midi + score.scale_at(self.chord_degree + offset) - 24;
            let at = if in_bar % 2 == 1 { ts } else { t0 };
            let gain = bass.gain * (0.70 + 0.70 * intensity) * mul;
            synth.tone(
                &Tone::new(Wave::Triangle, midi_to_freq(midi), 0.10, gain)
                    .at(at)
                    .detune(-4.0)
                    .attack(0.004)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }

        if layers.arp && in_bar % 2 == 0 && self.admit(Voice::Arp) {
            let mul = if section == 1 { 1.05 } else { 0.95 };
            let degree = self.next_degree(score, WeaponId::Pistol);
            let octave = if degree >= score.scale.len() as i32 { 12 } else { 0 };
            let midi = score.root_midi + score.scale_at(degree) + octave;
            synth.tone(
                &Tone::new(Wave::Square, midi_to_freq(midi), 0.05, (0.015 + 0.018 * intensity) * mul)
                    .at(t0)
                    .detune(4.0)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }

        if layers.lead && in_bar % 4 == 0 && self.admit(Voice::Lead) {
            let mul = if section == 1 { 1.0 } else { 0.9 };
            let weapon = LEAD_WEAPONS
                .into_iter()
                .find(|&w| mask.has(w))
                .unwrap_or(WeaponId::Lance);
            let degree = self.next_degree(score, weapon);
            let midi = score.root_midi + score.scale_at(degree) + 12;
            synth.tone(
                &Tone::new(Wave::Sawtooth, midi_to_freq(midi), 0.11, (0.016 + 0.020 * intensity) * mul)
                    .at(t0)
                    .detune(-6.0)
                    .bus(Bus::Lead),
            );
            self.stats.notes_scheduled += 1;
        }

        if layers.texture && in_bar % 8 == 2 && self.admit(Voice::Texture) {
            let gain = 0.006 + 0.006 * intensity;
            synth.noise(&Noise::new(0.020, gain).at(t0).attack(0.002).bus(Bus::Music));
            synth.tone(
                &Tone::new(Wave::Sawtooth, midi_to_freq(score.root_midi + 24), 0.05, gain)
                    .at(t0)
                    .detune(10.0)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }
    }

    /// Pad triad (and bass root) for a new bar
    fn chord<S: Synth>(
        &mut self,
        synth: &mut S,
        score: &Score,
        t0: f64,
        bar: u64,
        intensity: f32,
        layers: Layers,
    ) {
        if !layers.pad || !self.admit(Voice::Pad) {
            return;
        }
        let bar_dur = (self.step_dur * STEPS_PER_BAR as f64) as f32;
        let root = score.root_midi + score.scale_at(self.chord_degree);
        let mut third = root + score.scale_at(2) - score.scale_at(0);
        let mut fifth = root + score.scale_at(4) - score.scale_at(0);
        match bar % 8 {
            4 => third += 12,
            6 => fifth -= 12,
            _ => {}
        }

        let pad = &score.pad;
        let base = pad.filter_base.unwrap_or(800.0 + 500.0 * intensity);
        let drift = (bar as f32 * 0.55).sin() * 0.5 + 0.5;
        synth.set_pad_filter((base + pad.filter_var * drift).max(220.0), t0);

        let gain = 0.016 + 0.028 * intensity;
        let det = pad.detune;
        for (midi, g, d) in [
            (root, 1.0, -det),
            (third, 0.92, det * 0.55),
            (fifth, 0.85, det * 0.85),
        ] {
            synth.tone(
                &Tone::new(pad.wave, midi_to_freq(midi), bar_dur * 0.98, gain * g)
                    .at(t0)
                    .detune(d)
                    .attack(pad.attack)
                    .bus(Bus::Pad),
            );
        }
        self.stats.notes_scheduled += 3;

        if layers.bass && self.admit(Voice::Bass) {
            synth.tone(
                &Tone::new(Wave::Triangle, midi_to_freq(root - 24), bar_dur * 0.60, 0.030 + 0.040 * intensity)
                    .at(t0)
                    .detune(-4.0)
                    .attack(0.02)
                    .bus(Bus::Music),
            );
            synth.noise(
                &Noise::new(0.012, 0.010 + 0.015 * intensity)
                    .at(t0)
                    .attack(0.002)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }
    }

    fn drum_hits<S: Synth>(
        &mut self,
        synth: &mut S,
        drums: &Drums,
        t0: f64,
        ts: f64,
        [kick, snare, hat]: [f32; 3],
        hit: &impl Fn(&[u32]) -> bool,
    ) {
        if hit(drums.kick.as_slice()) && self.admit(Voice::Kick) {
            synth.tone(
                &Tone::new(Wave::Sine, 150.0, 0.14, drums.kick_gain * kick)
                    .at(t0)
                    .attack(0.004)
                    .glide(55.0, 0.08)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }
        if hit(drums.snare.as_slice()) && self.admit(Voice::Snare) {
            synth.noise(
                &Noise::new(0.030, drums.snare_gain * snare)
                    .at(t0)
                    .attack(0.002)
                    .bus(Bus::Music),
            );
            self.stats.notes_scheduled += 1;
        }
        if hit(drums.hat.as_slice()) {
            self.hat(synth, ts, drums.hat_gain * hat);
        }
    }

    fn hat<S: Synth>(&mut self, synth: &mut S, at: f64, gain: f32) {
        if self.admit(Voice::Hat) {
            synth.noise(&Noise::new(0.010, gain).at(at).attack(0.001).bus(Bus::Music));
            self.stats.notes_scheduled += 1;
        }
    }
}

fn lead_delay(fx: &LeadFx) -> LeadDelay {
    LeadDelay {
        time: (fx.lead_delay_time.clamp(0.0, 1.0) * 0.35).max(0.04),
        feedback: (fx.lead_delay_fb.clamp(0.0, 1.0) * 0.60).min(0.45),
        mix: fx.lead_delay_mix.clamp(0.0, 1.0) * 0.70,
    }
}
