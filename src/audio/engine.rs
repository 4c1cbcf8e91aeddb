//! Audio engine: sound effects, buses, lifecycle and music gating

use serde::{Deserialize, Serialize};

use super::music::{Layers, LimiterStats, MusicScheduler, SchedulerState, WeaponMask};
use super::scores::ScoreBook;
use super::{GainStage, Noise, Synth, Tone, Wave};
use crate::sim::{GameEvent, GameState, PickupKind, WeaponId};

const MASTER_GAIN: f32 = 0.62;
/// Sfx bus scale while music plays
const SFX_UNDER_MUSIC: f32 = 0.55;
const MUSIC_BUS: f32 = 0.95;
/// Music never drops to silence during a run
pub const INTENSITY_FLOOR: f32 = 0.22;
const DEFAULT_VOLUME: f32 = 0.85;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioMode {
    /// Plain sound effects
    #[default]
    Sfx,
    /// Procedural music; gameplay sounds are subdued
    Music,
}

/// Rate-limited sound categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SfxKey {
    Shoot,
    HitEnemy,
    HitPlayer,
    Explode,
    Pickup,
}

impl SfxKey {
    const COUNT: usize = 5;

    /// Minimum seconds between two sounds of this category
    fn cooldown(self, mode: AudioMode, boss: bool) -> f64 {
        let music = mode == AudioMode::Music;
        match self {
            SfxKey::Shoot => 0.03,
            SfxKey::HitEnemy if music => 0.16,
            SfxKey::HitPlayer if music => 0.11,
            SfxKey::HitEnemy | SfxKey::HitPlayer => 0.04,
            SfxKey::Explode if boss => 0.12,
            SfxKey::Explode => 0.06,
            SfxKey::Pickup => 0.06,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioDebug {
    pub mode: AudioMode,
    pub score_id: String,
    pub intensity: f32,
    pub muted: bool,
    pub unlocked: bool,
    pub backgrounded: bool,
    pub music_volume: f32,
    pub sfx_volume: f32,
    pub scheduler: SchedulerState,
    pub layers: Layers,
    pub step: u64,
    pub step_dur: f64,
    pub limiter: LimiterStats,
    pub shot_attempts: u64,
}

/// Owned audio state over a [`Synth`] backend
///
/// Every call is fire-and-forget. Nothing here feeds back into the simulation.
pub struct AudioEngine<S: Synth> {
    synth: S,
    scores: ScoreBook,
    score_id: String,
    mode: AudioMode,
    muted: bool,
    unlocked: bool,
    backgrounded: bool,
    intensity: f32,
    music_vol: f32,
    sfx_vol: f32,
    mask: WeaponMask,
    scheduler: MusicScheduler,
    /// Earliest synth time each category may sound again
    ready_at: [f64; SfxKey::COUNT],
    shot_attempts: u64,
}

impl<S: Synth> AudioEngine<S> {
    pub fn new(synth: S) -> Self {
        Self::with_scores(synth, ScoreBook::builtin())
    }

    pub fn with_scores(synth: S, scores: ScoreBook) -> Self {
        let score_id = scores.get_or_first("").id.clone();
        Self {
            synth,
            scores,
            score_id,
            mode: AudioMode::Sfx,
            muted: false,
            unlocked: false,
            backgrounded: false,
            intensity: 0.0,
            music_vol: DEFAULT_VOLUME,
            sfx_vol: DEFAULT_VOLUME,
            mask: WeaponMask::default(),
            scheduler: MusicScheduler::new(),
            ready_at: [0.0; SfxKey::COUNT],
            shot_attempts: 0,
        }
    }

    pub fn synth(&self) -> &S {
        &self.synth
    }

    pub fn synth_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    pub fn mode(&self) -> AudioMode {
        self.mode
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn unlocked(&self) -> bool {
        self.unlocked
    }

    pub fn score_id(&self) -> &str {
        &self.score_id
    }

    pub fn score_ids(&self) -> impl Iterator<Item = &str> {
        self.scores.ids()
    }

    /// Resume output after a user gesture; failures leave audio off
    pub fn unlock(&mut self) -> bool {
        if let Err(e) = self.synth.resume() {
            log::warn!("audio unlock failed: {e}");
            return false;
        }
        if !self.unlocked {
            log::info!("audio unlocked");
        }
        self.unlocked = true;
        self.sync_gains();
        self.sync_scheduler();
        true
    }

    /// Stop everything and release the backend
    pub fn teardown(&mut self) {
        self.scheduler.stop();
        self.synth.close();
        self.unlocked = false;
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.sync_gains();
        self.sync_scheduler();
    }

    pub fn set_backgrounded(&mut self, backgrounded: bool) {
        self.backgrounded = backgrounded;
        self.sync_gains();
        self.sync_scheduler();
    }

    pub fn set_mode(&mut self, mode: AudioMode) {
        self.mode = mode;
        self.sync_gains();
        self.sync_scheduler();
    }

    /// Switch score; unknown ids are ignored. Restarts the grid at the new tempo.
    pub fn set_score(&mut self, id: &str) {
        if self.scores.get(id).is_some() {
            self.score_id = id.to_string();
        }
        self.scheduler.reset_cursors();
        self.scheduler.stop();
        self.sync_scheduler();
    }

    pub fn set_intensity(&mut self, intensity: f32) {
        self.intensity = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
    }

    /// Intensity the music actually plays at
    pub fn intensity(&self) -> f32 {
        match self.mode {
            AudioMode::Music => self.intensity.max(INTENSITY_FLOOR),
            AudioMode::Sfx => self.intensity,
        }
    }

    pub fn set_music_meta(&mut self, weapons: impl IntoIterator<Item = WeaponId>) {
        self.mask = WeaponMask::from_weapons(weapons);
    }

    pub fn set_music_volume(&mut self, v: f32) {
        self.music_vol = v.clamp(0.0, 1.0);
        self.sync_gains();
    }

    pub fn set_sfx_volume(&mut self, v: f32) {
        self.sfx_vol = v.clamp(0.0, 1.0);
        self.sync_gains();
    }

    /// Snapshot the simulation values the music reads
    pub fn observe(&mut self, state: &GameState) {
        self.set_intensity(state.music_intensity());
        self.set_music_meta(state.player.weapons.iter().map(|w| w.id));
    }

    pub fn is_music_active(&self) -> bool {
        self.unlocked && !self.muted && !self.backgrounded && self.mode == AudioMode::Music
    }

    /// Advance the music scheduler; call every [`super::music::PUMP_INTERVAL_MS`]
    pub fn pump(&mut self) -> u32 {
        if !self.is_music_active() {
            return 0;
        }
        let intensity = self.intensity();
        let score = self.scores.get_or_first(&self.score_id);
        self.scheduler.pump(&mut self.synth, score, intensity, self.mask)
    }

    /// Play the sound for a simulation event
    pub fn handle(&mut self, event: &GameEvent) {
        match event {
            GameEvent::Shoot(id) => self.shoot(*id),
            GameEvent::Hit { player } => self.hit(*player),
            GameEvent::Explode { boss } => self.explode(*boss),
            GameEvent::Pickup(kind) => self.pickup(*kind),
            GameEvent::LevelUp => self.level_up(),
            GameEvent::Death => self.death(),
            _ => {}
        }
    }

    pub fn shoot(&mut self, kind: WeaponId) {
        if !self.can_play(SfxKey::Shoot, false) {
            return;
        }
        if self.mode == AudioMode::Music {
            self.shot_attempts += 1;
            return;
        }
        match kind {
            WeaponId::Shotgun => {
                self.noise(0.03, 0.08);
                self.tone(Tone::new(Wave::Square, 160.0, 0.06, 0.06).detune(-20.0));
            }
            WeaponId::Flame => {
                self.noise(0.03, 0.05);
                self.tone(Tone::new(Wave::Sawtooth, 220.0, 0.05, 0.035).detune(12.0));
            }
            WeaponId::Lance => {
                self.tone(Tone::new(Wave::Sawtooth, 220.0, 0.10, 0.08).detune(-10.0));
            }
            _ => self.tone(Tone::new(Wave::Square, 420.0, 0.05, 0.06)),
        }
    }

    pub fn hit(&mut self, player: bool) {
        let key = if player { SfxKey::HitPlayer } else { SfxKey::HitEnemy };
        if !self.can_play(key, false) {
            return;
        }
        let music = self.mode == AudioMode::Music;
        match (player, music) {
            (true, true) => {
                self.noise(0.035, 0.055);
                self.tone(Tone::new(Wave::Sine, 90.0, 0.07, 0.028));
            }
            (true, false) => {
                self.noise(0.045, 0.10);
                self.tone(Tone::new(Wave::Sine, 90.0, 0.08, 0.05));
            }
            (false, _) => self.noise(0.014, if music { 0.02 } else { 0.05 }),
        }
    }

    pub fn explode(&mut self, boss: bool) {
        if !self.can_play(SfxKey::Explode, boss) {
            return;
        }
        if boss {
            self.noise(0.16, 0.10);
            self.tone(Tone::new(Wave::Sawtooth, 120.0, 0.22, 0.08));
            self.tone(Tone::new(Wave::Sawtooth, 70.0, 0.28, 0.06));
        } else {
            self.noise(0.06, 0.07);
            self.tone(Tone::new(Wave::Square, 140.0, 0.08, 0.05));
        }
    }

    pub fn pickup(&mut self, kind: PickupKind) {
        if !self.can_play(SfxKey::Pickup, false) {
            return;
        }
        let (freq, dur, gain) = match kind {
            PickupKind::Heal => (520.0, 0.10, 0.06),
            PickupKind::Chest => (330.0, 0.14, 0.07),
            PickupKind::Buff => (610.0, 0.10, 0.06),
            PickupKind::Xp => (740.0, 0.07, 0.05),
        };
        self.tone(Tone::new(Wave::Triangle, freq, dur, gain));
    }

    pub fn level_up(&mut self) {
        if !self.audible() {
            return;
        }
        self.tone(Tone::new(Wave::Triangle, 520.0, 0.08, 0.05));
        self.tone(Tone::new(Wave::Triangle, 780.0, 0.10, 0.06));
    }

    pub fn death(&mut self) {
        if !self.audible() {
            return;
        }
        self.tone(Tone::new(Wave::Sawtooth, 160.0, 0.14, 0.08));
        self.tone(Tone::new(Wave::Sawtooth, 90.0, 0.20, 0.07));
        self.noise(0.12, 0.08);
    }

    pub fn debug(&self) -> AudioDebug {
        AudioDebug {
            mode: self.mode,
            score_id: self.score_id.clone(),
            intensity: self.intensity(),
            muted: self.muted,
            unlocked: self.unlocked,
            backgrounded: self.backgrounded,
            music_volume: self.music_vol,
            sfx_volume: self.sfx_vol,
            scheduler: self.scheduler.state(),
            layers: Layers::gate(self.intensity(), self.mask),
            step: self.scheduler.step(),
            step_dur: self.scheduler.step_dur(),
            limiter: self.scheduler.stats(),
            shot_attempts: self.shot_attempts,
        }
    }

    fn audible(&self) -> bool {
        self.unlocked && !self.muted
    }

    /// Audible and off cooldown; arms the cooldown when it passes
    fn can_play(&mut self, key: SfxKey, boss: bool) -> bool {
        if !self.audible() {
            return false;
        }
        let now = self.synth.now();
        let slot = &mut self.ready_at[key as usize];
        if now < *slot {
            return false;
        }
        *slot = now + key.cooldown(self.mode, boss);
        true
    }

    fn tone(&mut self, tone: Tone) {
        let tone = tone.at(self.synth.now());
        self.synth.tone(&tone);
    }

    fn noise(&mut self, dur: f32, gain: f32) {
        let noise = Noise::new(dur, gain).at(self.synth.now());
        self.synth.noise(&noise);
    }

    fn sync_gains(&mut self) {
        let master = if self.muted || self.backgrounded { 0.0 } else { MASTER_GAIN };
        let sfx_mul = match self.mode {
            AudioMode::Music => SFX_UNDER_MUSIC,
            AudioMode::Sfx => 1.0,
        };
        self.synth.set_gain(GainStage::Master, master);
        self.synth.set_gain(GainStage::Sfx, self.sfx_vol * sfx_mul);
        self.synth.set_gain(GainStage::Music, self.music_vol * MUSIC_BUS);
    }

    fn sync_scheduler(&mut self) {
        if self.is_music_active() {
            let now = self.synth.now();
            self.scheduler.start(now, self.scores.get_or_first(&self.score_id));
        } else {
            self.scheduler.stop();
        }
    }
}
