//! Host-side glue around a run
//!
//! Owns the simulation plus everything around it: input, frame clock, audio
//! and the signed store. Both the web entry and the headless runner drive the
//! game through this type.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::Serialize;

use crate::audio::{AudioEngine, Synth};
use crate::highscores::HighScore;
use crate::persistence::{KeyValueStore, SignedStore, keys};
use crate::platform::{FrameClock, InputState};
use crate::settings::Settings;
use crate::sim::progression::choose_upgrade;
use crate::sim::{GameEvent, GamePhase, GameState, LifetimeStats, RunSummary, TickInput, tick};

/// Everything a renderer needs for one frame
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<'a> {
    pub state: &'a GameState,
    pub high_score: HighScore,
    pub new_high_score: bool,
}

pub struct Session<K: KeyValueStore, S: Synth> {
    pub state: GameState,
    pub input: InputState,
    pub audio: AudioEngine<S>,
    store: SignedStore<K>,
    settings: Settings,
    high_score: HighScore,
    new_high_score: bool,
    clock: FrameClock,
    seeds: Pcg32,
    hidden: bool,
    unfocused: bool,
}

impl<K: KeyValueStore, S: Synth> Session<K, S> {
    pub fn new(store: SignedStore<K>, synth: S, seed: u64) -> Self {
        let settings = Settings::load(&store);
        let high_score = HighScore::load(&store);
        let lifetime: LifetimeStats = store.load_or(keys::LIFETIME, LifetimeStats::default());

        let mut audio = AudioEngine::new(synth);
        settings.apply_audio(&mut audio);

        let mut state = GameState::new(seed, settings.run_setup());
        state.lifetime = lifetime;

        Self {
            state,
            input: InputState::new(),
            audio,
            store,
            settings,
            high_score,
            new_high_score: false,
            clock: FrameClock::new(),
            seeds: Pcg32::seed_from_u64(seed),
            hidden: false,
            unfocused: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn high_score(&self) -> HighScore {
        self.high_score
    }

    pub fn new_high_score(&self) -> bool {
        self.new_high_score
    }

    pub fn store(&self) -> &SignedStore<K> {
        &self.store
    }

    /// One host frame: intents, a clamped tick, then event fan-out
    pub fn frame(&mut self, now_ms: f64) {
        let dt = self.clock.frame(now_ms);
        let intents = self.input.take_intents();

        if intents.restart || (intents.start && self.state.phase == GamePhase::GameOver) {
            self.restart();
        } else if intents.start && self.state.phase == GamePhase::Ready {
            self.state.start();
        }
        if intents.start || intents.restart {
            // Key presses count as the unlocking gesture
            self.audio.unlock();
        }

        let input = self.input.tick_input(&intents, now_ms);
        self.step(&input, dt);
    }

    /// Tick with explicit input, bypassing keyboard state
    pub fn step(&mut self, input: &TickInput, dt: f32) {
        tick(&mut self.state, input, dt);
        self.dispatch_events();
    }

    fn dispatch_events(&mut self) {
        for event in self.state.drain_events() {
            self.audio.handle(&event);
            match event {
                GameEvent::RunEnded(summary) => self.on_run_end(&summary),
                GameEvent::Achievement(_) => self.save_lifetime(),
                _ => {}
            }
        }
        self.audio.observe(&self.state);
    }

    fn on_run_end(&mut self, summary: &RunSummary) {
        self.new_high_score = self.high_score.submit(summary, &mut self.store);
        if self.new_high_score {
            let pos = self.state.player.pos - Vec2::new(0.0, 34.0);
            self.state.push_float(pos, 1.6, "NEW HIGHSCORE");
        }
        self.save_lifetime();
    }

    fn save_lifetime(&mut self) {
        if let Err(e) = self.store.save(keys::LIFETIME, &self.state.lifetime) {
            log::warn!("lifetime stats not saved: {e}");
        }
    }

    /// Fresh run with a new seed; lifetime stats carry over
    pub fn restart(&mut self) {
        let seed = self.seeds.random::<u64>();
        let lifetime = std::mem::take(&mut self.state.lifetime);
        let viewport = self.state.viewport;
        self.state = GameState::new(seed, self.settings.run_setup());
        self.state.lifetime = lifetime;
        self.state.viewport = viewport;
        self.state.start();
        self.new_high_score = false;
        self.clock.reset();
    }

    pub fn choose_upgrade(&mut self, index: usize) {
        choose_upgrade(&mut self.state, index);
        self.dispatch_events();
    }

    pub fn set_viewport(&mut self, w: f32, h: f32) {
        if w > 0.0 && h > 0.0 {
            self.state.viewport = Vec2::new(w, h);
        }
    }

    /// Auto-pause on hide; the music always stops while hidden
    pub fn set_visible(&mut self, visible: bool) {
        self.hidden = !visible;
        if visible {
            self.clock.reset();
        } else {
            self.auto_pause("tab hidden");
        }
        self.sync_background();
    }

    /// Auto-pause on blur; audio follows the mute-on-blur preference
    pub fn set_focused(&mut self, focused: bool) {
        self.unfocused = !focused;
        if !focused {
            self.auto_pause("window blur");
        }
        self.sync_background();
    }

    fn auto_pause(&mut self, why: &str) {
        self.input.clear();
        if self.state.phase == GamePhase::Playing {
            self.state.toggle_pause();
            log::info!("auto-paused ({why})");
        }
    }

    fn sync_background(&mut self) {
        let backgrounded = self.hidden || (self.unfocused && self.settings.mute_on_blur);
        self.audio.set_backgrounded(backgrounded);
    }

    /// Replace preferences; they apply to audio now and to the next run's setup
    pub fn update_settings(&mut self, settings: Settings) {
        settings.apply_audio(&mut self.audio);
        self.settings = settings;
        self.sync_background();
        if let Err(e) = self.settings.save(&mut self.store) {
            log::warn!("settings not saved: {e}");
        }
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            state: &self.state,
            high_score: self.high_score,
            new_high_score: self.new_high_score,
        }
    }

    pub fn snapshot_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioMode, NullSynth};
    use crate::consts::SIM_DT;
    use crate::persistence::MemoryStore;

    fn session() -> Session<MemoryStore, NullSynth> {
        let store = SignedStore::open(MemoryStore::new(), &mut Pcg32::seed_from_u64(3));
        Session::new(store, NullSynth::new(), 42)
    }

    fn die(s: &mut Session<MemoryStore, NullSynth>) {
        s.state.kills = 17;
        s.state.end_game();
        s.dispatch_events();
    }

    #[test]
    fn test_enter_starts_and_unlocks() {
        let mut s = session();
        assert_eq!(s.state.phase, GamePhase::Ready);
        s.input.key_down("Enter", "Enter");
        s.frame(16.0);
        assert_eq!(s.state.phase, GamePhase::Playing);
        assert!(s.audio.unlocked());
    }

    #[test]
    fn test_frames_advance_time() {
        let mut s = session();
        s.state.start();
        for i in 0..30 {
            s.frame(i as f64 * 16.0);
        }
        // First frame has no delta
        assert!((s.state.time - 29.0 * 0.016).abs() < 1e-3);
    }

    #[test]
    fn test_run_end_persists_high_score_and_lifetime() {
        let mut s = session();
        s.state.start();
        die(&mut s);
        assert!(s.new_high_score());
        assert_eq!(s.high_score().best_kills, 17);
        assert!(s.state.floats.iter().any(|f| f.text == "NEW HIGHSCORE"));

        let stored: LifetimeStats = s.store().load_or(keys::LIFETIME, LifetimeStats::default());
        assert_eq!(stored.runs, 1);
        assert_eq!(HighScore::load(s.store()).best_kills, 17);
    }

    #[test]
    fn test_restart_keeps_lifetime_and_reseeds() {
        let mut s = session();
        s.state.start();
        die(&mut s);
        let old_seed = s.state.seed;

        s.input.key_down("KeyR", "r");
        s.frame(100.0);
        assert_eq!(s.state.phase, GamePhase::Playing);
        assert_ne!(s.state.seed, old_seed);
        assert_eq!(s.state.lifetime.runs, 1);
        assert!(!s.new_high_score());
    }

    #[test]
    fn test_hidden_pauses_and_silences() {
        let mut s = session();
        s.update_settings(Settings {
            audio_mode: AudioMode::Music,
            ..Settings::default()
        });
        s.audio.unlock();
        s.state.start();
        assert!(s.audio.is_music_active());

        s.set_visible(false);
        assert_eq!(s.state.phase, GamePhase::Paused);
        assert!(!s.audio.is_music_active());

        s.set_visible(true);
        assert!(s.audio.is_music_active());
        assert_eq!(s.state.phase, GamePhase::Paused);
    }

    #[test]
    fn test_blur_respects_mute_preference() {
        let mut s = session();
        s.update_settings(Settings {
            audio_mode: AudioMode::Music,
            mute_on_blur: false,
            ..Settings::default()
        });
        s.audio.unlock();
        s.set_focused(false);
        assert!(s.audio.is_music_active());
    }

    #[test]
    fn test_settings_survive_reopen() {
        let mut s = session();
        s.update_settings(Settings {
            hero: crate::tuning::HeroId::Tank,
            ..Settings::default()
        });
        let store = SignedStore::open(s.store().inner().clone(), &mut Pcg32::seed_from_u64(8));
        let reopened = Session::new(store, NullSynth::new(), 1);
        assert_eq!(reopened.settings().hero, crate::tuning::HeroId::Tank);
        assert_eq!(reopened.state.setup.hero, crate::tuning::HeroId::Tank);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut s = session();
        s.state.start();
        s.step(&TickInput::default(), SIM_DT);
        let json = s.snapshot_json().unwrap();
        assert!(json.contains("\"highScore\"") && json.contains("\"newHighScore\":false"));
    }
}
