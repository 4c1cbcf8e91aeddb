//! Player preferences
//!
//! Persisted through the signed store, separately from the high score.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioEngine, AudioMode, SCORE_IDS, Synth};
use crate::persistence::{KeyValueStore, PersistError, SignedStore, keys};
use crate::tuning::{DifficultyId, HeroId, MapId, RunSetup};

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    // === Audio ===
    pub audio_mode: AudioMode,
    pub muted: bool,
    pub score_id: String,
    /// Music volume (0.0 - 1.0)
    pub music_volume: f32,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
    /// Silence audio when the page is hidden or unfocused
    pub mute_on_blur: bool,

    // === Run selection ===
    pub map: MapId,
    pub difficulty: DifficultyId,
    pub hero: HeroId,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio_mode: AudioMode::Sfx,
            muted: false,
            score_id: SCORE_IDS[0].to_string(),
            music_volume: 0.85,
            sfx_volume: 0.85,
            mute_on_blur: true,
            map: MapId::Classic,
            difficulty: DifficultyId::Normal,
            hero: HeroId::Runner,
        }
    }
}

impl Settings {
    /// Setup for the next run; hell always plays on hard
    pub fn run_setup(&self) -> RunSetup {
        RunSetup {
            map: self.map,
            difficulty: if self.map == MapId::Hell {
                DifficultyId::Hard
            } else {
                self.difficulty
            },
            hero: self.hero,
        }
    }

    /// Push audio preferences into the engine
    pub fn apply_audio<S: Synth>(&self, audio: &mut AudioEngine<S>) {
        audio.set_music_volume(self.music_volume);
        audio.set_sfx_volume(self.sfx_volume);
        audio.set_score(&self.score_id);
        audio.set_mode(self.audio_mode);
        audio.set_muted(self.muted);
    }

    fn sanitize(&mut self) {
        self.music_volume = clamp_volume(self.music_volume);
        self.sfx_volume = clamp_volume(self.sfx_volume);
    }

    pub fn load<K: KeyValueStore>(store: &SignedStore<K>) -> Self {
        let mut settings = store.load_or(keys::SETTINGS, Self::default());
        settings.sanitize();
        settings
    }

    pub fn save<K: KeyValueStore>(&self, store: &mut SignedStore<K>) -> Result<(), PersistError> {
        store.save(keys::SETTINGS, self)?;
        log::info!("settings saved");
        Ok(())
    }
}

fn clamp_volume(v: f32) -> f32 {
    if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.85 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::NullSynth;
    use crate::persistence::MemoryStore;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_hell_forces_hard() {
        let settings = Settings {
            map: MapId::Hell,
            difficulty: DifficultyId::Easy,
            ..Settings::default()
        };
        assert_eq!(settings.run_setup().difficulty, DifficultyId::Hard);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"audioMode":"music","hero":"tank"}"#).unwrap();
        assert_eq!(settings.audio_mode, AudioMode::Music);
        assert_eq!(settings.hero, HeroId::Tank);
        assert_eq!(settings.score_id, "a_minor_chill");
    }

    #[test]
    fn test_save_load_sanitizes() {
        let mut store = SignedStore::open(MemoryStore::new(), &mut Pcg32::seed_from_u64(5));
        let settings = Settings {
            music_volume: 3.0,
            map: MapId::Winter,
            ..Settings::default()
        };
        settings.save(&mut store).unwrap();
        let loaded = Settings::load(&store);
        assert_eq!(loaded.map, MapId::Winter);
        assert_eq!(loaded.music_volume, 1.0);
    }

    #[test]
    fn test_apply_audio() {
        let settings = Settings {
            audio_mode: AudioMode::Music,
            score_id: "pentatonic_dusk".into(),
            ..Settings::default()
        };
        let mut audio = AudioEngine::new(NullSynth::new());
        settings.apply_audio(&mut audio);
        assert_eq!(audio.mode(), AudioMode::Music);
        assert_eq!(audio.score_id(), "pentatonic_dusk");
        assert!(!audio.muted());
    }
}
