//! Best-run record
//!
//! Persisted through the signed store; compared against each finished run.

use serde::{Deserialize, Serialize};

use crate::persistence::{KeyValueStore, PersistError, SignedStore, keys};
use crate::sim::RunSummary;

const RECORD_VERSION: u32 = 1;

/// Best kills and best wave, tracked independently
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighScore {
    pub best_kills: u32,
    pub best_wave: u32,
    pub v: u32,
}

impl Default for HighScore {
    fn default() -> Self {
        Self {
            best_kills: 0,
            best_wave: 0,
            v: RECORD_VERSION,
        }
    }
}

impl HighScore {
    /// Fold a finished run in; returns true if either best improved
    pub fn record(&mut self, run: &RunSummary) -> bool {
        let kills = self.best_kills.max(run.kills);
        let wave = self.best_wave.max(run.wave);
        let improved = kills != self.best_kills || wave != self.best_wave;
        self.best_kills = kills;
        self.best_wave = wave;
        improved
    }

    /// Load, falling back to zeros when absent or tampered
    pub fn load<K: KeyValueStore>(store: &SignedStore<K>) -> Self {
        let hs = store.load_or(keys::HIGH_SCORE, Self::default());
        log::info!("high score: kills={} wave={}", hs.best_kills, hs.best_wave);
        hs
    }

    pub fn save<K: KeyValueStore>(&self, store: &mut SignedStore<K>) -> Result<(), PersistError> {
        store.save(keys::HIGH_SCORE, self)
    }

    /// Record a run and persist when it set a new best
    pub fn submit<K: KeyValueStore>(&mut self, run: &RunSummary, store: &mut SignedStore<K>) -> bool {
        if !self.record(run) {
            return false;
        }
        log::info!("new high score: kills={} wave={}", self.best_kills, self.best_wave);
        if let Err(e) = self.save(store) {
            log::warn!("high score not saved: {e}");
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn run(kills: u32, wave: u32) -> RunSummary {
        RunSummary {
            kills,
            wave,
            time: 60.0,
            level: 3,
        }
    }

    #[test]
    fn test_bests_tracked_independently() {
        let mut hs = HighScore::default();
        assert!(hs.record(&run(40, 3)));
        assert!(hs.record(&run(10, 5)));
        assert_eq!((hs.best_kills, hs.best_wave), (40, 5));
        assert!(!hs.record(&run(40, 5)));
    }

    #[test]
    fn test_submit_persists_only_improvements() {
        let mut store = SignedStore::open(MemoryStore::new(), &mut Pcg32::seed_from_u64(1));
        let mut hs = HighScore::load(&store);
        assert_eq!(hs, HighScore::default());

        assert!(hs.submit(&run(12, 2), &mut store));
        assert_eq!(HighScore::load(&store).best_kills, 12);

        assert!(!hs.submit(&run(5, 1), &mut store));
        assert_eq!(HighScore::load(&store), hs);
    }

    #[test]
    fn test_camel_case_record() {
        let json = serde_json::to_string(&HighScore::default()).unwrap();
        assert!(json.contains("bestKills") && json.contains("bestWave"));
    }
}
