//! Music score data
//!
//! A score is pure data: tempo, scale, chord progression, pad timbre, groove
//! step lists and per-weapon note patterns. New scores can be added as JSON
//! without touching the scheduler.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AudioError, Wave};
use crate::sim::WeaponId;

pub const SCORE_IDS: [&str; 5] = [
    "a_minor_chill",
    "dorian_float",
    "synthwave_minor",
    "pentatonic_dusk",
    "harmonic_minor_arcade",
];

const NATURAL_MINOR: [i32; 7] = [0, 2, 3, 5, 7, 8, 10];
const FALLBACK_PATTERN: [i32; 6] = [0, 2, 4, 5, 4, 2];

/// Pad timbre and filter movement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PadVoice {
    #[serde(rename = "type")]
    pub wave: Wave,
    /// Detune spread in cents
    pub detune: f32,
    pub attack: f32,
    /// Low-pass base cutoff; `None` follows intensity
    pub filter_base: Option<f32>,
    pub filter_var: f32,
}

impl Default for PadVoice {
    fn default() -> Self {
        Self {
            wave: Wave::Sine,
            detune: 10.0,
            attack: 0.08,
            filter_base: None,
            filter_var: 650.0,
        }
    }
}

/// Drum step lists within a 16-step bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Drums {
    pub kick: Vec<u32>,
    pub snare: Vec<u32>,
    pub hat: Vec<u32>,
    pub kick_gain: f32,
    pub snare_gain: f32,
    pub hat_gain: f32,
}

impl Default for Drums {
    fn default() -> Self {
        Self {
            kick: vec![0, 8],
            snare: vec![4, 12],
            hat: vec![2, 6, 10, 14],
            kick_gain: 0.06,
            snare_gain: 0.014,
            hat_gain: 0.009,
        }
    }
}

/// Bass degree offsets per step, `None` is a rest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BassLine {
    pub pat: Vec<Option<i32>>,
    pub gain: f32,
}

impl Default for BassLine {
    fn default() -> Self {
        Self {
            pat: Vec::new(),
            gain: 0.05,
        }
    }
}

/// Lead delay settings in [0, 1]; scaled by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeadFx {
    pub lead_delay_time: f32,
    pub lead_delay_fb: f32,
    pub lead_delay_mix: f32,
}

impl Default for LeadFx {
    fn default() -> Self {
        Self {
            lead_delay_time: 0.16,
            lead_delay_fb: 0.22,
            lead_delay_mix: 0.18,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Score {
    pub id: String,
    pub name: String,
    pub bpm: f32,
    /// Semitone offsets from the root
    pub scale: Vec<i32>,
    pub root_midi: i32,
    /// Scale degree per bar
    pub chord_prog: Vec<i32>,
    pub pad: PadVoice,
    /// Fraction of a step odd steps are delayed by
    pub swing: f32,
    pub section_bars: u32,
    pub intro_bars: u32,
    pub drums: Option<Drums>,
    pub bass: Option<BassLine>,
    pub fx: LeadFx,
    /// Note-degree patterns keyed by weapon id, plus `default`
    pub patterns: BTreeMap<String, Vec<i32>>,
}

impl Default for Score {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            bpm: 110.0,
            scale: NATURAL_MINOR.to_vec(),
            root_midi: 57,
            chord_prog: vec![0, 5, 3, 4],
            pad: PadVoice::default(),
            swing: 0.0,
            section_bars: 8,
            intro_bars: 2,
            drums: None,
            bass: None,
            fx: LeadFx::default(),
            patterns: BTreeMap::new(),
        }
    }
}

impl Score {
    /// Parse a single score from JSON
    pub fn from_json(json: &str) -> Result<Self, AudioError> {
        let mut score: Score = serde_json::from_str(json)?;
        score.sanitize();
        Ok(score)
    }

    /// Duration of one 16th-note step
    pub fn step_dur(&self) -> f64 {
        60.0 / self.bpm as f64 / 4.0
    }

    /// Scale offset for any (possibly negative) degree
    pub fn scale_at(&self, degree: i32) -> i32 {
        let n = self.scale.len() as i32;
        if n == 0 {
            return 0;
        }
        self.scale[degree.rem_euclid(n) as usize]
    }

    /// Note pattern for a weapon; laser and tesla borrow the lance line
    pub fn pattern_for(&self, weapon: WeaponId) -> &[i32] {
        let borrowed = match weapon {
            WeaponId::Laser | WeaponId::Tesla => "lance",
            other => other.key(),
        };
        self.patterns
            .get(weapon.key())
            .or_else(|| self.patterns.get(borrowed))
            .or_else(|| self.patterns.get("default"))
            .filter(|p| !p.is_empty())
            .map(Vec::as_slice)
            .unwrap_or(&FALLBACK_PATTERN)
    }

    /// Clamp values the scheduler relies on
    fn sanitize(&mut self) {
        self.bpm = if self.bpm.is_finite() { self.bpm.clamp(40.0, 240.0) } else { 110.0 };
        if self.scale.is_empty() {
            self.scale = NATURAL_MINOR.to_vec();
        }
        if self.chord_prog.is_empty() {
            self.chord_prog = vec![0];
        }
        self.swing = self.swing.clamp(0.0, 0.5);
    }
}

/// The loaded set of scores, in display order
#[derive(Debug, Clone)]
pub struct ScoreBook {
    scores: Vec<Score>,
}

impl Default for ScoreBook {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScoreBook {
    pub fn builtin() -> Self {
        Self {
            scores: vec![
                a_minor_chill(),
                dorian_float(),
                synthwave_minor(),
                pentatonic_dusk(),
                harmonic_minor_arcade(),
            ],
        }
    }

    /// Built-ins plus scores from a JSON array; same ids replace built-ins
    pub fn with_json(json: &str) -> Result<Self, AudioError> {
        let extra: Vec<Score> = serde_json::from_str(json)?;
        let mut book = Self::builtin();
        for mut score in extra {
            score.sanitize();
            match book.scores.iter_mut().find(|s| s.id == score.id) {
                Some(slot) => *slot = score,
                None => book.scores.push(score),
            }
        }
        Ok(book)
    }

    pub fn get(&self, id: &str) -> Option<&Score> {
        self.scores.iter().find(|s| s.id == id)
    }

    /// Score by id, falling back to the first one
    pub fn get_or_first(&self, id: &str) -> &Score {
        self.get(id).unwrap_or(&self.scores[0])
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scores.iter().map(|s| s.id.as_str())
    }
}

fn patterns(entries: [(&str, &[i32]); 5]) -> BTreeMap<String, Vec<i32>> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_vec()))
        .collect()
}

fn a_minor_chill() -> Score {
    Score {
        id: "a_minor_chill".into(),
        name: "A Minor (Chill)".into(),
        bpm: 96.0,
        scale: NATURAL_MINOR.to_vec(),
        root_midi: 57,
        chord_prog: vec![0, 5, 3, 4, 0, 6, 5, 4],
        pad: PadVoice {
            wave: Wave::Triangle,
            detune: 10.0,
            attack: 0.10,
            filter_base: Some(850.0),
            filter_var: 520.0,
        },
        swing: 0.08,
        drums: Some(Drums {
            kick: vec![0, 7, 8],
            snare: vec![4, 12],
            hat: vec![2, 6, 10, 14],
            ..Drums::default()
        }),
        bass: Some(BassLine {
            pat: vec![
                Some(0), None, None, Some(0), None, None, Some(4), None,
                Some(0), None, None, Some(0), None, Some(2), None, None,
            ],
            gain: 0.05,
        }),
        patterns: patterns([
            ("pistol", &[0, 2, 4, 2, 5, 4, 2, 0]),
            ("shotgun", &[0, 0, 5, 0]),
            ("lance", &[4, 2, 6, 4]),
            ("flame", &[2, 2, 3, 2, 1, 0]),
            ("default", &[0, 2, 4, 5, 4, 2]),
        ]),
        ..Score::default()
    }
}

fn dorian_float() -> Score {
    Score {
        id: "dorian_float".into(),
        name: "Dorian (Float)".into(),
        bpm: 108.0,
        scale: vec![0, 2, 3, 5, 7, 9, 10],
        root_midi: 50,
        chord_prog: vec![0, 3, 4, 6, 0, 1, 3, 6],
        pad: PadVoice {
            wave: Wave::Sine,
            detune: 14.0,
            attack: 0.12,
            filter_base: Some(1050.0),
            filter_var: 720.0,
        },
        swing: 0.12,
        drums: Some(Drums {
            kick: vec![0, 10],
            snare: vec![4, 12],
            hat: vec![2, 5, 6, 10, 13, 14],
            kick_gain: 0.055,
            ..Drums::default()
        }),
        bass: Some(BassLine {
            pat: vec![
                Some(0), None, Some(0), None, None, None, Some(3), None,
                None, None, Some(4), None, None, Some(2), None, None,
            ],
            gain: 0.045,
        }),
        fx: LeadFx {
            lead_delay_time: 0.22,
            lead_delay_fb: 0.3,
            lead_delay_mix: 0.24,
        },
        patterns: patterns([
            ("pistol", &[0, 2, 3, 5, 3, 2, 0, 6]),
            ("shotgun", &[0, 4, 0, 6]),
            ("lance", &[5, 3, 2, 0]),
            ("flame", &[2, 3, 4, 3, 2, 0]),
            ("default", &[0, 2, 3, 5, 4, 2]),
        ]),
        ..Score::default()
    }
}

fn synthwave_minor() -> Score {
    Score {
        id: "synthwave_minor".into(),
        name: "Synthwave Minor".into(),
        bpm: 120.0,
        scale: NATURAL_MINOR.to_vec(),
        root_midi: 52,
        chord_prog: vec![0, 5, 6, 4, 0, 5, 3, 4],
        pad: PadVoice {
            wave: Wave::Sawtooth,
            detune: 6.0,
            attack: 0.06,
            filter_base: Some(650.0),
            filter_var: 900.0,
        },
        drums: Some(Drums {
            kick: vec![0, 4, 8, 12],
            snare: vec![4, 12],
            hat: vec![2, 6, 10, 14],
            kick_gain: 0.065,
            snare_gain: 0.016,
            ..Drums::default()
        }),
        bass: Some(BassLine {
            pat: vec![
                Some(0), None, Some(0), None, Some(0), None, Some(0), None,
                Some(0), None, Some(0), None, Some(4), None, Some(2), None,
            ],
            gain: 0.05,
        }),
        fx: LeadFx {
            lead_delay_time: 0.3,
            lead_delay_fb: 0.35,
            lead_delay_mix: 0.28,
        },
        patterns: patterns([
            ("pistol", &[0, 2, 4, 7, 4, 2, 0, 6]),
            ("shotgun", &[0, 0, 0, 5]),
            ("lance", &[7, 6, 4, 2]),
            ("flame", &[2, 4, 5, 4, 2, 0]),
            ("default", &[0, 2, 4, 5, 4, 2]),
        ]),
        ..Score::default()
    }
}

fn pentatonic_dusk() -> Score {
    Score {
        id: "pentatonic_dusk".into(),
        name: "Pentatonic (Dusk)".into(),
        bpm: 100.0,
        scale: vec![0, 3, 5, 7, 10],
        root_midi: 45,
        chord_prog: vec![0, 3, 4, 0, 0, 4, 3, 0],
        pad: PadVoice {
            wave: Wave::Triangle,
            detune: 8.0,
            attack: 0.08,
            filter_base: Some(780.0),
            filter_var: 500.0,
        },
        swing: 0.1,
        drums: Some(Drums {
            kick: vec![0, 6, 11],
            snare: vec![8],
            hat: vec![4, 12],
            kick_gain: 0.05,
            ..Drums::default()
        }),
        bass: Some(BassLine {
            pat: vec![
                Some(0), None, None, None, None, None, Some(2), None,
                None, None, Some(3), None, None, None, None, None,
            ],
            gain: 0.05,
        }),
        patterns: patterns([
            ("pistol", &[0, 1, 2, 3, 2, 1, 4, 2]),
            ("shotgun", &[0, 0, 3, 0]),
            ("lance", &[3, 2, 1, 0]),
            ("flame", &[1, 2, 3, 2, 1, 0]),
            ("default", &[0, 1, 2, 3, 2, 1]),
        ]),
        ..Score::default()
    }
}

fn harmonic_minor_arcade() -> Score {
    Score {
        id: "harmonic_minor_arcade".into(),
        name: "Harmonic Minor (Arcade)".into(),
        bpm: 112.0,
        scale: vec![0, 2, 3, 5, 7, 8, 11],
        root_midi: 55,
        chord_prog: vec![0, 5, 3, 4, 0, 6, 5, 4],
        pad: PadVoice {
            wave: Wave::Sawtooth,
            detune: 4.0,
            attack: 0.05,
            filter_base: Some(720.0),
            filter_var: 980.0,
        },
        drums: Some(Drums {
            kick: vec![0, 3, 8, 11],
            snare: vec![4, 12],
            hat: vec![0, 2, 4, 6, 8, 10, 12, 14],
            hat_gain: 0.008,
            ..Drums::default()
        }),
        bass: Some(BassLine {
            pat: vec![
                Some(0), None, Some(4), None, Some(0), None, Some(4), None,
                Some(0), None, Some(4), None, Some(6), None, Some(4), None,
            ],
            gain: 0.05,
        }),
        fx: LeadFx {
            lead_delay_time: 0.12,
            lead_delay_fb: 0.18,
            lead_delay_mix: 0.16,
        },
        patterns: patterns([
            ("pistol", &[0, 2, 4, 2, 6, 4, 2, 0]),
            ("shotgun", &[0, 6, 0, 4]),
            ("lance", &[6, 4, 2, 0]),
            ("flame", &[2, 3, 4, 3, 2, 0]),
            ("default", &[0, 2, 4, 6, 4, 2]),
        ]),
        ..Score::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_ids_in_order() {
        let book = ScoreBook::builtin();
        let ids: Vec<&str> = book.ids().collect();
        assert_eq!(ids, SCORE_IDS);
        for id in SCORE_IDS {
            let score = book.get_or_first(id);
            assert_eq!(score.section_bars, 8);
            assert_eq!(score.intro_bars, 2);
            let bass = score.bass.as_ref().unwrap();
            assert_eq!(bass.pat.len(), 16);
        }
    }

    #[test]
    fn test_unknown_score_falls_back_to_first() {
        let book = ScoreBook::builtin();
        assert_eq!(book.get_or_first("nope").id, "a_minor_chill");
    }

    #[test]
    fn test_pattern_fallbacks() {
        let book = ScoreBook::builtin();
        let score = book.get_or_first("synthwave_minor");
        assert_eq!(score.pattern_for(WeaponId::Pistol), &[0, 2, 4, 7, 4, 2, 0, 6]);
        assert_eq!(score.pattern_for(WeaponId::Tesla), &[7, 6, 4, 2]);
        assert_eq!(score.pattern_for(WeaponId::Mine), &[0, 2, 4, 5, 4, 2]);

        let bare = Score::default();
        assert_eq!(bare.pattern_for(WeaponId::Pistol), &FALLBACK_PATTERN);
    }

    #[test]
    fn test_json_score_uses_defaults() {
        let score = Score::from_json(r#"{"id":"tiny","bpm":90,"bass":{"pat":[0,null,2]}}"#).unwrap();
        assert_eq!(score.bpm, 90.0);
        assert_eq!(score.root_midi, 57);
        assert_eq!(score.chord_prog, vec![0, 5, 3, 4]);
        assert_eq!(score.bass.as_ref().unwrap().pat, vec![Some(0), None, Some(2)]);
        assert!((score.step_dur() - 60.0 / 90.0 / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_sanitizes_and_replaces() {
        let book = ScoreBook::with_json(
            r#"[{"id":"a_minor_chill","bpm":1000,"scale":[]},{"id":"extra"}]"#,
        )
        .unwrap();
        let replaced = book.get("a_minor_chill").unwrap();
        assert_eq!(replaced.bpm, 240.0);
        assert_eq!(replaced.scale, NATURAL_MINOR.to_vec());
        assert!(book.get("extra").is_some());
        assert_eq!(book.ids().count(), 6);

        assert!(Score::from_json("{not json").is_err());
    }

    #[test]
    fn test_scale_wraps_negative_degrees() {
        let score = Score::default();
        assert_eq!(score.scale_at(-1), 10);
        assert_eq!(score.scale_at(7), 0);
    }
}
