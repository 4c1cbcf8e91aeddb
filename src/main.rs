//! ASCII Survivors entry point
//!
//! The browser build is a library (`web::WebGame`); this binary is a native
//! headless runner that plays a seeded bot and logs the outcome.
//!
//! Usage: `ascii-survivors [seed] [seconds]`

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use ascii_survivors::audio::{AudioMode, NullSynth};
    use ascii_survivors::consts::SIM_DT;
    use ascii_survivors::persistence::{MemoryStore, SignedStore};
    use ascii_survivors::sim::stats::format_time_mmss;
    use ascii_survivors::sim::{GamePhase, GameState, TickInput};
    use ascii_survivors::{Session, dir_or_x, rotate};
    use glam::Vec2;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    const DEFAULT_SEED: u64 = 1;
    const DEFAULT_SECONDS: f32 = 180.0;
    const KITE_RANGE: f32 = 140.0;

    /// Kite away from the nearest enemy, otherwise drift in a slow circle
    fn steer(state: &GameState) -> Vec2 {
        let p = state.player.pos;
        let nearest = state
            .enemies
            .iter()
            .map(|e| e.pos)
            .min_by(|a, b| a.distance_squared(p).total_cmp(&b.distance_squared(p)));
        match nearest {
            Some(e) if e.distance(p) < KITE_RANGE => {
                // Sidestep a little so the bot does not back into walls head-on
                rotate(dir_or_x(p - e), 0.6)
            }
            _ => Vec2::from_angle(state.time * 0.35),
        }
    }

    pub fn run() {
        let mut args = std::env::args().skip(1);
        let seed = args
            .next()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SEED);
        let seconds = args
            .next()
            .and_then(|s| s.parse::<f32>().ok())
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(DEFAULT_SECONDS);

        log::info!("headless run: seed={seed} for {seconds}s");
        let store = SignedStore::open(MemoryStore::new(), &mut Pcg32::seed_from_u64(seed));
        let mut session = Session::new(store, NullSynth::new(), seed);
        session.audio.set_mode(AudioMode::Music);
        session.audio.unlock();
        session.state.start();

        let max_ticks = (seconds / SIM_DT).ceil() as u64;
        let mut ticks = 0u64;
        while ticks < max_ticks {
            match session.state.phase {
                GamePhase::Upgrade => session.choose_upgrade(0),
                GamePhase::GameOver => break,
                _ => {}
            }
            let input = TickInput {
                move_dir: steer(&session.state),
                dash: session.state.enemies.len() > 40,
                ..TickInput::default()
            };
            session.step(&input, SIM_DT);
            session.audio.synth_mut().advance(SIM_DT as f64);
            session.audio.pump();
            ticks += 1;
        }

        let state = &session.state;
        let weapons: Vec<String> = state
            .player
            .weapons
            .iter()
            .map(|w| format!("{}:{}", w.id.key(), w.level))
            .collect();
        log::info!(
            "finished: phase={:?} time={} wave={} kills={} level={} hp={:.0}/{:.0}",
            state.phase,
            format_time_mmss(state.time),
            state.waves.wave,
            state.kills,
            state.player.level,
            state.player.hp,
            state.player.hp_max
        );
        log::info!("weapons: {}", weapons.join(" "));
        log::info!(
            "audio: {} voices, {} notes scheduled",
            session.audio.synth().voices(),
            session.audio.debug().limiter.notes_scheduled
        );
        let hs = session.high_score();
        log::info!("best: kills={} wave={}", hs.best_kills, hs.best_wave);
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("ASCII Survivors (native) starting...");
    headless::run();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is web::WebGame, this is just to satisfy the compiler
}
