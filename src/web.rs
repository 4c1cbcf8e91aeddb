//! Browser entry
//!
//! A JS host owns the canvas. It calls [`WebGame::frame`] from its animation
//! loop and renders [`WebGame::snapshot`]. Keyboard, visibility, focus and the
//! music pump timer are wired here.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Document, KeyboardEvent, Window};

use crate::audio::{NullSynth, PUMP_INTERVAL_MS, Synth, WebSynth};
use crate::persistence::{KeyValueStore, LocalStore, MemoryStore, SignedStore};
use crate::session::Session;
use crate::settings::Settings;

type WebSession = Session<Box<dyn KeyValueStore>, Box<dyn Synth>>;

fn open_store() -> Box<dyn KeyValueStore> {
    match LocalStore::open() {
        Ok(store) => Box::new(store),
        Err(e) => {
            log::warn!("localStorage unavailable, progress will not persist: {e}");
            Box::new(MemoryStore::new())
        }
    }
}

fn open_synth() -> Box<dyn Synth> {
    match WebSynth::new() {
        Ok(synth) => Box::new(synth),
        Err(e) => {
            log::warn!("audio disabled: {e}");
            Box::new(NullSynth::new())
        }
    }
}

fn init_logging() {
    console_error_panic_hook::set_once();
    // A second WebGame must not fail on an already-installed logger
    if console_log::init_with_level(log::Level::Info).is_ok() {
        log::info!("ASCII Survivors starting...");
    }
}

#[wasm_bindgen]
pub struct WebGame {
    session: Rc<RefCell<WebSession>>,
}

#[wasm_bindgen]
impl WebGame {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<WebGame, JsValue> {
        init_logging();
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let seed = (js_sys::Math::random() * u32::MAX as f64) as u64;
        let store = SignedStore::open(open_store(), &mut rand::rng());
        let session = Rc::new(RefCell::new(Session::new(store, open_synth(), seed)));
        log::info!("session ready (seed {seed})");

        setup_keyboard(&window, session.clone());
        setup_auto_pause(&window, &document, session.clone());
        setup_music_pump(&window, session.clone())?;

        Ok(WebGame { session })
    }

    /// Advance one animation frame; `now_ms` is the rAF timestamp
    pub fn frame(&self, now_ms: f64) {
        self.session.borrow_mut().frame(now_ms);
    }

    /// Touch joystick axis, each component in [-1, 1]
    pub fn joystick(&self, active: bool, x: f32, y: f32) {
        self.session
            .borrow_mut()
            .input
            .set_joystick(active, Vec2::new(x, y));
    }

    pub fn dash(&self) {
        self.session.borrow_mut().input.request_dash();
    }

    pub fn start(&self) {
        let mut s = self.session.borrow_mut();
        s.audio.unlock();
        s.state.start();
    }

    pub fn restart(&self) {
        let mut s = self.session.borrow_mut();
        s.audio.unlock();
        s.restart();
    }

    pub fn toggle_pause(&self) {
        self.session.borrow_mut().state.toggle_pause();
    }

    pub fn choose_upgrade(&self, index: usize) {
        self.session.borrow_mut().choose_upgrade(index);
    }

    pub fn set_viewport(&self, w: f32, h: f32) {
        self.session.borrow_mut().set_viewport(w, h);
    }

    /// Must run inside a user gesture handler
    pub fn unlock_audio(&self) -> bool {
        self.session.borrow_mut().audio.unlock()
    }

    /// Game state plus best run, as JSON
    pub fn snapshot(&self) -> Result<String, JsValue> {
        self.session
            .borrow()
            .snapshot_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn audio_debug(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.borrow().audio.debug())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    pub fn settings(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.session.borrow().settings())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Accepts a partial settings object; missing fields take defaults
    pub fn set_settings(&self, json: &str) -> Result<(), JsValue> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        self.session.borrow_mut().update_settings(settings);
        Ok(())
    }

    pub fn score_ids(&self) -> Vec<String> {
        self.session
            .borrow()
            .audio
            .score_ids()
            .map(str::to_string)
            .collect()
    }

    /// Glyph of the world tile at cell `(cx, cy)`
    pub fn tile_glyph(&self, cx: i32, cy: i32) -> String {
        self.session
            .borrow()
            .state
            .world
            .sample(cx, cy)
            .glyph
            .to_string()
    }

    /// Stop audio and release the context
    pub fn teardown(&self) {
        let mut s = self.session.borrow_mut();
        s.audio.teardown();
        log::info!("audio torn down");
    }
}

fn setup_keyboard(window: &Window, session: Rc<RefCell<WebSession>>) {
    {
        let session = session.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            let consumed = session
                .borrow_mut()
                .input
                .key_down(&event.code(), &event.key());
            if consumed {
                event.prevent_default();
            }
        });
        let _ = window.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
        closure.forget();
    }
    {
        let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
            session.borrow_mut().input.key_up(&event.code(), &event.key());
        });
        let _ = window.add_event_listener_with_callback("keyup", closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

fn setup_auto_pause(window: &Window, document: &Document, session: Rc<RefCell<WebSession>>) {
    // Visibility change (tab switch, minimize)
    {
        let session = session.clone();
        let doc = document.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let visible = doc.visibility_state() != web_sys::VisibilityState::Hidden;
            session.borrow_mut().set_visible(visible);
        });
        let _ = document
            .add_event_listener_with_callback("visibilitychange", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    // Window blur (click outside) and refocus
    for (name, focused) in [("blur", false), ("focus", true)] {
        let session = session.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            session.borrow_mut().set_focused(focused);
        });
        let _ = window.add_event_listener_with_callback(name, closure.as_ref().unchecked_ref());
        closure.forget();
    }
}

/// The scheduler keeps its own lookahead, so a coarse timer is enough
fn setup_music_pump(window: &Window, session: Rc<RefCell<WebSession>>) -> Result<(), JsValue> {
    let closure = Closure::<dyn FnMut()>::new(move || {
        // Skip the beat rather than contend with a frame in progress
        if let Ok(mut s) = session.try_borrow_mut() {
            s.audio.pump();
        }
    });
    window.set_interval_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        PUMP_INTERVAL_MS as i32,
    )?;
    closure.forget();
    Ok(())
}
