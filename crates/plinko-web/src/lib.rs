//! Browser bindings. `wasm-bindgen` cannot export a stateful struct with a
//! borrowing API, so one [`SessionRunner`] lives in a `thread_local!` and the
//! exports below forward to it, exchanging JSON strings.

pub mod runner;

use std::cell::RefCell;

use glam::Vec2;
use wasm_bindgen::prelude::*;

use plinko_engine::{GameConfig, PlayerRegistration};

pub use runner::{RunnerError, RunnerEvent, SessionRunner, SessionView};

thread_local! {
    static RUNNER: RefCell<Option<SessionRunner>> = const { RefCell::new(None) };
}

fn to_js(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn with_runner<R>(
    f: impl FnOnce(&mut SessionRunner) -> Result<R, RunnerError>,
) -> Result<R, JsValue> {
    RUNNER.with(|cell| {
        let mut borrow = cell.borrow_mut();
        let runner = borrow
            .as_mut()
            .ok_or_else(|| JsValue::from_str("not initialized; call plinko_init() first"))?;
        f(runner).map_err(to_js)
    })
}

fn json<T: serde::Serialize>(value: &T) -> Result<String, RunnerError> {
    Ok(serde_json::to_string(value)?)
}

/// Build the board. An empty string uses the default configuration.
#[wasm_bindgen]
pub fn plinko_init(config_json: &str) -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let config = if config_json.trim().is_empty() {
        GameConfig::default()
    } else {
        GameConfig::from_json(config_json).map_err(to_js)?
    };
    let runner = SessionRunner::new(config).map_err(to_js)?;
    RUNNER.with(|cell| {
        *cell.borrow_mut() = Some(runner);
    });
    log::info!("plinko: initialized");
    Ok(())
}

/// `registrations_json`: `[{"name": "...", "style": {"color": 16711680, "pattern": "striped"}}]`.
#[wasm_bindgen]
pub fn plinko_start(registrations_json: &str) -> Result<String, JsValue> {
    let registrations: Vec<PlayerRegistration> =
        serde_json::from_str(registrations_json).map_err(to_js)?;
    with_runner(|r| json(&r.start(registrations)?))
}

/// Returns the new puck id.
#[wasm_bindgen]
pub fn plinko_drop(x: f32) -> Result<u32, JsValue> {
    with_runner(|r| r.drop_puck(x).map(|id| id.0))
}

#[wasm_bindgen]
pub fn plinko_shove(dx: f32, dy: f32) -> Result<bool, JsValue> {
    with_runner(|r| Ok(r.shove(Vec2::new(dx, dy))))
}

/// Advance by frame time in seconds. Returns the events as a JSON array.
#[wasm_bindgen]
pub fn plinko_tick(dt: f32) -> Result<String, JsValue> {
    with_runner(|r| json(&r.tick(dt)?))
}

#[wasm_bindgen]
pub fn plinko_alpha() -> Result<f32, JsValue> {
    with_runner(|r| Ok(r.alpha()))
}

#[wasm_bindgen]
pub fn plinko_snapshot() -> Result<String, JsValue> {
    with_runner(|r| json(&r.snapshot()))
}

#[wasm_bindgen]
pub fn plinko_board() -> Result<String, JsValue> {
    with_runner(|r| json(&r.board()))
}

#[wasm_bindgen]
pub fn plinko_session() -> Result<String, JsValue> {
    with_runner(|r| json(&r.session_view()))
}

#[wasm_bindgen]
pub fn plinko_replay() -> Result<String, JsValue> {
    with_runner(|r| json(&r.replay()?))
}

#[wasm_bindgen]
pub fn plinko_reset() -> Result<(), JsValue> {
    with_runner(|r| {
        r.reset();
        Ok(())
    })
}
