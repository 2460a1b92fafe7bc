//! WASM bindings for Schemsim Core.
//!
//! This module provides JavaScript-friendly bindings for the schematic
//! editor running in a browser. Payloads cross the boundary as JSON
//! strings; times are milliseconds from `performance.now()`.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmEngine } from 'schemsim_core';
//!
//! await init();
//!
//! const engine = new WasmEngine();
//! engine.set_analysis('tran', performance.now());
//! engine.set_model(JSON.stringify(model), performance.now());
//!
//! // From a timer or animation frame:
//! const request = engine.poll_run(performance.now());
//! if (request) worker.postMessage(JSON.parse(request));
//!
//! // Plot trace clicked:
//! engine.click_signals('plot', ['V(out)'], event.shiftKey, event.ctrlKey, event.metaKey);
//! const highlight = JSON.parse(engine.highlight());
//! ```

use std::time::Duration;

use wasm_bindgen::prelude::*;

use crate::engine::{Engine, EngineConfig};
use crate::error::SchemError;
use crate::link::{ClickModifiers, HighlightSource, TargetIds};
use crate::netlist::{AnalysisConfig, AnalysisKind};
use crate::schematic::SchematicModel;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(e: SchemError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|source| js_error(SchemError::Encode { source }))
}

fn millis(ms: f64) -> Duration {
    Duration::from_secs_f64(ms.max(0.0) / 1000.0)
}

fn source(name: &str) -> Result<HighlightSource, JsValue> {
    match name {
        "schematic" => Ok(HighlightSource::Schematic),
        "plot" => Ok(HighlightSource::Plot),
        "table" => Ok(HighlightSource::Table),
        other => Err(js_error(SchemError::WasmError {
            message: format!("unknown highlight source '{other}'"),
        })),
    }
}

/// WASM-compatible engine context.
///
/// Wraps the native [`Engine`]; one instance per open schematic.
#[wasm_bindgen]
pub struct WasmEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl WasmEngine {
    /// Create an engine with default debounce delays and colours.
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmEngine {
        WasmEngine {
            engine: Engine::new(EngineConfig::default()),
        }
    }

    /// Create an engine with custom debounce delays (milliseconds).
    #[wasm_bindgen]
    pub fn with_config(run_debounce_ms: f64, autosave_debounce_ms: f64) -> WasmEngine {
        let config = EngineConfig::new()
            .with_run_debounce(millis(run_debounce_ms))
            .with_autosave_debounce(millis(autosave_debounce_ms));
        WasmEngine {
            engine: Engine::new(config),
        }
    }

    /// Load the schematic model from its JSON form and recompile.
    #[wasm_bindgen]
    pub fn set_model(&mut self, model_json: &str, now_ms: f64) -> Result<(), JsValue> {
        let model = SchematicModel::from_json(model_json).map_err(js_error)?;
        self.engine.set_model(model, millis(now_ms));
        Ok(())
    }

    /// Select the analysis kind (`op`, `dc`, `tran`, `ac`).
    #[wasm_bindgen]
    pub fn set_analysis(&mut self, kind: &str, now_ms: f64) -> Result<(), JsValue> {
        let kind: AnalysisKind = kind.parse().map_err(js_error)?;
        self.engine.set_analysis(kind, millis(now_ms));
        Ok(())
    }

    /// Replace the analysis settings from JSON.
    #[wasm_bindgen]
    pub fn set_analysis_config(&mut self, config_json: &str, now_ms: f64) -> Result<(), JsValue> {
        let config = AnalysisConfig::from_json(config_json).map_err(js_error)?;
        self.engine.set_analysis_config(config, millis(now_ms));
        Ok(())
    }

    #[wasm_bindgen]
    pub fn set_preamble(&mut self, preamble: &str, now_ms: f64) {
        self.engine.set_preamble(preamble, millis(now_ms));
    }

    /// Restrict the saved signals; an empty array restores the default.
    #[wasm_bindgen]
    pub fn set_save_restriction(&mut self, signals: Vec<String>, now_ms: f64) {
        let signals: Vec<&str> = signals.iter().map(String::as_str).collect();
        self.engine.set_save_restriction(&signals, millis(now_ms));
    }

    /// Notify the engine that the model it holds was edited.
    #[wasm_bindgen]
    pub fn model_changed(&mut self, now_ms: f64) {
        self.engine.model_changed(millis(now_ms));
    }

    /// The compiled netlist text.
    #[wasm_bindgen]
    pub fn netlist_text(&self) -> Result<String, JsValue> {
        Ok(self.engine.compiled().map_err(js_error)?.netlist_text.clone())
    }

    /// The full compile output as JSON.
    #[wasm_bindgen]
    pub fn compile_output(&self) -> Result<String, JsValue> {
        to_json(self.engine.compiled().map_err(js_error)?)
    }

    /// The line map as JSON.
    #[wasm_bindgen]
    pub fn line_map(&self) -> Result<String, JsValue> {
        to_json(&self.engine.compiled().map_err(js_error)?.line_map)
    }

    /// Probe descriptors and save signals as JSON.
    #[wasm_bindgen]
    pub fn probes(&self) -> Result<String, JsValue> {
        to_json(self.engine.probes())
    }

    /// The simulator request as JSON, once the run debounce has elapsed and
    /// the request differs from the last one; `undefined` otherwise.
    #[wasm_bindgen]
    pub fn poll_run(&mut self, now_ms: f64) -> Result<Option<String>, JsValue> {
        self.engine
            .poll_run(millis(now_ms))
            .map(|request| to_json(&request))
            .transpose()
    }

    /// Check whether the autosave debounce has elapsed.
    #[wasm_bindgen]
    pub fn poll_autosave(&mut self, now_ms: f64) -> bool {
        self.engine.poll_autosave(millis(now_ms))
    }

    /// Ordered series (token, name, label) for result traces, as JSON.
    #[wasm_bindgen]
    pub fn series(&self, trace_names: Vec<String>) -> Result<String, JsValue> {
        let names: Vec<&str> = trace_names.iter().map(String::as_str).collect();
        to_json(&self.engine.series(&names))
    }

    /// A plot trace or table row was clicked.
    #[wasm_bindgen]
    pub fn click_signals(
        &mut self,
        from: &str,
        signals: Vec<String>,
        shift: bool,
        ctrl: bool,
        meta: bool,
    ) -> Result<(), JsValue> {
        let names: Vec<&str> = signals.iter().map(String::as_str).collect();
        let modifiers = ClickModifiers { shift, ctrl, meta };
        self.engine.click_signals(source(from)?, &names, modifiers);
        Ok(())
    }

    /// A plot trace or table row is hovered; an empty array ends the hover.
    #[wasm_bindgen]
    pub fn hover_signals(&mut self, from: &str, signals: Vec<String>) -> Result<(), JsValue> {
        let names: Vec<&str> = signals.iter().map(String::as_str).collect();
        self.engine.hover_signals(source(from)?, &names);
        Ok(())
    }

    /// Components or wires were clicked on the canvas.
    #[wasm_bindgen]
    pub fn select_schematic(
        &mut self,
        component_ids: Vec<String>,
        wire_ids: Vec<String>,
        shift: bool,
        ctrl: bool,
        meta: bool,
    ) -> Result<(), JsValue> {
        let targets = TargetIds {
            component_ids: component_ids.into_iter().collect(),
            wire_ids: wire_ids.into_iter().collect(),
        };
        let modifiers = ClickModifiers { shift, ctrl, meta };
        self.engine
            .select_schematic(&targets, modifiers)
            .map_err(js_error)
    }

    /// Components or wires are hovered on the canvas.
    #[wasm_bindgen]
    pub fn hover_schematic(
        &mut self,
        component_ids: Vec<String>,
        wire_ids: Vec<String>,
    ) -> Result<(), JsValue> {
        let targets = TargetIds {
            component_ids: component_ids.into_iter().collect(),
            wire_ids: wire_ids.into_iter().collect(),
        };
        self.engine.hover_schematic(&targets).map_err(js_error)
    }

    #[wasm_bindgen]
    pub fn clear_selection(&mut self) {
        self.engine.clear_selection();
    }

    #[wasm_bindgen]
    pub fn clear_hover(&mut self) {
        self.engine.clear_hover();
    }

    /// Clear all highlight state.
    #[wasm_bindgen]
    pub fn reset(&mut self) {
        self.engine.reset();
    }

    /// The merged highlight payload as JSON.
    #[wasm_bindgen]
    pub fn highlight(&mut self) -> Result<String, JsValue> {
        to_json(&self.engine.highlight().map_err(js_error)?)
    }

    /// The netlist text highlight (lines and spans) as JSON.
    #[wasm_bindgen]
    pub fn netlist_highlight(&mut self) -> Result<String, JsValue> {
        to_json(&self.engine.netlist_highlight().map_err(js_error)?)
    }
}

impl Default for WasmEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
