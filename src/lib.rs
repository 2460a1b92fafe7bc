//! # Schemsim Core
//!
//! The compile-and-link core of a schematic circuit simulator.
//!
//! This library provides:
//! - Net extraction from placed components and wires
//! - Compilation of the schematic into SPICE-like netlist text with a line map
//! - Resolution of measurement probes into the signals they observe
//! - Bidirectional linking of simulator signals to schematic elements and
//!   netlist text, driving selection and hover highlighting
//!
//! ## Architecture
//!
//! - [`schematic`] - Schematic model and net graph
//! - [`signal`] - Canonical signal tokens and the spelling codec
//! - [`netlist`] - Netlist compiler, analysis directives and text lexer
//! - [`probe`] - Probe resolution
//! - [`link`] - Trace link index, highlight coordination, series ordering
//! - [`engine`] - The engine context and debounced run scheduling
//!
//! ## Pipeline
//!
//! On every model change:
//!
//! 1. Build the net graph (union-find over grid points)
//! 2. Compile element lines, the analysis directive and `.end`
//! 3. Resolve probes against the compiled nets
//! 4. Drop the trace link index; it is rebuilt on first use
//! 5. Arm the run debounce; the run is skipped if its signature is unchanged
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! schemsim divider.json --analysis tran --config analysis.json --probes
//! ```
//!
//! ### WASM
//!
//! ```javascript
//! import { WasmEngine } from 'schemsim_core';
//!
//! const engine = new WasmEngine();
//! engine.set_model(modelJson, performance.now());
//! const netlist = engine.netlist_text();
//! ```

pub mod engine;
pub mod error;
pub mod link;
pub mod netlist;
pub mod probe;
pub mod schematic;
pub mod signal;

// Re-export main types for convenience
pub use engine::{Engine, EngineConfig, SimulationRequest};
pub use error::{Result, SchemError};
pub use netlist::{compile, AnalysisConfig, AnalysisKind, CompileOutput};
pub use probe::{resolve_probes, ProbeDescriptor, ProbeResolution};
pub use schematic::{NetGraph, SchematicModel};
pub use signal::SignalToken;

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmEngine;
