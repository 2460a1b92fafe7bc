//! The engine context.
//!
//! [`Engine`] owns everything derived from one schematic: the compile
//! output, the probe resolution, the cached [`TraceLinkIndex`], the
//! highlight state and the run schedulers. Every operation goes through it;
//! there is no module-level state.
//!
//! ## Usage
//!
//! ```
//! use std::time::Duration;
//! use schemsim_core::engine::{Engine, EngineConfig};
//! use schemsim_core::schematic::{Component, ComponentType, SchematicModel, Wire};
//!
//! let model = SchematicModel::new(
//!     vec![
//!         Component::new("V1", ComponentType::VoltageSource, "5")
//!             .with_pin("p", 0.0, 0.0)
//!             .with_pin("n", 0.0, 4.0),
//!         Component::new("R1", ComponentType::Resistor, "1k")
//!             .with_pin("1", 4.0, 0.0)
//!             .with_pin("2", 4.0, 4.0),
//!         Component::new("G1", ComponentType::Ground, "").with_pin("1", 0.0, 4.0),
//!     ],
//!     vec![
//!         Wire::new("w1", &[(0.0, 0.0), (4.0, 0.0)]),
//!         Wire::new("w2", &[(0.0, 4.0), (4.0, 4.0)]),
//!     ],
//! );
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! engine.set_model(model, Duration::ZERO);
//! assert_eq!(engine.compiled().unwrap().netlist_text, "V1 n1 0 5\nR1 n1 0 1k\n.op\n.end\n");
//!
//! let request = engine.poll_run(Duration::from_millis(250)).unwrap();
//! assert_eq!(request.netlist, "V1 n1 0 5\nR1 n1 0 1k\n.op\n.end\n");
//! ```

mod schedule;

pub use schedule::{Debouncer, RunScheduler, RunSignature, SimulationRequest};

use std::time::Duration;

use crate::error::{Result, SchemError};
use crate::link::{
    highlight_netlist, order_series, ClickModifiers, HighlightCoordinator, HighlightSource,
    MergedHighlight, NetlistHighlight, Series, TargetIds, TraceLinkIndex,
};
use crate::netlist::{compile, AnalysisConfig, AnalysisKind, CompileOutput};
use crate::probe::{ProbeResolution, ProbeResolver, SNAP_TOLERANCE};
use crate::schematic::{ComponentType, SchematicModel};
use crate::signal::{encode_all, SignalToken};

/// Default delay between the last edit and a simulator run.
pub const DEFAULT_RUN_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default delay between the last edit and an autosave.
pub const DEFAULT_AUTOSAVE_DEBOUNCE: Duration = Duration::from_millis(350);

/// Default colour of selected elements.
pub const DEFAULT_SELECTION_COLOR: &str = "#f59e0b";

/// Default colour of hovered elements.
pub const DEFAULT_HOVER_COLOR: &str = "#38bdf8";

/// Configuration for the engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet period before a simulator run.
    pub run_debounce: Duration,
    /// Quiet period before an autosave.
    pub autosave_debounce: Duration,
    /// Probe target snap tolerance (squared grid units).
    pub snap_tolerance: f64,
    pub selection_color: String,
    pub hover_color: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            run_debounce: DEFAULT_RUN_DEBOUNCE,
            autosave_debounce: DEFAULT_AUTOSAVE_DEBOUNCE,
            snap_tolerance: SNAP_TOLERANCE,
            selection_color: DEFAULT_SELECTION_COLOR.to_string(),
            hover_color: DEFAULT_HOVER_COLOR.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulator run debounce.
    pub fn with_run_debounce(mut self, delay: Duration) -> Self {
        self.run_debounce = delay;
        self
    }

    /// Set the autosave debounce.
    pub fn with_autosave_debounce(mut self, delay: Duration) -> Self {
        self.autosave_debounce = delay;
        self
    }

    /// Set the probe snap tolerance (squared grid units).
    ///
    /// A current or power probe further than this from every component
    /// midpoint has no target.
    pub fn with_snap_tolerance(mut self, tolerance: f64) -> Self {
        self.snap_tolerance = tolerance;
        self
    }

    /// Set the selection and hover colours.
    pub fn with_colors(mut self, selection: impl Into<String>, hover: impl Into<String>) -> Self {
        self.selection_color = selection.into();
        self.hover_color = hover.into();
        self
    }
}

/// The schematic engine context.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
    model: SchematicModel,
    analysis: AnalysisKind,
    analysis_config: AnalysisConfig,
    preamble: String,
    /// User restriction of the saved signals; empty means "probe signals"
    save_restriction: Vec<SignalToken>,
    compiled: Option<CompileOutput>,
    probes: ProbeResolution,
    /// Cached index, dropped on every change
    index: Option<TraceLinkIndex>,
    highlight: HighlightCoordinator,
    runs: RunScheduler,
    autosave: Debouncer,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    /// Create an engine with an empty schematic.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            highlight: HighlightCoordinator::new(
                config.selection_color.clone(),
                config.hover_color.clone(),
            ),
            runs: RunScheduler::new(config.run_debounce),
            autosave: Debouncer::new(config.autosave_debounce),
            config,
            model: SchematicModel::default(),
            analysis: AnalysisKind::Op,
            analysis_config: AnalysisConfig::default(),
            preamble: String::new(),
            save_restriction: Vec::new(),
            compiled: None,
            probes: ProbeResolution::default(),
            index: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &SchematicModel {
        &self.model
    }

    pub fn analysis(&self) -> AnalysisKind {
        self.analysis
    }

    pub fn analysis_config(&self) -> &AnalysisConfig {
        &self.analysis_config
    }

    /// Replace the schematic and react as to an edit. Highlight state of
    /// the previous model is dropped.
    pub fn set_model(&mut self, model: SchematicModel, now: Duration) {
        self.model = model;
        self.highlight.reset();
        self.model_changed(now);
    }

    /// Switch the active analysis.
    pub fn set_analysis(&mut self, kind: AnalysisKind, now: Duration) {
        self.analysis = kind;
        self.settings_changed(now);
    }

    /// Replace the analysis settings.
    pub fn set_analysis_config(&mut self, config: AnalysisConfig, now: Duration) {
        self.analysis_config = config;
        self.settings_changed(now);
    }

    /// Replace the user preamble placed before the element lines.
    pub fn set_preamble(&mut self, preamble: impl Into<String>, now: Duration) {
        self.preamble = preamble.into();
        self.settings_changed(now);
    }

    /// Settings given before the first compile are only stored.
    fn settings_changed(&mut self, now: Duration) {
        if self.compiled.is_some() {
            self.model_changed(now);
        }
    }

    /// Restrict the saved signals to a user list; an empty list restores the
    /// probe-driven default.
    pub fn set_save_restriction(&mut self, signals: &[&str], now: Duration) {
        self.save_restriction = encode_all(signals.iter().copied());
        self.runs.trigger(now);
    }

    /// The model, analysis or preamble changed.
    ///
    /// Recompiles, re-resolves probes, drops the index and arms both the
    /// run and the autosave debounce.
    pub fn model_changed(&mut self, now: Duration) {
        self.compile();
        self.runs.trigger(now);
        self.autosave.trigger(now);
    }

    /// Compile the current model and resolve its probes.
    pub fn compile(&mut self) -> &CompileOutput {
        self.invalidate();
        let output = compile(
            &self.model,
            self.analysis,
            &self.analysis_config,
            &self.preamble,
        );
        self.probes = ProbeResolver::new()
            .with_snap_tolerance(self.config.snap_tolerance)
            .resolve(&self.model, &output);
        self.compiled.insert(output)
    }

    /// The last compile output.
    pub fn compiled(&self) -> Result<&CompileOutput> {
        self.compiled.as_ref().ok_or(SchemError::NotCompiled)
    }

    pub fn probes(&self) -> &ProbeResolution {
        &self.probes
    }

    /// Drop the cached index; the next access rebuilds it.
    pub fn invalidate(&mut self) {
        self.index = None;
    }

    /// Build the index now, replacing any cached one.
    pub fn rebuild(&mut self) -> Result<&TraceLinkIndex> {
        let compiled = self.compiled.as_ref().ok_or(SchemError::NotCompiled)?;
        let index = TraceLinkIndex::build(&self.model, compiled, &self.probes);
        Ok(&*self.index.insert(index))
    }

    /// The index, built if missing.
    pub fn ensure_index(&mut self) -> Result<&TraceLinkIndex> {
        if self.index.is_none() {
            self.rebuild()?;
        }
        self.index.as_ref().ok_or(SchemError::NotCompiled)
    }

    /// Signals the simulator is asked to save.
    pub fn save_signals(&self) -> &[SignalToken] {
        if self.save_restriction.is_empty() {
            &self.probes.save_signals
        } else {
            &self.save_restriction
        }
    }

    /// Simulator spelling of a signal. Currents are spelled from the
    /// element name: `i(x)` for elements with a branch (sources, switches,
    /// ammeters), the device accessor `@x[i]` for the rest.
    pub fn simulator_signal(&self, token: &SignalToken) -> String {
        let SignalToken::Current(target) = token else {
            return token.simulator_name(false);
        };
        let line = self
            .compiled
            .as_ref()
            .and_then(|c| c.line_for_current(target));
        match line {
            Some((_, line)) => SignalToken::current(&line.netlist_id)
                .simulator_name(!line.kind.has_branch_current()),
            None => token.simulator_name(true),
        }
    }

    /// The simulator request for the current state, if there is anything
    /// runnable.
    pub fn simulation_request(&self) -> Option<SimulationRequest> {
        let compiled = self.compiled.as_ref()?;
        if compiled.is_empty() {
            log::debug!("run: empty netlist, nothing to simulate");
            return None;
        }
        if !compiled.compile_errors.is_empty() {
            log::debug!("run: analysis has errors, not simulating");
            return None;
        }
        Some(SimulationRequest {
            kind: compiled.analysis_kind,
            netlist: compiled.netlist_text.clone(),
            signals: self
                .save_signals()
                .iter()
                .map(|s| self.simulator_signal(s))
                .collect(),
        })
    }

    /// Issue a run once the debounce has elapsed, unless it would repeat
    /// the last run of the same analysis.
    pub fn poll_run(&mut self, now: Duration) -> Option<SimulationRequest> {
        if !self.runs.due(now) {
            return None;
        }
        let request = self.simulation_request()?;
        self.runs.admit(&request).then_some(request)
    }

    /// Check whether an autosave is due.
    pub fn poll_autosave(&mut self, now: Duration) -> bool {
        self.autosave.poll(now)
    }

    /// Nets named by `NET` labels, in model order.
    pub fn named_nets(&self) -> Vec<String> {
        let Some(compiled) = self.compiled.as_ref() else {
            return Vec::new();
        };
        let mut nets: Vec<String> = Vec::new();
        for comp in self
            .model
            .components
            .iter()
            .filter(|c| c.kind == ComponentType::NetLabel)
        {
            let net = compiled
                .pin_net_map
                .get(&comp.id)
                .and_then(|pins| pins.first());
            if let Some(net) = net {
                if !nets.contains(&net.net) {
                    nets.push(net.net.clone());
                }
            }
        }
        nets
    }

    /// Order simulator result traces for display.
    pub fn series(&self, trace_names: &[&str]) -> Vec<Series> {
        let aliases = self
            .compiled
            .as_ref()
            .map(CompileOutput::current_aliases)
            .unwrap_or_default();
        order_series(
            trace_names,
            &self.probes,
            &self.named_nets(),
            &self.save_restriction,
            &aliases,
        )
    }

    // ============ Highlighting ============

    /// A plot trace or table row was clicked; `signals` may use any
    /// spelling. Clicking nothing clears the selection.
    pub fn click_signals(&mut self, source: HighlightSource, signals: &[&str], modifiers: ClickModifiers) {
        let tokens = encode_all(signals.iter().copied());
        self.highlight.click(source, &tokens, modifiers);
    }

    /// A plot trace or table row is hovered; an empty list ends the hover.
    pub fn hover_signals(&mut self, source: HighlightSource, signals: &[&str]) {
        let tokens = encode_all(signals.iter().copied());
        self.highlight.hover_signals(source, &tokens);
    }

    /// Components or wires were clicked on the canvas.
    pub fn select_schematic(&mut self, targets: &TargetIds, modifiers: ClickModifiers) -> Result<()> {
        self.ensure_index()?;
        let index = self.index.as_ref().ok_or(SchemError::NotCompiled)?;
        self.highlight.select_schematic(index, targets, modifiers);
        Ok(())
    }

    /// Components or wires are hovered on the canvas.
    pub fn hover_schematic(&mut self, targets: &TargetIds) -> Result<()> {
        self.ensure_index()?;
        let index = self.index.as_ref().ok_or(SchemError::NotCompiled)?;
        self.highlight.hover_schematic(index, targets);
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.highlight.clear_selection();
    }

    pub fn clear_hover(&mut self) {
        self.highlight.clear_hover();
    }

    /// Selected signal tokens.
    pub fn selection(&self) -> &[SignalToken] {
        self.highlight.selection()
    }

    /// Clear all highlight state.
    pub fn reset(&mut self) {
        self.highlight.reset();
    }

    /// The merged highlight for the canvas, plots and tables.
    pub fn highlight(&mut self) -> Result<MergedHighlight> {
        self.ensure_index()?;
        let index = self.index.as_ref().ok_or(SchemError::NotCompiled)?;
        Ok(self.highlight.render(index))
    }

    /// The netlist text ranges matching the merged highlight.
    pub fn netlist_highlight(&mut self) -> Result<NetlistHighlight> {
        let merged = self.highlight()?;
        let index = self.index.as_ref().ok_or(SchemError::NotCompiled)?;
        let compiled = self.compiled.as_ref().ok_or(SchemError::NotCompiled)?;
        Ok(highlight_netlist(compiled, index, &merged.targets()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::HighlightMode;
    use crate::schematic::{Component, Wire};

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    /// V1 drives `in`; R1 from `in` to `out`; R2 from `out` to ground;
    /// a voltage probe on `out` and a current probe on R1.
    fn model() -> SchematicModel {
        SchematicModel::new(
            vec![
                Component::new("V1", ComponentType::VoltageSource, "5")
                    .with_pin("p", 0.0, 0.0)
                    .with_pin("n", 0.0, 4.0),
                Component::new("R1", ComponentType::Resistor, "1k")
                    .with_pin("1", 0.0, 0.0)
                    .with_pin("2", 4.0, 0.0),
                Component::new("R2", ComponentType::Resistor, "2k")
                    .with_pin("1", 4.0, 0.0)
                    .with_pin("2", 4.0, 4.0),
                Component::new("N1", ComponentType::NetLabel, "in").with_pin("1", 0.0, 0.0),
                Component::new("N2", ComponentType::NetLabel, "out").with_pin("1", 4.0, 0.0),
                Component::new("G1", ComponentType::Ground, "").with_pin("1", 0.0, 4.0),
                Component::new("PV1", ComponentType::VoltageProbe, "").with_pin("1", 4.0, 0.0),
                Component::new("PI1", ComponentType::CurrentProbe, "R1").with_pin("1", 2.0, 1.0),
            ],
            vec![Wire::new("w1", &[(0.0, 4.0), (4.0, 4.0)])],
        )
    }

    fn ids(components: &[&str], wires: &[&str]) -> TargetIds {
        TargetIds::new(components.iter().copied(), wires.iter().copied())
    }

    fn engine() -> Engine {
        let mut engine = Engine::default();
        engine.set_model(model(), ms(0));
        engine
    }

    #[test]
    fn test_compile_on_model_change() {
        let engine = engine();
        let compiled = engine.compiled().unwrap();
        assert_eq!(
            compiled.netlist_text,
            "V1 in 0 5\nR1 in out 1k\nR2 out 0 2k\n.op\n.end\n"
        );
        assert_eq!(
            engine.save_signals(),
            &[SignalToken::voltage("out"), SignalToken::current("r1")]
        );
        assert_eq!(engine.named_nets(), vec!["in", "out"]);
    }

    #[test]
    fn test_not_compiled() {
        let mut engine = Engine::default();
        assert!(matches!(engine.compiled(), Err(SchemError::NotCompiled)));
        assert!(engine.ensure_index().is_err());
        assert!(engine.simulation_request().is_none());
    }

    #[test]
    fn test_run_is_debounced_and_deduplicated() {
        let mut engine = engine();
        assert!(engine.poll_run(ms(100)).is_none());
        let request = engine.poll_run(ms(200)).unwrap();
        assert_eq!(request.signals, vec!["v(out)", "@r1[i]"]);

        // Same netlist again: skipped
        engine.model_changed(ms(300));
        assert!(engine.poll_run(ms(600)).is_none());

        // A real edit goes out
        let mut model = model();
        model.components[2].value = "3k".into();
        engine.set_model(model, ms(700));
        assert!(engine.poll_run(ms(900)).is_some());
    }

    #[test]
    fn test_autosave_debounce() {
        let mut engine = engine();
        assert!(!engine.poll_autosave(ms(300)));
        assert!(engine.poll_autosave(ms(350)));
        assert!(!engine.poll_autosave(ms(400)));
    }

    #[test]
    fn test_source_currents_use_branch_spelling() {
        let engine = engine();
        assert_eq!(engine.simulator_signal(&SignalToken::current("v1")), "i(v1)");
        assert_eq!(engine.simulator_signal(&SignalToken::current("r2")), "@r2[i]");
        assert_eq!(engine.simulator_signal(&SignalToken::differential("in", "out")), "v(in,out)");
    }

    #[test]
    fn test_save_restriction() {
        let mut engine = engine();
        engine.set_save_restriction(&["V(in)", "", "v:in"], ms(0));
        assert_eq!(engine.save_signals(), &[SignalToken::voltage("in")]);
        let series = engine.series(&["v(out)", "v(in)"]);
        assert_eq!(series.len(), 1);
        engine.set_save_restriction(&[], ms(0));
        assert_eq!(engine.save_signals().len(), 2);
    }

    #[test]
    fn test_index_is_lazy() {
        let mut engine = engine();
        assert!(engine.index.is_none());
        engine.ensure_index().unwrap();
        assert!(engine.index.is_some());
        engine.model_changed(ms(10));
        assert!(engine.index.is_none());
    }

    #[test]
    fn test_plot_click_highlights_schematic() {
        let mut engine = engine();
        engine.click_signals(HighlightSource::Plot, &["V(out)"], ClickModifiers::NONE);
        let merged = engine.highlight().unwrap();
        assert!(merged.component_ids.contains("R2"));
        assert!(merged.component_ids.contains("PV1"));
        assert!(!merged.component_ids.contains("V1"));
        assert_eq!(merged.entries.len(), 1);
        assert_eq!(merged.entries[0].mode, HighlightMode::Selection);

        let text = engine.netlist_highlight().unwrap();
        assert!(text.lines.contains(&2) && text.lines.contains(&3));
    }

    #[test]
    fn test_schematic_click_selects_tokens() {
        let mut engine = engine();
        engine
            .select_schematic(&ids(&["PI1"], &[]), ClickModifiers::NONE)
            .unwrap();
        assert_eq!(engine.selection(), &[SignalToken::current("r1")]);
        let merged = engine.highlight().unwrap();
        assert!(merged.component_ids.contains("R1"));

        // Empty click clears the canvas selection too
        engine
            .select_schematic(&TargetIds::default(), ClickModifiers::NONE)
            .unwrap();
        assert!(engine.selection().is_empty());
        assert!(engine.highlight().unwrap().is_empty());
    }

    #[test]
    fn test_canvas_shift_click_toggles_into_selection() {
        let mut engine = engine();
        engine.click_signals(HighlightSource::Plot, &["V(out)"], ClickModifiers::NONE);
        engine
            .select_schematic(&ids(&["R2"], &[]), ClickModifiers::SHIFT)
            .unwrap();
        assert_eq!(
            engine.selection(),
            &[SignalToken::voltage("out"), SignalToken::current("r2")]
        );

        engine
            .select_schematic(&ids(&["R2"], &[]), ClickModifiers::SHIFT)
            .unwrap();
        assert_eq!(engine.selection(), &[SignalToken::voltage("out")]);
    }

    #[test]
    fn test_new_model_clears_highlight() {
        let mut engine = engine();
        engine
            .select_schematic(&ids(&["R1"], &[]), ClickModifiers::NONE)
            .unwrap();
        engine.hover_signals(HighlightSource::Plot, &["v(in)"]);
        assert!(!engine.highlight().unwrap().is_empty());

        engine.set_model(model(), ms(10));
        assert!(engine.selection().is_empty());
        assert!(engine.highlight().unwrap().is_empty());

        // Edits to the same model keep the selection
        engine.click_signals(HighlightSource::Table, &["v(out)"], ClickModifiers::NONE);
        engine.model_changed(ms(20));
        assert_eq!(engine.selection(), &[SignalToken::voltage("out")]);
    }

    #[test]
    fn test_wire_hover_spans() {
        let mut engine = engine();
        engine.hover_schematic(&ids(&[], &["w1"])).unwrap();
        let text = engine.netlist_highlight().unwrap();
        // V1 and R2 sit on ground; G1 has no line of its own
        assert_eq!(text.lines.iter().copied().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(text.spans.len(), 2);
        engine.reset();
        assert!(engine.highlight().unwrap().is_empty());
    }
}
