//! Netlist compilation from a schematic model.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::analysis::{directive, AnalysisConfig, AnalysisKind};
use super::lexer::tokenize_line;
use crate::schematic::{Component, ComponentType, NetGraph, SchematicModel};
use crate::signal::SignalToken;

/// Terminating directive of every netlist.
pub const END_DIRECTIVE: &str = ".end";

/// Value used for an open switch.
const OPEN_SWITCH_RESISTANCE: &str = "1e12";

/// What produced a netlist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Component,
    Directive,
}

/// Purpose of a directive line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSource {
    Preamble,
    Analysis,
    End,
}

/// Provenance of one netlist line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMapEntry {
    /// 1-based line number
    pub line: usize,
    pub kind: LineKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    /// Nets in node-column order
    pub nets: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netlist_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<LineSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_kind: Option<AnalysisKind>,
}

impl LineMapEntry {
    fn directive(source: LineSource, analysis_kind: Option<AnalysisKind>) -> Self {
        Self {
            line: 0,
            kind: LineKind::Directive,
            component_id: None,
            nets: Vec::new(),
            netlist_id: None,
            source: Some(source),
            analysis_kind,
        }
    }
}

/// The element line emitted for a two-terminal component.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentLine {
    /// Element name in the netlist
    pub netlist_id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub net_a: String,
    pub net_b: String,
    pub value: String,
    /// 1-based line number
    pub line: usize,
}

/// Net of one component pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinNet {
    pub pin_id: String,
    pub net: String,
}

/// Everything produced by one compile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub analysis_kind: AnalysisKind,
    pub netlist_text: String,
    pub line_map: Vec<LineMapEntry>,
    /// Nets used by element lines, first appearance order
    pub net_names: Vec<String>,
    /// Component id -> pin nets in pin order
    pub pin_net_map: BTreeMap<String, Vec<PinNet>>,
    /// Component id -> emitted element line
    pub component_lines: BTreeMap<String, ComponentLine>,
    /// Structural problems; the netlist is still best effort
    pub warnings: Vec<String>,
    /// Analysis configuration problems; the offending directive is omitted
    pub compile_errors: Vec<String>,
    #[serde(skip)]
    pub graph: NetGraph,
}

impl CompileOutput {
    /// Warnings followed by compile errors as one flat list.
    pub fn diagnostics(&self) -> Vec<String> {
        self.warnings
            .iter()
            .chain(&self.compile_errors)
            .cloned()
            .collect()
    }

    /// Check whether a netlist was produced.
    pub fn is_empty(&self) -> bool {
        self.netlist_text.is_empty()
    }

    /// Line-map entry for a 1-based line number.
    pub fn entry(&self, line: usize) -> Option<&LineMapEntry> {
        self.line_map.get(line.checked_sub(1)?)
    }

    /// Find the component line whose element name matches (case-insensitive).
    pub fn line_by_netlist_id(&self, netlist_id: &str) -> Option<(&str, &ComponentLine)> {
        self.component_lines
            .iter()
            .find(|(_, line)| line.netlist_id.eq_ignore_ascii_case(netlist_id))
            .map(|(id, line)| (id.as_str(), line))
    }

    /// Element line measured by a current target: a component id first,
    /// then an element name.
    pub fn line_for_current(&self, target: &str) -> Option<(&str, &ComponentLine)> {
        self.component_lines
            .iter()
            .find(|(id, _)| id.eq_ignore_ascii_case(target))
            .map(|(id, line)| (id.as_str(), line))
            .or_else(|| self.line_by_netlist_id(target))
    }

    /// Device currents the simulator reports under the element name, mapped
    /// to the token of the component id they belong to.
    pub fn current_aliases(&self) -> HashMap<SignalToken, SignalToken> {
        self.component_lines
            .iter()
            .filter(|(id, line)| {
                !line.kind.has_branch_current()
                    && !line.netlist_id.eq_ignore_ascii_case(id)
                    && !self
                        .component_lines
                        .keys()
                        .any(|other| other.eq_ignore_ascii_case(&line.netlist_id))
            })
            .map(|(id, line)| {
                (
                    SignalToken::current(&line.netlist_id),
                    SignalToken::current(id),
                )
            })
            .collect()
    }
}

/// Element prefix and value for an electrical component; `None` when the
/// component cannot be emitted.
fn element(comp: &Component) -> Option<(&'static str, String)> {
    let value = comp.trimmed_value();
    let required = |prefix| (!value.is_empty()).then(|| (prefix, value.to_string()));
    let defaulted = |prefix| {
        let value = if value.is_empty() { "0" } else { value };
        Some((prefix, value.to_string()))
    };
    match comp.kind {
        ComponentType::Resistor => required("R"),
        ComponentType::Capacitor => required("C"),
        ComponentType::Inductor => required("L"),
        ComponentType::VoltageSource => defaulted("V"),
        ComponentType::CurrentSource => defaulted("I"),
        ComponentType::Ammeter => Some(("V", "0".to_string())),
        ComponentType::Switch => {
            let open = matches!(
                value.to_ascii_lowercase().as_str(),
                "open" | "off" | "0" | "false"
            );
            if open {
                Some(("R", OPEN_SWITCH_RESISTANCE.to_string()))
            } else {
                Some(("V", "0".to_string()))
            }
        }
        _ => None,
    }
}

/// Element name: the component id, prefixed unless it already starts with
/// the element letter.
pub fn netlist_name(prefix: &str, id: &str) -> String {
    let id = id.split_whitespace().collect::<Vec<_>>().join("_");
    if id.to_ascii_uppercase().starts_with(prefix) {
        id
    } else {
        format!("{prefix}{id}")
    }
}

fn is_terminator(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(END_DIRECTIVE)
}

/// Compile a schematic into netlist text with its line map.
///
/// Never fails: structural problems become `warnings`, analysis problems
/// become `compile_errors`. Either a complete netlist is produced or, when
/// nothing is simulatable, an explicit empty one.
pub fn compile(
    model: &SchematicModel,
    kind: AnalysisKind,
    config: &AnalysisConfig,
    preamble: &str,
) -> CompileOutput {
    let graph = NetGraph::build(model);
    let mut warnings = Vec::new();
    let mut compile_errors = Vec::new();

    let pin_net_map: BTreeMap<String, Vec<PinNet>> = model
        .components
        .iter()
        .filter(|c| c.kind != ComponentType::Text)
        .map(|c| {
            let pins = c
                .pins
                .iter()
                .filter_map(|pin| {
                    graph.pin_net(&c.id, &pin.id).map(|net| PinNet {
                        pin_id: pin.id.clone(),
                        net: net.name.clone(),
                    })
                })
                .collect();
            (c.id.clone(), pins)
        })
        .collect();

    // Element lines in model order
    let mut element_lines: Vec<(String, LineMapEntry)> = Vec::new();
    let mut component_lines: BTreeMap<String, ComponentLine> = BTreeMap::new();
    let mut used_names: HashSet<String> = HashSet::new();
    for comp in model.components.iter().filter(|c| c.kind.is_electrical()) {
        if comp.pins.len() < 2 {
            warnings.push(format!(
                "{}: expected 2 pins, found {}",
                comp.id,
                comp.pins.len()
            ));
            continue;
        }
        let Some((prefix, value)) = element(comp) else {
            warnings.push(format!("{}: {} has no value", comp.id, comp.kind));
            continue;
        };
        let netlist_id = netlist_name(prefix, &comp.id);
        if !used_names.insert(netlist_id.to_ascii_lowercase()) {
            warnings.push(format!(
                "{}: element name '{}' is already used",
                comp.id, netlist_id
            ));
            continue;
        }
        if comp.pins.len() > 2 {
            warnings.push(format!("{}: only the first two pins are connected", comp.id));
        }

        let pin_nets: Vec<_> = comp.pins[..2]
            .iter()
            .filter_map(|pin| Some((pin, graph.pin_net(&comp.id, &pin.id)?)))
            .collect();
        let [(pin_a, net_a), (pin_b, net_b)] = pin_nets.as_slice() else {
            warnings.push(format!("{}: pins are missing from the net graph", comp.id));
            continue;
        };
        for (pin, net) in [(pin_a, net_a), (pin_b, net_b)] {
            if net.pins.len() == 1 {
                warnings.push(format!("{}: pin {} is unconnected", comp.id, pin.id));
            }
        }
        let nets = vec![net_a.name.clone(), net_b.name.clone()];

        component_lines.insert(
            comp.id.clone(),
            ComponentLine {
                netlist_id: netlist_id.clone(),
                kind: comp.kind,
                net_a: nets[0].clone(),
                net_b: nets[1].clone(),
                value: value.clone(),
                line: 0,
            },
        );
        element_lines.push((
            format!("{} {} {} {}", netlist_id, nets[0], nets[1], value),
            LineMapEntry {
                line: 0,
                kind: LineKind::Component,
                component_id: Some(comp.id.clone()),
                nets,
                netlist_id: Some(netlist_id),
                source: None,
                analysis_kind: None,
            },
        ));
    }

    if element_lines.is_empty() {
        warnings.push("schematic has no simulatable components".to_string());
        for warning in &warnings {
            log::warn!("compile: {warning}");
        }
        return CompileOutput {
            analysis_kind: kind,
            netlist_text: String::new(),
            line_map: Vec::new(),
            net_names: Vec::new(),
            pin_net_map,
            component_lines: BTreeMap::new(),
            warnings,
            compile_errors,
            graph,
        };
    }

    if !graph.has_ground() {
        warnings.push("schematic has no ground reference (GND)".to_string());
    }

    // Source override for tran/ac runs; a missing source is a no-op
    if let Some((source, override_value)) = config.source_override(kind) {
        let target = element_lines.iter_mut().find(|(_, entry)| {
            let by_id = entry
                .component_id
                .as_deref()
                .is_some_and(|id| id.eq_ignore_ascii_case(source));
            let by_name = entry
                .netlist_id
                .as_deref()
                .is_some_and(|name| name.eq_ignore_ascii_case(source));
            by_id || by_name
        });
        match target {
            Some((text, entry)) => {
                let mut words: Vec<String> = tokenize_line(text)
                    .into_iter()
                    .take(1 + entry.nets.len())
                    .map(|token| token.text)
                    .collect();
                words.push(override_value.to_string());
                *text = words.join(" ");
                if let Some(line) = entry
                    .component_id
                    .as_ref()
                    .and_then(|id| component_lines.get_mut(id))
                {
                    line.value = override_value.to_string();
                }
            }
            None => log::debug!("compile: override source '{source}' not found, left unchanged"),
        }
    }

    let resolve_source = |name: &str| {
        component_lines
            .iter()
            .filter(|(_, line)| {
                matches!(
                    line.kind,
                    ComponentType::VoltageSource | ComponentType::CurrentSource
                )
            })
            .find(|(id, line)| {
                id.eq_ignore_ascii_case(name) || line.netlist_id.eq_ignore_ascii_case(name)
            })
            .map(|(_, line)| line.netlist_id.clone())
    };
    let analysis_line = match directive(kind, config, resolve_source) {
        Ok(line) => Some(line),
        Err(message) => {
            compile_errors.push(message);
            None
        }
    };

    // Assemble: preamble, elements, analysis, terminator
    let mut lines: Vec<(String, LineMapEntry)> = preamble
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !is_terminator(line))
        .map(|line| {
            (
                line.to_string(),
                LineMapEntry::directive(LineSource::Preamble, None),
            )
        })
        .collect();
    lines.extend(element_lines);
    if let Some(line) = analysis_line {
        lines.push((line, LineMapEntry::directive(LineSource::Analysis, Some(kind))));
    }
    lines.push((
        END_DIRECTIVE.to_string(),
        LineMapEntry::directive(LineSource::End, None),
    ));

    let mut netlist_text = String::new();
    let mut line_map = Vec::with_capacity(lines.len());
    for (i, (text, mut entry)) in lines.into_iter().enumerate() {
        entry.line = i + 1;
        if let Some(line) = entry
            .component_id
            .as_ref()
            .and_then(|id| component_lines.get_mut(id))
        {
            line.line = entry.line;
        }
        netlist_text.push_str(&text);
        netlist_text.push('\n');
        line_map.push(entry);
    }

    let mut net_names: Vec<String> = Vec::new();
    for entry in &line_map {
        for net in &entry.nets {
            if !net_names.contains(net) {
                net_names.push(net.clone());
            }
        }
    }

    for warning in warnings.iter().chain(&compile_errors) {
        log::warn!("compile: {warning}");
    }
    log::debug!(
        "compile: {} analysis, {} lines, {} elements, {} nets",
        kind,
        line_map.len(),
        component_lines.len(),
        net_names.len()
    );

    CompileOutput {
        analysis_kind: kind,
        netlist_text,
        line_map,
        net_names,
        pin_net_map,
        component_lines,
        warnings,
        compile_errors,
        graph,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schematic::Wire;

    /// V1 and R1 in parallel between `in` and ground.
    fn divider() -> SchematicModel {
        SchematicModel::new(
            vec![
                Component::new("V1", ComponentType::VoltageSource, "5")
                    .with_pin("p", 0.0, 0.0)
                    .with_pin("n", 0.0, 4.0),
                Component::new("R1", ComponentType::Resistor, "1k")
                    .with_pin("1", 4.0, 0.0)
                    .with_pin("2", 4.0, 4.0),
                Component::new("N1", ComponentType::NetLabel, "in").with_pin("1", 0.0, 0.0),
                Component::new("G1", ComponentType::Ground, "").with_pin("1", 0.0, 4.0),
            ],
            vec![
                Wire::new("w1", &[(0.0, 0.0), (4.0, 0.0)]),
                Wire::new("w2", &[(0.0, 4.0), (4.0, 4.0)]),
            ],
        )
    }

    #[test]
    fn test_op_compile() {
        let out = compile(&divider(), AnalysisKind::Op, &AnalysisConfig::default(), "");
        assert_eq!(out.netlist_text, "V1 in 0 5\nR1 in 0 1k\n.op\n.end\n");
        assert!(out.warnings.is_empty(), "{:?}", out.warnings);
        assert!(out.compile_errors.is_empty());
        let components = out
            .line_map
            .iter()
            .filter(|e| e.kind == LineKind::Component)
            .count();
        assert_eq!(components, 2);
        assert_eq!(out.line_map[2].source, Some(LineSource::Analysis));
        assert_eq!(out.line_map[3].source, Some(LineSource::End));
        assert_eq!(out.net_names, vec!["in", "0"]);
        assert_eq!(out.component_lines["R1"].line, 2);
        assert_eq!(out.pin_net_map["N1"][0].net, "in");
    }

    #[test]
    fn test_compile_is_deterministic() {
        let model = divider();
        let a = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "* x");
        let b = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "* x");
        assert_eq!(a.netlist_text, b.netlist_text);
        assert_eq!(a.line_map, b.line_map);
    }

    #[test]
    fn test_preamble_terminator_stripped() {
        let out = compile(
            &divider(),
            AnalysisKind::Op,
            &AnalysisConfig::default(),
            ".option reltol=1e-4\n\n.END\n",
        );
        assert_eq!(out.netlist_text.matches(".end").count(), 1);
        assert!(out.netlist_text.to_lowercase().matches(".end").count() == 1);
        assert_eq!(out.line_map[0].source, Some(LineSource::Preamble));
        assert_eq!(out.component_lines["V1"].line, 2);
    }

    #[test]
    fn test_analysis_error_suppresses_directive() {
        let out = compile(&divider(), AnalysisKind::Tran, &AnalysisConfig::default(), "");
        assert_eq!(out.compile_errors, vec!["tran: step is required"]);
        assert_eq!(out.netlist_text, "V1 in 0 5\nR1 in 0 1k\n.end\n");
        assert_eq!(out.diagnostics().len(), 1);
    }

    #[test]
    fn test_source_override() {
        let mut config = AnalysisConfig::default();
        config.tran.step = "1u".into();
        config.tran.stop = "1m".into();
        config.tran.source = "v1".into();
        config.tran.source_value = "SIN(0 1 1k)".into();
        let out = compile(&divider(), AnalysisKind::Tran, &config, "");
        assert!(out.netlist_text.starts_with("V1 in 0 SIN(0 1 1k)\n"));
        assert_eq!(out.component_lines["V1"].value, "SIN(0 1 1k)");

        config.tran.source = "V7".into();
        let out = compile(&divider(), AnalysisKind::Tran, &config, "");
        assert!(out.netlist_text.starts_with("V1 in 0 5\n"));
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_dc_resolves_source_name() {
        let mut config = AnalysisConfig::default();
        config.dc.source = "v1".into();
        config.dc.start = "0".into();
        config.dc.stop = "5".into();
        config.dc.step = "1".into();
        let out = compile(&divider(), AnalysisKind::Dc, &config, "");
        assert!(out.netlist_text.contains(".dc V1 0 5 1\n"));
        config.dc.source = "R1".into();
        let out = compile(&divider(), AnalysisKind::Dc, &config, "");
        assert_eq!(out.compile_errors.len(), 1);
    }

    #[test]
    fn test_skips_measurement_and_labels() {
        let mut model = divider();
        model.components.push(
            Component::new("PV1", ComponentType::VoltageProbe, "").with_pin("1", 4.0, 0.0),
        );
        model.components.push(
            Component::new("VM1", ComponentType::Voltmeter, "")
                .with_pin("+", 4.0, 0.0)
                .with_pin("-", 4.0, 4.0),
        );
        model.components.push(Component::new("T1", ComponentType::Text, "hello"));
        let out = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "");
        assert_eq!(out.component_lines.len(), 2);
        assert!(out.pin_net_map.contains_key("PV1"));
        assert!(!out.pin_net_map.contains_key("T1"));
    }

    #[test]
    fn test_structural_warnings() {
        let model = SchematicModel::new(
            vec![
                Component::new("R1", ComponentType::Resistor, "").with_pin("1", 0.0, 0.0).with_pin("2", 2.0, 0.0),
                Component::new("R2", ComponentType::Resistor, "1k").with_pin("1", 0.0, 0.0),
                Component::new("R3", ComponentType::Resistor, "1k").with_pin("1", 0.0, 0.0).with_pin("2", 2.0, 0.0),
                Component::new("3", ComponentType::Resistor, "2k").with_pin("1", 0.0, 0.0).with_pin("2", 2.0, 0.0),
                Component::new("SW1", ComponentType::Switch, "open").with_pin("1", 2.0, 0.0).with_pin("2", 5.0, 0.0),
            ],
            vec![],
        );
        let out = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "");
        let w = out.warnings.join("\n");
        assert!(w.contains("R1: R has no value"));
        assert!(w.contains("R2: expected 2 pins, found 1"));
        assert!(w.contains("3: element name 'R3' is already used"));
        assert!(w.contains("SW1: pin 2 is unconnected"));
        assert!(w.contains("no ground reference"));
        assert_eq!(out.component_lines["SW1"].netlist_id, "RSW1");
        assert_eq!(out.component_lines["SW1"].value, "1e12");
    }

    #[test]
    fn test_empty_schematic() {
        let model = SchematicModel::new(
            vec![Component::new("G1", ComponentType::Ground, "").with_pin("1", 0.0, 0.0)],
            vec![],
        );
        let out = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), ".include x");
        assert!(out.is_empty());
        assert!(out.line_map.is_empty());
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_current_lookup_by_component_id() {
        let mut model = divider();
        model.components.push(
            Component::new("load", ComponentType::Resistor, "10k")
                .with_pin("1", 4.0, 0.0)
                .with_pin("2", 4.0, 4.0),
        );
        let out = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "");
        assert!(out.netlist_text.contains("Rload in 0 10k\n"));

        let (id, line) = out.line_for_current("load").unwrap();
        assert_eq!(id, "load");
        assert_eq!(line.netlist_id, "Rload");
        assert_eq!(out.line_for_current("rload").unwrap().0, "load");
        assert_eq!(out.line_for_current("v1").unwrap().0, "V1");

        let aliases = out.current_aliases();
        assert_eq!(aliases.len(), 1);
        assert_eq!(
            aliases.get(&SignalToken::current("rload")),
            Some(&SignalToken::current("load"))
        );
    }

    #[test]
    fn test_netlist_name() {
        assert_eq!(netlist_name("R", "R1"), "R1");
        assert_eq!(netlist_name("R", "r1"), "r1");
        assert_eq!(netlist_name("V", "AM1"), "VAM1");
        assert_eq!(netlist_name("C", "my cap"), "Cmy_cap");
    }
}
