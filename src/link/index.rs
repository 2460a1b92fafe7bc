//! Bidirectional index between signal tokens and schematic elements.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::netlist::CompileOutput;
use crate::probe::ProbeResolution;
use crate::schematic::{ComponentType, SchematicModel};
use crate::signal::SignalToken;

/// Component and wire ids implicated by one or more signals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetIds {
    pub component_ids: BTreeSet<String>,
    pub wire_ids: BTreeSet<String>,
}

impl TargetIds {
    /// Collect ids from borrowed strings.
    pub fn new<'a>(
        component_ids: impl IntoIterator<Item = &'a str>,
        wire_ids: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self {
            component_ids: component_ids.into_iter().map(str::to_string).collect(),
            wire_ids: wire_ids.into_iter().map(str::to_string).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.component_ids.is_empty() && self.wire_ids.is_empty()
    }

    /// Union with another set.
    pub fn extend(&mut self, other: &TargetIds) {
        self.component_ids.extend(other.component_ids.iter().cloned());
        self.wire_ids.extend(other.wire_ids.iter().cloned());
    }

    /// Toggle every id of `other`: present ids are removed, absent ones added.
    pub fn toggle(&mut self, other: &TargetIds) {
        fn toggle_set(set: &mut BTreeSet<String>, ids: &BTreeSet<String>) {
            for id in ids {
                if !set.remove(id) {
                    set.insert(id.clone());
                }
            }
        }
        toggle_set(&mut self.component_ids, &other.component_ids);
        toggle_set(&mut self.wire_ids, &other.wire_ids);
    }

    /// Remove every id also present in `other`.
    pub fn subtract(&mut self, other: &TargetIds) {
        self.component_ids.retain(|id| !other.component_ids.contains(id));
        self.wire_ids.retain(|id| !other.wire_ids.contains(id));
    }
}

fn net_key(net: &str) -> String {
    net.to_lowercase()
}

/// Links trace tokens to the components and wires that carry them.
///
/// Built in one pass from the model, its compile output and the probe
/// resolution. It is never patched: when any input changes the owner drops
/// it and builds a new one.
#[derive(Debug, Clone, Default)]
pub struct TraceLinkIndex {
    /// Net -> components with a pin on it
    net_components: HashMap<String, BTreeSet<String>>,
    /// Net -> wires lying on it
    net_wires: HashMap<String, BTreeSet<String>>,
    /// Component -> nets of its pins, in pin order
    component_nets: HashMap<String, Vec<String>>,
    /// Component -> tokens it carries or observes
    component_tokens: HashMap<String, Vec<SignalToken>>,
    /// Wire -> net
    wire_nets: HashMap<String, String>,
    /// Current token -> components carrying or observing it
    current_components: HashMap<SignalToken, BTreeSet<String>>,
    /// Components that may stand in for an unresolved selection, model order
    fallback: Vec<String>,
}

impl TraceLinkIndex {
    /// Build the index.
    pub fn build(
        model: &SchematicModel,
        compiled: &CompileOutput,
        probes: &ProbeResolution,
    ) -> Self {
        let mut index = Self::default();

        // Nets and pins
        for (component_id, pins) in &compiled.pin_net_map {
            for pin in pins {
                index
                    .net_components
                    .entry(net_key(&pin.net))
                    .or_default()
                    .insert(component_id.clone());
                index
                    .component_nets
                    .entry(component_id.clone())
                    .or_default()
                    .push(pin.net.clone());
            }
        }

        // Element currents under both spellings
        for (component_id, line) in &compiled.component_lines {
            for token in [
                SignalToken::current(&line.netlist_id),
                SignalToken::current(component_id),
            ] {
                index.add_current(component_id, token);
            }
        }

        // Label components carry their net's voltage
        for comp in model.components.iter().filter(|c| {
            matches!(c.kind, ComponentType::NetLabel | ComponentType::Ground)
        }) {
            if let Some(net) = compiled.pin_net_map.get(&comp.id).and_then(|p| p.first()) {
                index.add_token(&comp.id, SignalToken::voltage(&net.net));
            }
        }

        // Probe signals belong to the probe itself
        for descriptor in &probes.descriptors {
            for token in descriptor.signals() {
                match token {
                    SignalToken::Current(_) => index.add_current(&descriptor.id, token.clone()),
                    _ => index.add_token(&descriptor.id, token.clone()),
                }
            }
        }

        // Wires take the net of their first point on the graph
        for wire in &model.wires {
            let net = wire
                .points
                .iter()
                .find_map(|point| compiled.graph.net_at(point.grid()));
            if let Some(net) = net {
                index
                    .net_wires
                    .entry(net_key(&net.name))
                    .or_default()
                    .insert(wire.id.clone());
                index.wire_nets.insert(wire.id.clone(), net.name.clone());
            }
        }

        index.fallback = model
            .components
            .iter()
            .filter(|c| compiled.component_lines.contains_key(&c.id))
            .map(|c| c.id.clone())
            .collect();

        log::debug!(
            "trace index: {} nets, {} wires, {} current tokens",
            index.net_components.len(),
            index.wire_nets.len(),
            index.current_components.len()
        );
        index
    }

    fn add_token(&mut self, component_id: &str, token: SignalToken) {
        let tokens = self
            .component_tokens
            .entry(component_id.to_string())
            .or_default();
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }

    fn add_current(&mut self, component_id: &str, token: SignalToken) {
        self.current_components
            .entry(token.clone())
            .or_default()
            .insert(component_id.to_string());
        self.add_token(component_id, token);
    }

    /// Components and wires implicated by one signal; unknown signals yield
    /// an empty set.
    pub fn resolve_targets_for_signal(&self, token: &SignalToken) -> TargetIds {
        let mut targets = TargetIds::default();
        match token {
            SignalToken::Current(_) => {
                if let Some(ids) = self.current_components.get(token) {
                    targets.component_ids.extend(ids.iter().cloned());
                }
            }
            SignalToken::Voltage(_) | SignalToken::Differential(..) => {
                for net in token.nets() {
                    let key = net_key(net);
                    if let Some(ids) = self.net_components.get(&key) {
                        targets.component_ids.extend(ids.iter().cloned());
                    }
                    if let Some(ids) = self.net_wires.get(&key) {
                        targets.wire_ids.extend(ids.iter().cloned());
                    }
                }
            }
        }
        targets
    }

    /// Union of the targets of several signals.
    ///
    /// When a non-empty signal list resolves to nothing, the first simulated
    /// component stands in so the selection never highlights nothing.
    pub fn resolve_targets_for_selection(&self, tokens: &[SignalToken]) -> TargetIds {
        let mut targets = TargetIds::default();
        for token in tokens {
            targets.extend(&self.resolve_targets_for_signal(token));
        }
        if targets.is_empty() && !tokens.is_empty() {
            if let Some(id) = self.fallback.first() {
                log::debug!("trace index: selection resolved to nothing, falling back to {id}");
                targets.component_ids.insert(id.clone());
            }
        }
        targets
    }

    /// Tokens a component carries or observes.
    pub fn tokens_for_component(&self, component_id: &str) -> &[SignalToken] {
        self.component_tokens
            .get(component_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The voltage token of a wire's net.
    pub fn tokens_for_wire(&self, wire_id: &str) -> Vec<SignalToken> {
        self.wire_net(wire_id)
            .map(|net| vec![SignalToken::voltage(net)])
            .unwrap_or_default()
    }

    /// Net a wire lies on.
    pub fn wire_net(&self, wire_id: &str) -> Option<&str> {
        self.wire_nets.get(wire_id).map(String::as_str)
    }

    /// Nets of a component's pins, in pin order.
    pub fn component_nets(&self, component_id: &str) -> &[String] {
        self.component_nets
            .get(component_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Tokens for a schematic selection, components first, without repeats.
    pub fn tokens_for_targets(&self, targets: &TargetIds) -> Vec<SignalToken> {
        let mut tokens: Vec<SignalToken> = Vec::new();
        let component_tokens = targets
            .component_ids
            .iter()
            .flat_map(|id| self.tokens_for_component(id).iter().cloned());
        let wire_tokens = targets
            .wire_ids
            .iter()
            .flat_map(|id| self.tokens_for_wire(id));
        for token in component_tokens.chain(wire_tokens) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        tokens
    }
}
