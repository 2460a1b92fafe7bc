//! Probe resolution.
//!
//! Probes are measurement-only components. Each one is resolved against the
//! compiled netlist into a [`ProbeDescriptor`] naming the signals it
//! observes. Resolution failures are data: an `invalid` flag and a `?`
//! label, never an error.

use serde::Serialize;

use crate::netlist::CompileOutput;
use crate::schematic::{Component, ComponentType, Pin, SchematicModel};
use crate::signal::SignalToken;

/// Default snap tolerance for current/power probe targets, in squared grid units.
pub const SNAP_TOLERANCE: f64 = 1.0;

/// Outcome of looking for a probe's target component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetResolution {
    Resolved(String),
    Unresolved,
}

/// What one probe observes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_a: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub net_b: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
    pub current_signals: Vec<SignalToken>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage_signal: Option<SignalToken>,
    pub save_signals: Vec<SignalToken>,
    pub invalid: bool,
}

impl ProbeDescriptor {
    fn new(comp: &Component, label: impl Into<String>) -> Self {
        Self {
            id: comp.id.clone(),
            kind: comp.kind,
            label: label.into(),
            net_a: None,
            net_b: None,
            target_id: None,
            current_signals: Vec::new(),
            voltage_signal: None,
            save_signals: Vec::new(),
            invalid: false,
        }
    }

    fn invalid(comp: &Component, label: &str) -> Self {
        log::debug!("probe {}: unresolved ({label})", comp.id);
        Self {
            invalid: true,
            ..Self::new(comp, label)
        }
    }

    /// Every signal this probe observes.
    pub fn signals(&self) -> impl Iterator<Item = &SignalToken> {
        self.voltage_signal.iter().chain(&self.current_signals)
    }
}

/// Descriptors for every probe plus the schematic-wide save list.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResolution {
    pub descriptors: Vec<ProbeDescriptor>,
    /// Union of all descriptors' save signals, first seen wins
    pub save_signals: Vec<SignalToken>,
}

impl ProbeResolution {
    /// Find the descriptor of a probe.
    pub fn descriptor(&self, id: &str) -> Option<&ProbeDescriptor> {
        self.descriptors.iter().find(|d| d.id == id)
    }

    /// Label of the first valid probe observing a signal.
    pub fn label_for(&self, token: &SignalToken) -> Option<&str> {
        self.descriptors
            .iter()
            .filter(|d| !d.invalid)
            .find(|d| d.signals().any(|s| s == token))
            .map(|d| d.label.as_str())
    }
}

/// Resolves probe components against a compiled netlist.
#[derive(Debug, Clone)]
pub struct ProbeResolver {
    snap_tolerance: f64,
}

impl Default for ProbeResolver {
    fn default() -> Self {
        Self {
            snap_tolerance: SNAP_TOLERANCE,
        }
    }
}

impl ProbeResolver {
    /// Create a resolver with the default snap tolerance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snap tolerance (squared grid units).
    pub fn with_snap_tolerance(mut self, snap_tolerance: f64) -> Self {
        self.snap_tolerance = snap_tolerance;
        self
    }

    /// Resolve every probe in the model.
    pub fn resolve(&self, model: &SchematicModel, compiled: &CompileOutput) -> ProbeResolution {
        let mut descriptors = Vec::new();
        for comp in &model.components {
            let descriptor = match comp.kind {
                ComponentType::VoltageProbe => self.voltage(comp, compiled),
                ComponentType::DifferentialProbe | ComponentType::Voltmeter => {
                    self.differential(comp, compiled)
                }
                ComponentType::CurrentProbe | ComponentType::PowerProbe => {
                    let target = self.target(comp, model, compiled);
                    self.current(comp, target, compiled)
                }
                ComponentType::Ammeter => {
                    let target = if compiled.component_lines.contains_key(&comp.id) {
                        TargetResolution::Resolved(comp.id.clone())
                    } else {
                        TargetResolution::Unresolved
                    };
                    self.current(comp, target, compiled)
                }
                _ => continue,
            };
            descriptors.push(descriptor);
        }

        let mut save_signals: Vec<SignalToken> = Vec::new();
        for signal in descriptors.iter().flat_map(|d| &d.save_signals) {
            if !save_signals.contains(signal) {
                save_signals.push(signal.clone());
            }
        }

        log::debug!(
            "probes: {} resolved, {} invalid, {} save signals",
            descriptors.iter().filter(|d| !d.invalid).count(),
            descriptors.iter().filter(|d| d.invalid).count(),
            save_signals.len()
        );

        ProbeResolution {
            descriptors,
            save_signals,
        }
    }

    /// Net under a probe pin, if that net takes part in the netlist.
    fn pin_net(&self, comp: &Component, pin: &Pin, compiled: &CompileOutput) -> Option<String> {
        let net = compiled.graph.pin_net(&comp.id, &pin.id)?;
        let simulated = net.is_ground() || compiled.net_names.iter().any(|n| *n == net.name);
        simulated.then(|| net.name.clone())
    }

    fn voltage(&self, comp: &Component, compiled: &CompileOutput) -> ProbeDescriptor {
        let net = comp
            .pins
            .first()
            .and_then(|pin| self.pin_net(comp, pin, compiled));
        match net {
            Some(net) => {
                let signal = SignalToken::voltage(&net);
                ProbeDescriptor {
                    label: signal.label(),
                    net_a: Some(net),
                    voltage_signal: Some(signal.clone()),
                    save_signals: vec![signal],
                    ..ProbeDescriptor::new(comp, "")
                }
            }
            None => {
                let fallback = match comp.trimmed_value() {
                    "" => comp.id.as_str(),
                    value => value,
                };
                log::debug!("probe {}: no simulated net under pin", comp.id);
                ProbeDescriptor::new(comp, fallback)
            }
        }
    }

    fn differential(&self, comp: &Component, compiled: &CompileOutput) -> ProbeDescriptor {
        // Unnamed sides take the first pin not used by the other side
        let named = |label: &str| comp.pins.iter().position(|p| p.is_named(label));
        let (pos_named, neg_named) = (named("P+"), named("P-"));
        let pos = pos_named.or_else(|| (0..comp.pins.len()).find(|&i| Some(i) != neg_named));
        let neg = neg_named.or_else(|| (0..comp.pins.len()).find(|&i| Some(i) != pos));
        let (Some(pos), Some(neg)) = (pos, neg) else {
            return ProbeDescriptor::invalid(comp, "V(?)");
        };
        let (pos, neg) = (&comp.pins[pos], &comp.pins[neg]);
        let net_a = self.pin_net(comp, pos, compiled);
        let net_b = self.pin_net(comp, neg, compiled);
        let (Some(net_a), Some(net_b)) = (net_a, net_b) else {
            return ProbeDescriptor::invalid(comp, "V(?)");
        };
        let signal = SignalToken::differential(&net_a, &net_b);
        ProbeDescriptor {
            label: signal.label(),
            net_a: Some(net_a),
            net_b: Some(net_b),
            voltage_signal: Some(signal.clone()),
            save_signals: vec![signal],
            ..ProbeDescriptor::new(comp, "")
        }
    }

    fn current(
        &self,
        comp: &Component,
        target: TargetResolution,
        compiled: &CompileOutput,
    ) -> ProbeDescriptor {
        let power = comp.kind == ComponentType::PowerProbe;
        let unresolved = if power { "P(?)" } else { "I(?)" };
        let TargetResolution::Resolved(target_id) = target else {
            return ProbeDescriptor::invalid(comp, unresolved);
        };
        let Some(line) = compiled.component_lines.get(&target_id) else {
            return ProbeDescriptor::invalid(comp, unresolved);
        };

        let current = if line.kind.has_branch_current() {
            SignalToken::current(&line.netlist_id)
        } else {
            SignalToken::current(&target_id)
        };
        let mut descriptor = ProbeDescriptor {
            label: format!("I({target_id})"),
            net_a: Some(line.net_a.clone()),
            net_b: Some(line.net_b.clone()),
            current_signals: vec![current.clone()],
            save_signals: vec![current],
            ..ProbeDescriptor::new(comp, "")
        };
        if power {
            let voltage = SignalToken::differential(&line.net_a, &line.net_b);
            descriptor.label = format!("P({target_id})");
            descriptor.save_signals.push(voltage.clone());
            descriptor.voltage_signal = Some(voltage);
        }
        descriptor.target_id = Some(target_id);
        descriptor
    }

    /// Pick the component a current or power probe measures.
    ///
    /// The stored target (the probe's value) wins while it names an eligible
    /// component. Otherwise the eligible component whose pin midpoint is
    /// closest to the probe's first pin is taken, if within the snap
    /// tolerance. Ties go to the first in model order.
    pub fn target(
        &self,
        probe: &Component,
        model: &SchematicModel,
        compiled: &CompileOutput,
    ) -> TargetResolution {
        let eligible = |c: &Component| {
            c.id != probe.id
                && c.kind.is_electrical()
                && c.pins.len() == 2
                && compiled.component_lines.contains_key(&c.id)
        };

        let stored = probe.trimmed_value();
        if !stored.is_empty() {
            if let Some(comp) = model.component(stored).filter(|c| eligible(c)) {
                return TargetResolution::Resolved(comp.id.clone());
            }
        }

        let Some(origin) = probe.pins.first().map(Pin::position) else {
            return TargetResolution::Unresolved;
        };
        let mut best: Option<(&Component, f64)> = None;
        for comp in model.components.iter().filter(|c| eligible(c)) {
            let Some(mid) = comp.midpoint() else { continue };
            let d = origin.distance_sq(&mid);
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((comp, d));
            }
        }

        match best {
            Some((comp, d)) if d <= self.snap_tolerance => TargetResolution::Resolved(comp.id.clone()),
            Some((comp, d)) => {
                log::debug!(
                    "probe {}: nearest target {} at {d:.2} exceeds tolerance",
                    probe.id,
                    comp.id
                );
                TargetResolution::Unresolved
            }
            None => TargetResolution::Unresolved,
        }
    }
}

/// Resolve every probe with the default snap tolerance.
pub fn resolve_probes(model: &SchematicModel, compiled: &CompileOutput) -> ProbeResolution {
    ProbeResolver::new().resolve(model, compiled)
}
