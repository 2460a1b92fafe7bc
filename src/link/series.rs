//! Ordering of result traces for plots and tables.

use std::collections::HashMap;

use serde::Serialize;

use crate::probe::ProbeResolution;
use crate::signal::{encode, SignalToken};

/// One displayable result trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Series {
    pub token: SignalToken,
    /// Trace name as reported by the simulator
    pub name: String,
    pub label: String,
}

/// Display label of a signal: the observing probe's label, if any.
pub fn series_label(token: &SignalToken, probes: &ProbeResolution) -> String {
    probes
        .label_for(token)
        .map(str::to_string)
        .unwrap_or_else(|| token.label())
}

/// Order result traces for display.
///
/// With a restriction only the restricted signals are shown, in restriction
/// order. Otherwise probe signals come first, then the voltages of
/// label-named nets, then every remaining trace in result order. Trace
/// tokens found in `aliases` are replaced by their mapped token first.
pub fn order_series(
    trace_names: &[&str],
    probes: &ProbeResolution,
    named_nets: &[String],
    restriction: &[SignalToken],
    aliases: &HashMap<SignalToken, SignalToken>,
) -> Vec<Series> {
    let mut traces: Vec<(SignalToken, &str)> = Vec::new();
    for &name in trace_names {
        if let Some(token) = encode(name) {
            let token = aliases.get(&token).cloned().unwrap_or(token);
            if !traces.iter().any(|(t, _)| *t == token) {
                traces.push((token, name));
            }
        }
    }

    let preferred: Vec<SignalToken> = if restriction.is_empty() {
        let probe_signals = probes
            .descriptors
            .iter()
            .filter(|d| !d.invalid)
            .flat_map(|d| d.signals().cloned());
        let net_voltages = named_nets.iter().map(|net| SignalToken::voltage(net));
        let rest = traces.iter().map(|(token, _)| token.clone());
        probe_signals.chain(net_voltages).chain(rest).collect()
    } else {
        restriction.to_vec()
    };

    let mut series: Vec<Series> = Vec::new();
    for token in preferred {
        if series.iter().any(|s| s.token == token) {
            continue;
        }
        if let Some((_, name)) = traces.iter().find(|(t, _)| *t == token) {
            series.push(Series {
                label: series_label(&token, probes),
                name: name.to_string(),
                token,
            });
        }
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlist::{compile, AnalysisConfig, AnalysisKind};
    use crate::probe::resolve_probes;
    use crate::schematic::{Component, ComponentType, SchematicModel, Wire};

    fn probes() -> ProbeResolution {
        let model = SchematicModel::new(
            vec![
                Component::new("V1", ComponentType::VoltageSource, "5")
                    .with_pin("p", 0.0, 0.0)
                    .with_pin("n", 0.0, 4.0),
                Component::new("R1", ComponentType::Resistor, "1k")
                    .with_pin("1", 0.0, 0.0)
                    .with_pin("2", 4.0, 0.0),
                Component::new("R2", ComponentType::Resistor, "1k")
                    .with_pin("1", 4.0, 0.0)
                    .with_pin("2", 4.0, 4.0),
                Component::new("G1", ComponentType::Ground, "").with_pin("1", 0.0, 4.0),
                Component::new("PI1", ComponentType::CurrentProbe, "V1").with_pin("1", 20.0, 20.0),
            ],
            vec![Wire::new("w1", &[(0.0, 4.0), (4.0, 4.0)])],
        );
        let compiled = compile(&model, AnalysisKind::Op, &AnalysisConfig::default(), "");
        resolve_probes(&model, &compiled)
    }

    fn tokens(series: &[Series]) -> Vec<String> {
        series.iter().map(|s| s.token.to_string()).collect()
    }

    #[test]
    fn test_preferred_order() {
        let names = ["v(n1)", "v(out)", "i(v1)", "V(n2)"];
        let series = order_series(&names, &probes(), &["out".to_string()], &[], &HashMap::new());
        assert_eq!(tokens(&series), vec!["i:v1", "v:out", "v:n1", "v:n2"]);
        assert_eq!(series[0].label, "I(V1)");
        assert_eq!(series[0].name, "i(v1)");
        assert_eq!(series[3].label, "V(n2)");
    }

    #[test]
    fn test_restriction() {
        let names = ["v(n1)", "v(out)", "v1#branch"];
        let restriction = [SignalToken::voltage("out"), SignalToken::voltage("gone")];
        let series = order_series(&names, &probes(), &[], &restriction, &HashMap::new());
        assert_eq!(tokens(&series), vec!["v:out"]);
    }

    #[test]
    fn test_duplicate_spellings() {
        let names = ["v(out)", "V(OUT)", "v(out,0)"];
        let series = order_series(&names, &ProbeResolution::default(), &[], &[], &HashMap::new());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "v(out)");
    }

    #[test]
    fn test_aliased_device_current() {
        let aliases = HashMap::from([(SignalToken::current("rload"), SignalToken::current("load"))]);
        let restriction = [SignalToken::current("load")];
        let series = order_series(&["@rload[i]"], &ProbeResolution::default(), &[], &restriction, &aliases);
        assert_eq!(tokens(&series), vec!["i:load"]);
        assert_eq!(series[0].name, "@rload[i]");
    }
}
