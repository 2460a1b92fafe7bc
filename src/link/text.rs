//! Highlight ranges inside the compiled netlist text.

use std::collections::BTreeSet;

use serde::Serialize;

use super::index::{TargetIds, TraceLinkIndex};
use crate::netlist::{tokenize_line, CompileOutput, LineKind};

/// A highlighted character range on one line (1-based, end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSpan {
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

/// Lines and spans to highlight in the netlist text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetlistHighlight {
    /// Whole lines, 1-based
    pub lines: BTreeSet<usize>,
    pub spans: Vec<TextSpan>,
}

impl NetlistHighlight {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.spans.is_empty()
    }
}

/// Compute the netlist highlight for a set of schematic ids.
///
/// A component highlights its own line. A component without a line (a
/// probe or a label) highlights every line touching one of its nets. A wire
/// highlights only the node columns naming its net, never value columns.
pub fn highlight_netlist(
    compiled: &CompileOutput,
    index: &TraceLinkIndex,
    targets: &TargetIds,
) -> NetlistHighlight {
    let mut highlight = NetlistHighlight::default();
    let components = || {
        compiled
            .line_map
            .iter()
            .filter(|entry| entry.kind == LineKind::Component)
    };

    for id in &targets.component_ids {
        let own: Vec<usize> = components()
            .filter(|entry| entry.component_id.as_deref() == Some(id.as_str()))
            .map(|entry| entry.line)
            .collect();
        if !own.is_empty() {
            highlight.lines.extend(own);
            continue;
        }
        let nets = index.component_nets(id);
        highlight.lines.extend(
            components()
                .filter(|entry| entry.nets.iter().any(|n| nets.contains(n)))
                .map(|entry| entry.line),
        );
    }

    let text_lines: Vec<&str> = compiled.netlist_text.lines().collect();
    let wire_nets: BTreeSet<&str> = targets
        .wire_ids
        .iter()
        .filter_map(|id| index.wire_net(id))
        .collect();
    if !wire_nets.is_empty() {
        for entry in components() {
            let Some(text) = entry.line.checked_sub(1).and_then(|i| text_lines.get(i)) else {
                continue;
            };
            // Node tokens only: the element name comes first and the value
            // follows the last node
            let tokens = tokenize_line(text);
            for token in tokens.iter().skip(1).take(entry.nets.len()) {
                if wire_nets.iter().any(|net| token.text.eq_ignore_ascii_case(net)) {
                    highlight.spans.push(TextSpan {
                        line: entry.line,
                        start_column: token.column,
                        end_column: token.end_column(),
                    });
                }
            }
        }
    }
    highlight.spans.sort();
    highlight.spans.dedup();
    highlight
}
