//! Highlight state shared by the schematic, plots, tables and netlist text.
//!
//! Every input source reports signal tokens. The coordinator keeps one
//! selection and one hover set, projects them onto schematic ids through a
//! [`TraceLinkIndex`] and publishes one [`MergedHighlight`] built by the pure
//! [`merge`] function.

use std::collections::BTreeSet;

use serde::Serialize;

use super::index::{TargetIds, TraceLinkIndex};
use crate::signal::SignalToken;

/// Where a highlight input came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightSource {
    Schematic,
    Plot,
    Table,
}

/// Persistent selection or transient hover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    Selection,
    Hover,
}

/// Keyboard modifiers held during a click.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClickModifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub meta: bool,
}

impl ClickModifiers {
    pub const NONE: Self = Self {
        shift: false,
        ctrl: false,
        meta: false,
    };

    pub const SHIFT: Self = Self {
        shift: true,
        ctrl: false,
        meta: false,
    };

    /// Any modifier makes a click toggle instead of replace.
    pub fn is_additive(&self) -> bool {
        self.shift || self.ctrl || self.meta
    }
}

/// Schematic ids implicated by one input, with how to draw them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightTargetSet {
    pub source: HighlightSource,
    pub mode: HighlightMode,
    pub color: String,
    #[serde(flatten)]
    pub targets: TargetIds,
}

/// One drawable layer of a merged highlight.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightEntry {
    pub mode: HighlightMode,
    pub color: String,
    pub component_ids: BTreeSet<String>,
    pub wire_ids: BTreeSet<String>,
}

/// The payload handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedHighlight {
    pub component_ids: BTreeSet<String>,
    pub wire_ids: BTreeSet<String>,
    pub entries: Vec<HighlightEntry>,
}

impl MergedHighlight {
    pub fn is_empty(&self) -> bool {
        self.component_ids.is_empty() && self.wire_ids.is_empty()
    }

    /// All highlighted ids as one target set.
    pub fn targets(&self) -> TargetIds {
        TargetIds {
            component_ids: self.component_ids.clone(),
            wire_ids: self.wire_ids.clone(),
        }
    }
}

/// Merge target sets into one highlight.
///
/// The result depends only on the set of inputs, never on their order.
/// Selected ids are drawn in the selection colour; hover layers drop ids
/// that are already selected.
pub fn merge(sets: &[HighlightTargetSet]) -> MergedHighlight {
    let mut selected = TargetIds::default();
    for set in sets.iter().filter(|s| s.mode == HighlightMode::Selection) {
        selected.extend(&set.targets);
    }

    let mut entries: Vec<HighlightEntry> = Vec::new();
    let mut all = TargetIds::default();
    for set in sets {
        let mut targets = set.targets.clone();
        if set.mode == HighlightMode::Hover {
            targets.subtract(&selected);
        }
        if targets.is_empty() {
            continue;
        }
        all.extend(&targets);

        // Layers with the same mode and colour collapse into one
        match entries
            .iter_mut()
            .find(|e| e.mode == set.mode && e.color == set.color)
        {
            Some(entry) => {
                entry.component_ids.extend(targets.component_ids);
                entry.wire_ids.extend(targets.wire_ids);
            }
            None => entries.push(HighlightEntry {
                mode: set.mode,
                color: set.color.clone(),
                component_ids: targets.component_ids,
                wire_ids: targets.wire_ids,
            }),
        }
    }
    entries.sort();

    MergedHighlight {
        component_ids: all.component_ids,
        wire_ids: all.wire_ids,
        entries,
    }
}

/// Selection and hover state for every highlight input.
#[derive(Debug, Clone)]
pub struct HighlightCoordinator {
    selection: Vec<SignalToken>,
    selection_source: HighlightSource,
    hover: Vec<SignalToken>,
    hover_source: HighlightSource,
    /// Ids picked directly on the canvas
    canvas_selection: TargetIds,
    canvas_hover: TargetIds,
    selection_color: String,
    hover_color: String,
}

impl Default for HighlightCoordinator {
    fn default() -> Self {
        Self::new(crate::engine::DEFAULT_SELECTION_COLOR, crate::engine::DEFAULT_HOVER_COLOR)
    }
}

fn push_unique(tokens: &mut Vec<SignalToken>, token: &SignalToken) {
    if !tokens.contains(token) {
        tokens.push(token.clone());
    }
}

fn toggle(tokens: &mut Vec<SignalToken>, token: &SignalToken) {
    match tokens.iter().position(|t| t == token) {
        Some(i) => {
            tokens.remove(i);
        }
        None => tokens.push(token.clone()),
    }
}

impl HighlightCoordinator {
    /// Create a coordinator drawing with the given colours.
    pub fn new(selection_color: impl Into<String>, hover_color: impl Into<String>) -> Self {
        Self {
            selection: Vec::new(),
            selection_source: HighlightSource::Schematic,
            hover: Vec::new(),
            hover_source: HighlightSource::Schematic,
            canvas_selection: TargetIds::default(),
            canvas_hover: TargetIds::default(),
            selection_color: selection_color.into(),
            hover_color: hover_color.into(),
        }
    }

    /// Selected tokens in click order.
    pub fn selection(&self) -> &[SignalToken] {
        &self.selection
    }

    /// Hovered tokens that are not also selected.
    pub fn hover(&self) -> Vec<SignalToken> {
        self.hover
            .iter()
            .filter(|t| !self.selection.contains(t))
            .cloned()
            .collect()
    }

    pub fn is_selected(&self, token: &SignalToken) -> bool {
        self.selection.contains(token)
    }

    /// Ids selected directly on the canvas.
    pub fn canvas_selection(&self) -> &TargetIds {
        &self.canvas_selection
    }

    /// A plot trace or table row was clicked.
    ///
    /// A plain click replaces the selection, a modified click toggles the
    /// clicked tokens. Clicking nothing clears everything.
    pub fn click(&mut self, source: HighlightSource, tokens: &[SignalToken], modifiers: ClickModifiers) {
        if tokens.is_empty() {
            if !modifiers.is_additive() {
                self.clear_selection();
            }
            return;
        }
        if modifiers.is_additive() {
            for token in tokens {
                toggle(&mut self.selection, token);
            }
        } else {
            self.selection.clear();
            self.canvas_selection = TargetIds::default();
            for token in tokens {
                push_unique(&mut self.selection, token);
            }
        }
        self.selection_source = source;
    }

    /// A plot trace or table row is hovered; an empty list ends the hover.
    pub fn hover_signals(&mut self, source: HighlightSource, tokens: &[SignalToken]) {
        self.hover.clear();
        self.canvas_hover = TargetIds::default();
        for token in tokens {
            push_unique(&mut self.hover, token);
        }
        self.hover_source = source;
    }

    /// Components or wires were clicked on the canvas.
    pub fn select_schematic(
        &mut self,
        index: &TraceLinkIndex,
        targets: &TargetIds,
        modifiers: ClickModifiers,
    ) {
        if targets.is_empty() {
            if !modifiers.is_additive() {
                self.clear_selection();
            }
            return;
        }
        if modifiers.is_additive() {
            self.canvas_selection.toggle(targets);
            for token in index.tokens_for_targets(targets) {
                toggle(&mut self.selection, &token);
            }
        } else {
            self.canvas_selection = targets.clone();
            self.selection = index.tokens_for_targets(targets);
        }
        self.selection_source = HighlightSource::Schematic;
    }

    /// Components or wires are hovered on the canvas.
    pub fn hover_schematic(&mut self, index: &TraceLinkIndex, targets: &TargetIds) {
        self.hover = index.tokens_for_targets(targets);
        self.canvas_hover = targets.clone();
        self.hover_source = HighlightSource::Schematic;
    }

    /// Drop the selection, including the canvas selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
        self.canvas_selection = TargetIds::default();
    }

    pub fn clear_hover(&mut self) {
        self.hover.clear();
        self.canvas_hover = TargetIds::default();
    }

    /// Clear all highlight state.
    pub fn reset(&mut self) {
        self.clear_selection();
        self.clear_hover();
    }

    /// Current inputs projected onto schematic ids.
    pub fn target_sets(&self, index: &TraceLinkIndex) -> Vec<HighlightTargetSet> {
        let mut sets = Vec::new();

        let mut selected = self.canvas_selection.clone();
        selected.extend(&index.resolve_targets_for_selection(&self.selection));
        if !selected.is_empty() {
            sets.push(HighlightTargetSet {
                source: self.selection_source,
                mode: HighlightMode::Selection,
                color: self.selection_color.clone(),
                targets: selected,
            });
        }

        let mut hovered = self.canvas_hover.clone();
        for token in self.hover() {
            hovered.extend(&index.resolve_targets_for_signal(&token));
        }
        if !hovered.is_empty() {
            sets.push(HighlightTargetSet {
                source: self.hover_source,
                mode: HighlightMode::Hover,
                color: self.hover_color.clone(),
                targets: hovered,
            });
        }
        sets
    }

    /// The merged highlight for renderers.
    pub fn render(&self, index: &TraceLinkIndex) -> MergedHighlight {
        merge(&self.target_sets(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(mode: HighlightMode, color: &str, components: &[&str], wires: &[&str]) -> HighlightTargetSet {
        HighlightTargetSet {
            source: HighlightSource::Plot,
            mode,
            color: color.to_string(),
            targets: TargetIds::new(components.iter().copied(), wires.iter().copied()),
        }
    }

    #[test]
    fn test_merge_is_order_independent() {
        let hover = set(HighlightMode::Hover, "#888", &["A"], &["w1"]);
        let selection = set(HighlightMode::Selection, "#f80", &["B"], &[]);
        let ab = merge(&[hover.clone(), selection.clone()]);
        let ba = merge(&[selection, hover]);
        assert_eq!(ab, ba);
        assert_eq!(ab.entries.len(), 2);
        assert_eq!(ab.entries[0].mode, HighlightMode::Selection);
        assert!(ab.component_ids.contains("A") && ab.component_ids.contains("B"));
    }

    #[test]
    fn test_merge_is_associative() {
        let a = set(HighlightMode::Selection, "#f80", &["A"], &[]);
        let b = set(HighlightMode::Hover, "#888", &["B"], &[]);
        let c = set(HighlightMode::Selection, "#f80", &["C"], &["w2"]);
        let whole = merge(&[a.clone(), b.clone(), c.clone()]);
        assert_eq!(whole, merge(&[c, a, b]));
        assert_eq!(whole.entries.len(), 2);
    }

    #[test]
    fn test_merge_selection_wins_over_hover() {
        let merged = merge(&[
            set(HighlightMode::Hover, "#888", &["A", "B"], &[]),
            set(HighlightMode::Selection, "#f80", &["A"], &[]),
        ]);
        let hover = merged
            .entries
            .iter()
            .find(|e| e.mode == HighlightMode::Hover)
            .unwrap();
        assert_eq!(hover.component_ids, BTreeSet::from(["B".to_string()]));
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge(&[]).is_empty());
        assert!(merge(&[set(HighlightMode::Hover, "#888", &[], &[])]).entries.is_empty());
    }

    #[test]
    fn test_click_replace_and_toggle() {
        let mut hl = HighlightCoordinator::default();
        let a = SignalToken::voltage("a");
        let b = SignalToken::voltage("b");

        hl.click(HighlightSource::Plot, &[a.clone()], ClickModifiers::NONE);
        hl.click(HighlightSource::Plot, &[b.clone()], ClickModifiers::NONE);
        assert_eq!(hl.selection(), &[b.clone()]);

        hl.click(HighlightSource::Plot, &[a.clone()], ClickModifiers::SHIFT);
        assert_eq!(hl.selection(), &[b.clone(), a.clone()]);

        hl.click(HighlightSource::Table, &[b.clone()], ClickModifiers::SHIFT);
        assert_eq!(hl.selection(), &[a]);

        hl.click(HighlightSource::Plot, &[], ClickModifiers::NONE);
        assert!(hl.selection().is_empty());
    }

    #[test]
    fn test_hover_suppressed_by_selection() {
        let mut hl = HighlightCoordinator::default();
        let a = SignalToken::voltage("a");
        let b = SignalToken::voltage("b");
        hl.click(HighlightSource::Plot, &[a.clone()], ClickModifiers::NONE);
        hl.hover_signals(HighlightSource::Plot, &[a.clone(), b.clone()]);
        assert_eq!(hl.hover(), vec![b]);
        hl.clear_hover();
        assert!(hl.hover().is_empty());
        assert!(hl.is_selected(&a));
    }
}
