//! Linking between simulator signals and the schematic.
//!
//! The [`TraceLinkIndex`] maps signal tokens onto component and wire ids and
//! back. The [`HighlightCoordinator`] keeps the selection and hover state of
//! every view and publishes a single [`MergedHighlight`]; the netlist text
//! view consumes it through [`highlight_netlist`].

mod highlight;
mod index;
mod series;
mod text;

pub use highlight::{
    merge, ClickModifiers, HighlightCoordinator, HighlightEntry, HighlightMode, HighlightSource,
    HighlightTargetSet, MergedHighlight,
};
pub use index::{TargetIds, TraceLinkIndex};
pub use series::{order_series, series_label, Series};
pub use text::{highlight_netlist, NetlistHighlight, TextSpan};
