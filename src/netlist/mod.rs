//! Netlist compilation.
//!
//! Turns a [`SchematicModel`](crate::schematic::SchematicModel) into the
//! text handed to the simulator, together with the bookkeeping needed to
//! map every line back to the schematic.
//!
//! # Netlist Format
//!
//! ```text
//! netlist   = { preamble } { element } [ analysis ] end
//! element   = name node node value
//! analysis  = ".op" | ".dc" src start stop step
//!           | ".tran" step stop [start] | ".ac" sweep points fstart fstop
//! end       = ".end"
//! ```
//!
//! Tokens are joined by single spaces, one statement per line.
//!
//! # Example
//!
//! ```text
//! V1 in 0 5
//! R1 in out 1k
//! C1 out 0 100n
//! .tran 1u 1m
//! .end
//! ```

mod analysis;
mod compiler;
mod lexer;

pub use analysis::{directive, AcConfig, AnalysisConfig, AnalysisKind, DcConfig, TranConfig};
pub use compiler::{
    compile, netlist_name, CompileOutput, ComponentLine, LineKind, LineMapEntry, LineSource,
    PinNet, END_DIRECTIVE,
};
pub use lexer::{normalize, parse_value, tokenize_line, Lexer, Token, TokenKind};
