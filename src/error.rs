//! Error types for the schematic simulation engine.
//!
//! Only model ingestion and the I/O frontends return [`SchemError`].
//! Compilation, probe resolution, index queries and highlighting report
//! their failure modes as data (warning lists, `invalid` flags, empty sets).

use thiserror::Error;

/// Result type alias using [`SchemError`].
pub type Result<T> = std::result::Result<T, SchemError>;

/// Unified error type for all engine operations that can fail.
#[derive(Error, Debug)]
pub enum SchemError {
    // ============ Model Errors ============
    /// Schematic model JSON could not be decoded
    #[error("Failed to decode schematic model: {source}")]
    ModelDecode {
        #[source]
        source: serde_json::Error,
    },

    /// Analysis configuration JSON could not be decoded
    #[error("Failed to decode analysis configuration: {source}")]
    ConfigDecode {
        #[source]
        source: serde_json::Error,
    },

    /// Two components share an id
    #[error("Duplicate component id '{id}'")]
    DuplicateComponent { id: String },

    /// Two wires share an id
    #[error("Duplicate wire id '{id}'")]
    DuplicateWire { id: String },

    /// Structurally invalid model element
    #[error("Invalid model element '{id}': {message}")]
    InvalidModel { id: String, message: String },

    /// Unknown analysis kind name
    #[error("Unknown analysis kind '{name}' (expected op, dc, tran or ac)")]
    UnknownAnalysis { name: String },

    // ============ Engine Errors ============
    /// An operation needed a compiled netlist that does not exist yet
    #[error("Engine has no compiled netlist; call compile() first")]
    NotCompiled,

    // ============ I/O Errors ============
    /// Error reading an input file
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error serializing an output payload
    #[error("Failed to encode output: {source}")]
    Encode {
        #[source]
        source: serde_json::Error,
    },

    // ============ WASM Errors ============
    /// WASM-specific error
    #[cfg(feature = "wasm")]
    #[error("WASM error: {message}")]
    WasmError { message: String },
}

impl SchemError {
    /// Create an invalid model error
    pub fn invalid_model(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidModel {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a file read error
    pub fn file_read(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::FileReadError {
            path: path.display().to_string(),
            source,
        }
    }
}
