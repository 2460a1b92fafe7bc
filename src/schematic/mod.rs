//! Schematic model and net extraction.
//!
//! The [`SchematicModel`] is owned by the external editor; the engine only
//! reads it. [`NetGraph`] derives electrical connectivity from it and is
//! recomputed from scratch on every build.

mod graph;
mod types;
mod validate;

pub use graph::{Net, NetGraph, PinRef, GROUND_NET};
pub use types::*;
pub use validate::validate_model;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemError};

/// The schematic as drawn: placed components and wires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchematicModel {
    #[serde(default)]
    pub components: Vec<Component>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl SchematicModel {
    /// Create a model from components and wires.
    pub fn new(components: Vec<Component>, wires: Vec<Wire>) -> Self {
        Self { components, wires }
    }

    /// Decode and validate a model from its JSON form.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self =
            serde_json::from_str(json).map_err(|source| SchemError::ModelDecode { source })?;
        validate_model(&model)?;
        Ok(model)
    }

    /// Read a model from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SchemError::file_read(path, e))?;
        Self::from_json(&content)
    }

    /// Find a component by id.
    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    /// Find a wire by id.
    pub fn wire(&self, id: &str) -> Option<&Wire> {
        self.wires.iter().find(|w| w.id == id)
    }
}
