//! Schematic model validation.

use std::collections::HashSet;

use crate::error::{Result, SchemError};

use super::SchematicModel;

/// Validate a schematic model before it enters the engine.
///
/// Checks:
/// - Component ids are unique (they are the join key of every index)
/// - Wire ids are unique
/// - Pin ids are unique within a component
/// - Coordinates are finite
pub fn validate_model(model: &SchematicModel) -> Result<()> {
    let mut component_ids = HashSet::new();
    for comp in &model.components {
        if comp.id.trim().is_empty() {
            return Err(SchemError::invalid_model(&comp.id, "component id is empty"));
        }
        if !component_ids.insert(comp.id.as_str()) {
            return Err(SchemError::DuplicateComponent {
                id: comp.id.clone(),
            });
        }

        let mut pin_ids = HashSet::new();
        for pin in &comp.pins {
            if !pin_ids.insert(pin.id.as_str()) {
                return Err(SchemError::invalid_model(
                    &comp.id,
                    format!("duplicate pin id '{}'", pin.id),
                ));
            }
            if !pin.x.is_finite() || !pin.y.is_finite() {
                return Err(SchemError::invalid_model(
                    &comp.id,
                    format!("pin '{}' has a non-finite coordinate", pin.id),
                ));
            }
        }
    }

    let mut wire_ids = HashSet::new();
    for wire in &model.wires {
        if !wire_ids.insert(wire.id.as_str()) {
            return Err(SchemError::DuplicateWire {
                id: wire.id.clone(),
            });
        }
        if wire.points.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(SchemError::invalid_model(
                &wire.id,
                "wire has a non-finite coordinate",
            ));
        }
    }

    Ok(())
}
