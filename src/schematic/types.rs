//! Core types for the schematic model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A point in schematic space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Snap this point to the integer grid.
    pub fn grid(&self) -> GridPoint {
        GridPoint {
            x: self.x.round() as i64,
            y: self.y.round() as i64,
        }
    }

    /// Squared euclidean distance to another point.
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// A point snapped to the integer grid. Two schematic points connect
/// when they snap to the same grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPoint {
    pub x: i64,
    pub y: i64,
}

impl GridPoint {
    /// Create a new grid point.
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Check whether this point lies strictly inside the orthogonal
    /// segment `a`-`b` (endpoints excluded). Diagonal segments never match.
    pub fn lies_inside(&self, a: GridPoint, b: GridPoint) -> bool {
        if a.x == b.x && self.x == a.x {
            let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
            self.y > lo && self.y < hi
        } else if a.y == b.y && self.y == a.y {
            let (lo, hi) = (a.x.min(b.x), a.x.max(b.x));
            self.x > lo && self.x < hi
        } else {
            false
        }
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Component types placed on a schematic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    /// Resistor
    #[serde(rename = "R")]
    Resistor,
    /// Capacitor
    #[serde(rename = "C")]
    Capacitor,
    /// Inductor
    #[serde(rename = "L")]
    Inductor,
    /// Independent voltage source
    #[serde(rename = "V")]
    VoltageSource,
    /// Independent current source
    #[serde(rename = "I")]
    CurrentSource,
    /// Switch (closed or open)
    #[serde(rename = "SW")]
    Switch,
    /// Voltmeter (open circuit, measures across its pins)
    #[serde(rename = "VM")]
    Voltmeter,
    /// Ammeter (0 V source in series)
    #[serde(rename = "AM")]
    Ammeter,
    /// Single-ended voltage probe
    #[serde(rename = "PV")]
    VoltageProbe,
    /// Differential voltage probe
    #[serde(rename = "PD")]
    DifferentialProbe,
    /// Current probe
    #[serde(rename = "PI")]
    CurrentProbe,
    /// Power probe
    #[serde(rename = "PP")]
    PowerProbe,
    /// Ground symbol
    #[serde(rename = "GND")]
    Ground,
    /// Net label
    #[serde(rename = "NET")]
    NetLabel,
    /// Free text annotation
    #[serde(rename = "TEXT")]
    Text,
}

impl ComponentType {
    /// Parse a component type from its schematic code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "R" => Some(Self::Resistor),
            "C" => Some(Self::Capacitor),
            "L" => Some(Self::Inductor),
            "V" => Some(Self::VoltageSource),
            "I" => Some(Self::CurrentSource),
            "SW" => Some(Self::Switch),
            "VM" => Some(Self::Voltmeter),
            "AM" => Some(Self::Ammeter),
            "PV" => Some(Self::VoltageProbe),
            "PD" => Some(Self::DifferentialProbe),
            "PI" => Some(Self::CurrentProbe),
            "PP" => Some(Self::PowerProbe),
            "GND" => Some(Self::Ground),
            "NET" => Some(Self::NetLabel),
            "TEXT" => Some(Self::Text),
            _ => None,
        }
    }

    /// The schematic code of this type.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Resistor => "R",
            Self::Capacitor => "C",
            Self::Inductor => "L",
            Self::VoltageSource => "V",
            Self::CurrentSource => "I",
            Self::Switch => "SW",
            Self::Voltmeter => "VM",
            Self::Ammeter => "AM",
            Self::VoltageProbe => "PV",
            Self::DifferentialProbe => "PD",
            Self::CurrentProbe => "PI",
            Self::PowerProbe => "PP",
            Self::Ground => "GND",
            Self::NetLabel => "NET",
            Self::Text => "TEXT",
        }
    }

    /// Measurement-only types that never contribute a netlist line.
    pub fn is_probe(&self) -> bool {
        matches!(
            self,
            Self::VoltageProbe | Self::DifferentialProbe | Self::CurrentProbe | Self::PowerProbe
        )
    }

    /// Annotation types that name nets or carry text but no device.
    pub fn is_label(&self) -> bool {
        matches!(self, Self::Ground | Self::NetLabel | Self::Text)
    }

    /// Independent sources and source-like elements whose current is
    /// read from the element branch rather than a device accessor.
    pub fn has_branch_current(&self) -> bool {
        matches!(
            self,
            Self::VoltageSource | Self::CurrentSource | Self::Switch | Self::Ammeter
        )
    }

    /// Check if this type emits a netlist element line.
    pub fn is_electrical(&self) -> bool {
        !self.is_probe() && !self.is_label() && *self != Self::Voltmeter
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// An electrical pin on a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl Pin {
    /// Location of this pin.
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Check if this pin is called `label` by name or id (case-insensitive).
    pub fn is_named(&self, label: &str) -> bool {
        self.name.eq_ignore_ascii_case(label) || self.id.eq_ignore_ascii_case(label)
    }
}

/// A component placed on the schematic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_color: Option<String>,
}

impl Component {
    /// Create a component with no pins.
    pub fn new(id: impl Into<String>, kind: ComponentType, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            value: value.into(),
            pins: Vec::new(),
            rotation: 0.0,
            net_color: None,
        }
    }

    /// Add a pin at the given location.
    pub fn with_pin(mut self, id: impl Into<String>, x: f64, y: f64) -> Self {
        let id = id.into();
        self.pins.push(Pin {
            name: id.clone(),
            id,
            x,
            y,
        });
        self
    }

    /// Midpoint between the first two pins, if the component has two.
    pub fn midpoint(&self) -> Option<Point> {
        match self.pins.as_slice() {
            [a, b, ..] => Some(Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)),
            _ => None,
        }
    }

    /// The value with surrounding whitespace removed.
    pub fn trimmed_value(&self) -> &str {
        self.value.trim()
    }
}

/// A wire drawn as an orthogonal polyline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wire {
    pub id: String,
    #[serde(default)]
    pub points: Vec<Point>,
}

impl Wire {
    /// Create a wire through the given points.
    pub fn new(id: impl Into<String>, points: &[(f64, f64)]) -> Self {
        Self {
            id: id.into(),
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        }
    }

    /// Consecutive non-degenerate segments on the grid.
    pub fn segments(&self) -> impl Iterator<Item = (GridPoint, GridPoint)> + '_ {
        self.points
            .windows(2)
            .map(|w| (w[0].grid(), w[1].grid()))
            .filter(|(a, b)| a != b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_snapping() {
        assert_eq!(Point::new(1.4, -2.6).grid(), GridPoint::new(1, -3));
    }

    #[test]
    fn test_lies_inside() {
        let a = GridPoint::new(0, 0);
        let b = GridPoint::new(4, 0);
        assert!(GridPoint::new(2, 0).lies_inside(a, b));
        assert!(!GridPoint::new(0, 0).lies_inside(a, b));
        assert!(!GridPoint::new(2, 1).lies_inside(a, b));
        assert!(!GridPoint::new(1, 1).lies_inside(a, GridPoint::new(2, 2)));
    }

    #[test]
    fn test_component_type_codes() {
        for code in ["R", "PV", "GND", "am"] {
            let kind = ComponentType::from_code(code).unwrap();
            assert!(kind.code().eq_ignore_ascii_case(code));
        }
        assert!(ComponentType::from_code("Q").is_none());
        assert!(ComponentType::CurrentProbe.is_probe());
        assert!(!ComponentType::Voltmeter.is_electrical());
        assert!(ComponentType::Ammeter.is_electrical());
    }

    #[test]
    fn test_zero_length_segments_skipped() {
        let wire = Wire::new("w1", &[(0.0, 0.0), (0.2, 0.0), (3.0, 0.0)]);
        assert_eq!(wire.segments().count(), 1);
    }

    #[test]
    fn test_component_json_shape() {
        let json = r#"{"id":"R1","type":"R","value":"1k","netColor":"red",
            "pins":[{"id":"1","name":"1","x":0,"y":0},{"id":"2","x":2,"y":0}]}"#;
        let comp: Component = serde_json::from_str(json).unwrap();
        assert_eq!(comp.kind, ComponentType::Resistor);
        assert_eq!(comp.net_color.as_deref(), Some("red"));
        assert_eq!(comp.pins[1].name, "");
        approx::assert_relative_eq!(comp.midpoint().unwrap().x, 1.0);
    }
}
