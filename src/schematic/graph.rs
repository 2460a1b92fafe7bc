//! Net extraction from placed components and wires.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use super::types::{ComponentType, GridPoint};
use super::SchematicModel;

/// Name of the ground net.
pub const GROUND_NET: &str = "0";

/// A reference to one pin of one component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRef {
    pub component_id: String,
    pub pin_id: String,
}

/// A maximal set of connected grid points and the pins sitting on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Net {
    /// Display name (`"0"` for ground)
    pub name: String,
    /// Grid points belonging to this net, sorted
    pub points: Vec<GridPoint>,
    /// Pins on this net in model order
    pub pins: Vec<PinRef>,
}

impl Net {
    /// Check if this is the ground net.
    pub fn is_ground(&self) -> bool {
        self.name == GROUND_NET
    }

    /// Ids of the components with a pin on this net, without repeats.
    pub fn component_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.pins
            .iter()
            .map(|p| p.component_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

/// Connectivity of a schematic.
///
/// Built from scratch by [`NetGraph::build`]; nothing is cached between
/// builds.
#[derive(Debug, Clone, Default)]
pub struct NetGraph {
    nets: Vec<Net>,
    point_net: HashMap<GridPoint, usize>,
    /// Component id -> (pin id, net index) in pin order
    component_pins: HashMap<String, Vec<(String, usize)>>,
}

/// Union-find over grid point indices.
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Normalize net label text into a netlist-safe node name.
fn label_name(text: &str) -> Option<String> {
    let name = text.split_whitespace().collect::<Vec<_>>().join("_");
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

impl NetGraph {
    /// Compute the nets of a schematic.
    ///
    /// Every distinct grid point touched by a wire vertex or a pin is a node.
    /// Wire segments, points lying inside another wire's segment, shared
    /// `NET` label text and `GND` symbols connect nodes.
    pub fn build(model: &SchematicModel) -> Self {
        // Intern grid points in first-encounter order: pins, then wires
        let mut index: HashMap<GridPoint, usize> = HashMap::new();
        let mut order: Vec<GridPoint> = Vec::new();
        let mut intern = |p: GridPoint| -> usize {
            *index.entry(p).or_insert_with(|| {
                order.push(p);
                order.len() - 1
            })
        };

        let mut component_pins: HashMap<String, Vec<(String, usize)>> = HashMap::new();
        for comp in &model.components {
            if comp.kind == ComponentType::Text {
                continue;
            }
            let pins = comp
                .pins
                .iter()
                .map(|pin| (pin.id.clone(), intern(pin.position().grid())))
                .collect();
            component_pins.insert(comp.id.clone(), pins);
        }
        for wire in &model.wires {
            for point in &wire.points {
                intern(point.grid());
            }
        }

        let mut sets = DisjointSet::new(order.len());
        let segments: Vec<(GridPoint, GridPoint)> =
            model.wires.iter().flat_map(|w| w.segments()).collect();
        for (a, b) in &segments {
            sets.union(index[a], index[b]);
        }

        // T-junctions: any node sitting inside a segment joins it
        for (a, b) in &segments {
            for (i, p) in order.iter().enumerate() {
                if p.lies_inside(*a, *b) {
                    sets.union(i, index[a]);
                }
            }
        }

        // Labels are global: same text (any case) means same net, all
        // grounds are one
        let mut label_roots: HashMap<String, usize> = HashMap::new();
        let mut ground_root: Option<usize> = None;
        for comp in &model.components {
            let text = match comp.kind {
                ComponentType::Ground => Some(GROUND_NET.to_string()),
                ComponentType::NetLabel => label_name(comp.trimmed_value()),
                _ => None,
            };
            let Some(text) = text else { continue };
            for (_, node) in &component_pins[&comp.id] {
                if text == GROUND_NET {
                    match ground_root {
                        Some(root) => sets.union(root, *node),
                        None => ground_root = Some(*node),
                    }
                } else {
                    // Node names are case-insensitive in the simulator
                    match label_roots.get(&text.to_ascii_lowercase()) {
                        Some(root) => sets.union(*root, *node),
                        None => {
                            label_roots.insert(text.to_ascii_lowercase(), *node);
                        }
                    }
                }
            }
        }

        // Assign net indices by first appearance of each root
        let mut root_net: HashMap<usize, usize> = HashMap::new();
        let mut nets: Vec<Net> = Vec::new();
        let mut point_net = HashMap::with_capacity(order.len());
        for (i, p) in order.iter().enumerate() {
            let root = sets.find(i);
            let net = *root_net.entry(root).or_insert_with(|| {
                nets.push(Net {
                    name: String::new(),
                    points: Vec::new(),
                    pins: Vec::new(),
                });
                nets.len() - 1
            });
            nets[net].points.push(*p);
            point_net.insert(*p, net);
        }
        for net in &mut nets {
            net.points.sort();
        }

        let component_pins: HashMap<String, Vec<(String, usize)>> = component_pins
            .into_iter()
            .map(|(id, pins)| {
                let pins = pins
                    .into_iter()
                    .map(|(pin, node)| (pin, point_net[&order[node]]))
                    .collect();
                (id, pins)
            })
            .collect();

        // Pins in model order, then names: ground, first label, generated
        let mut names: Vec<Option<String>> = vec![None; nets.len()];
        for comp in &model.components {
            let Some(pins) = component_pins.get(&comp.id) else { continue };
            for (pin_id, net) in pins {
                nets[*net].pins.push(PinRef {
                    component_id: comp.id.clone(),
                    pin_id: pin_id.clone(),
                });
                let label = match comp.kind {
                    ComponentType::Ground => Some(GROUND_NET.to_string()),
                    ComponentType::NetLabel => label_name(comp.trimmed_value()),
                    _ => None,
                };
                if let Some(label) = label {
                    let slot = &mut names[*net];
                    let is_ground = slot.as_deref() == Some(GROUND_NET);
                    if slot.is_none() || (label == GROUND_NET && !is_ground) {
                        *slot = Some(label);
                    }
                }
            }
        }

        let taken: HashSet<String> = names
            .iter()
            .flatten()
            .map(|n| n.to_ascii_lowercase())
            .collect();
        let mut counter = 0usize;
        for (net, name) in nets.iter_mut().zip(names) {
            net.name = match name {
                Some(name) => name,
                None => loop {
                    counter += 1;
                    let candidate = format!("n{counter}");
                    if !taken.contains(&candidate) {
                        break candidate;
                    }
                },
            };
        }

        log::debug!(
            "net graph: {} nodes, {} segments, {} nets",
            order.len(),
            segments.len(),
            nets.len()
        );

        Self {
            nets,
            point_net,
            component_pins,
        }
    }

    /// All nets in first-encounter order.
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }

    /// Find a net by name (case-insensitive).
    pub fn net(&self, name: &str) -> Option<&Net> {
        self.nets.iter().find(|n| n.name.eq_ignore_ascii_case(name))
    }

    /// The net containing a grid point.
    pub fn net_at(&self, point: GridPoint) -> Option<&Net> {
        self.point_net.get(&point).map(|&i| &self.nets[i])
    }

    /// The net of one pin.
    pub fn pin_net(&self, component_id: &str, pin_id: &str) -> Option<&Net> {
        self.component_pins
            .get(component_id)?
            .iter()
            .find(|(pin, _)| pin == pin_id)
            .map(|(_, net)| &self.nets[*net])
    }

    /// Net names of a component's pins in pin order.
    pub fn component_nets(&self, component_id: &str) -> Vec<&str> {
        self.component_pins
            .get(component_id)
            .map(|pins| {
                pins.iter()
                    .map(|(_, net)| self.nets[*net].name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Check whether the schematic has a ground reference.
    pub fn has_ground(&self) -> bool {
        self.nets.iter().any(Net::is_ground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schematic::{Component, Wire};

    fn resistor(id: &str, a: (f64, f64), b: (f64, f64)) -> Component {
        Component::new(id, ComponentType::Resistor, "1k")
            .with_pin("1", a.0, a.1)
            .with_pin("2", b.0, b.1)
    }

    fn ground(id: &str, x: f64, y: f64) -> Component {
        Component::new(id, ComponentType::Ground, "").with_pin("1", x, y)
    }

    fn label(id: &str, text: &str, x: f64, y: f64) -> Component {
        Component::new(id, ComponentType::NetLabel, text).with_pin("1", x, y)
    }

    #[test]
    fn test_wire_joins_pins() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                resistor("R2", (5.0, 0.0), (7.0, 0.0)),
                ground("G1", 7.0, 0.0),
            ],
            vec![Wire::new("w1", &[(2.0, 0.0), (3.0, 0.0), (3.0, 1.0), (5.0, 1.0), (5.0, 0.0)])],
        );
        let graph = NetGraph::build(&model);
        let mid = graph.pin_net("R1", "2").unwrap();
        assert_eq!(mid.name, graph.pin_net("R2", "1").unwrap().name);
        assert_eq!(graph.pin_net("R2", "2").unwrap().name, GROUND_NET);
        assert_ne!(graph.pin_net("R1", "1").unwrap().name, mid.name);
        assert!(graph.has_ground());
    }

    #[test]
    fn test_unwired_pin_is_singleton() {
        let model = SchematicModel::new(vec![resistor("R1", (0.0, 0.0), (2.0, 0.0))], vec![]);
        let graph = NetGraph::build(&model);
        assert_eq!(graph.nets().len(), 2);
        assert_eq!(graph.component_nets("R1"), vec!["n1", "n2"]);
    }

    #[test]
    fn test_coincident_pins_share_net() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                resistor("R2", (2.1, 0.0), (4.0, 0.0)),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        assert_eq!(graph.nets().len(), 3);
        assert_eq!(graph.component_nets("R1")[1], graph.component_nets("R2")[0]);
    }

    #[test]
    fn test_label_names_net_first_wins() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                label("N1", "out", 2.0, 0.0),
                label("N2", "vout", 2.0, 0.0),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        assert_eq!(graph.pin_net("R1", "2").unwrap().name, "out");
    }

    #[test]
    fn test_ground_beats_label() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                label("N1", "out", 2.0, 0.0),
                ground("G1", 2.0, 0.0),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        assert_eq!(graph.pin_net("R1", "2").unwrap().name, GROUND_NET);
    }

    #[test]
    fn test_same_label_text_merges_nets() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                resistor("R2", (10.0, 0.0), (12.0, 0.0)),
                label("N1", "mid", 2.0, 0.0),
                label("N2", "mid", 10.0, 0.0),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        let net = graph.net("mid").unwrap();
        assert_eq!(net.component_ids(), vec!["R1", "R2", "N1", "N2"]);
    }

    #[test]
    fn test_label_text_merges_regardless_of_case() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                resistor("R2", (10.0, 0.0), (12.0, 0.0)),
                label("N1", "Out", 2.0, 0.0),
                label("N2", "out", 10.0, 0.0),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        let a = graph.pin_net("R1", "2").unwrap();
        let b = graph.pin_net("R2", "1").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.name, "Out");
    }

    #[test]
    fn test_t_junction_connects_but_crossing_does_not() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (0.0, 2.0)),
                resistor("R2", (4.0, 0.0), (4.0, 2.0)),
                resistor("R3", (2.0, -4.0), (2.0, -2.0)),
            ],
            vec![
                Wire::new("w1", &[(0.0, 0.0), (4.0, 0.0)]),
                // ends on the middle of w1
                Wire::new("w2", &[(2.0, 0.0), (2.0, -2.0)]),
                // crosses w1 without ending on it
                Wire::new("w3", &[(1.0, 1.0), (1.0, -1.0)]),
            ],
        );
        let graph = NetGraph::build(&model);
        let top = graph.pin_net("R1", "1").unwrap();
        assert_eq!(top.name, graph.pin_net("R2", "1").unwrap().name);
        assert_eq!(top.name, graph.pin_net("R3", "2").unwrap().name);
        assert!(graph.net_at(GridPoint::new(1, 1)).unwrap().name != top.name);
    }

    #[test]
    fn test_generated_names_skip_labels() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                label("N1", "n1", 2.0, 0.0),
            ],
            vec![],
        );
        let graph = NetGraph::build(&model);
        assert_eq!(graph.component_nets("R1"), vec!["n2", "n1"]);
    }

    #[test]
    fn test_nets_partition_points() {
        let model = SchematicModel::new(
            vec![
                resistor("R1", (0.0, 0.0), (2.0, 0.0)),
                resistor("R2", (2.0, 0.0), (2.0, 4.0)),
                ground("G1", 0.0, 0.0),
            ],
            vec![
                Wire::new("w1", &[(2.0, 4.0), (6.0, 4.0)]),
                Wire::new("w2", &[(8.0, 8.0), (9.0, 8.0)]),
            ],
        );
        let graph = NetGraph::build(&model);
        let mut seen = HashSet::new();
        for net in graph.nets() {
            for p in &net.points {
                assert!(seen.insert(*p), "point {p} appears in two nets");
                assert_eq!(graph.net_at(*p).unwrap().name, net.name);
            }
        }
        assert_eq!(seen.len(), 6);
    }
}
