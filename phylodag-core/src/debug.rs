//! Debug Export
//!
//! Read-only views of a finished graph for external tooling:
//!
//! - Graphviz `dot` text for a graph, a registry, or the instantiation of a
//!   specification tree.
//! - A [`GraphDescription`] (node records and indexed edges) that serializes
//!   to JSON.
//!
//! None of these functions change validity or cached values, with one
//! exception: the instantiation exports build the nodes they draw.
//!
//! # Dot Conventions
//!
//! Nodes are drawn in blue and keyed `N<id>`, registry keys are keyed
//! `K<index>`, and specifications are drawn in red and keyed `S<id>`. Edges
//! from a specification to the node it produced are green.

use std::collections::{HashSet, VecDeque};
use std::fmt::{self, Write};

use serde::{Deserialize, Serialize};

use crate::error::{GraphError, GraphResult};
use crate::graph::{Node, NodeId, NodeRef};
use crate::spec::{NodeSpecification, Registry, RegistryKey};

/// What to include in an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugOptions {
    /// Also visit dependents of reached nodes, not only their dependencies.
    pub follow_upward_links: bool,

    /// Label dependency edges with their slot index.
    pub show_dependency_index: bool,

    /// Draw the registry keys next to a replayed instantiation.
    pub show_registry_links: bool,
}

/// Escape the characters that are special in a dot record label.
fn escape_label(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '<' | '>' | '|' | '{' | '}' | ' ') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn node_key(id: NodeId) -> String {
    format!("N{}", id.raw())
}

fn spec_key(spec: &NodeSpecification) -> String {
    format!("S{:x}", spec.debug_id())
}

fn write_node<W: Write>(out: &mut W, node: &dyn Node) -> fmt::Result {
    let key = node_key(node.id());
    writeln!(
        out,
        "\t{key} [color=blue,shape=record,label=\"{key}|{}\"];",
        escape_label(&node.description())
    )
}

fn write_registry_key<W: Write>(out: &mut W, index: usize, key: &RegistryKey) -> fmt::Result {
    write!(
        out,
        "\tK{index} [shape=Mrecord,label=\"{{K{index}|{{{}|",
        escape_label(key.node_type().name())
    )?;
    for dependency in key.dependencies() {
        write!(out, "{} ", node_key(*dependency))?;
    }
    writeln!(out, "}}}}\"];")
}

fn write_spec<W: Write>(out: &mut W, spec: &NodeSpecification) -> fmt::Result {
    let key = spec_key(spec);
    writeln!(
        out,
        "\t{key} [color=red,shape=record,label=\"{{{key}|{}}}\"];",
        escape_label(&spec.description())
    )
}

/// Nodes reachable from `entry_points` in breadth-first order, following
/// dependencies (and dependents if asked to). Each node appears once.
fn reachable(entry_points: &[NodeRef], options: &DebugOptions) -> Vec<NodeRef> {
    let mut queue: VecDeque<NodeRef> = entry_points.iter().cloned().collect();
    let mut visited = HashSet::new();
    let mut order = Vec::new();

    while let Some(node) = queue.pop_front() {
        if !visited.insert(node.id()) {
            continue;
        }
        if options.follow_upward_links {
            queue.extend(
                node.dependent_nodes()
                    .into_iter()
                    .filter(|dependent| !visited.contains(&dependent.id())),
            );
        }
        queue.extend(
            node.dependencies()
                .iter()
                .filter(|dependency| !visited.contains(&dependency.id()))
                .cloned(),
        );
        order.push(node);
    }
    order
}

fn write_dag_structure<W: Write>(
    out: &mut W,
    entry_points: &[NodeRef],
    options: &DebugOptions,
) -> fmt::Result {
    for node in reachable(entry_points, options) {
        write_node(out, &*node)?;
        let from = node_key(node.id());
        for (index, dependency) in node.dependencies().iter().enumerate() {
            let to = node_key(dependency.id());
            if options.show_dependency_index {
                writeln!(out, "\t{from} -> {to} [color=blue,label=\"{index}\"];")?;
            } else {
                writeln!(out, "\t{from} -> {to} [color=blue];")?;
            }
        }
    }
    Ok(())
}

/// Draw the registry keys with a link to their node. Returns the nodes.
fn write_registry_links<W: Write>(
    out: &mut W,
    registry: &Registry,
) -> Result<Vec<NodeRef>, fmt::Error> {
    let mut nodes = Vec::with_capacity(registry.len());
    for (index, (key, node)) in registry.iter().enumerate() {
        write_registry_key(out, index, key)?;
        writeln!(out, "\tK{index} -> {};", node_key(node.id()))?;
        nodes.push(NodeRef::clone(node));
    }
    Ok(nodes)
}

/// Build `spec` without a registry, drawing specifications and their links.
fn play_instantiation<W: Write>(out: &mut W, spec: &NodeSpecification) -> GraphResult<NodeRef> {
    write_spec(out, spec)?;
    let mut dependencies = Vec::new();
    for dependency_spec in spec.compute_dependencies() {
        dependencies.push(play_instantiation(out, &dependency_spec)?);
        writeln!(out, "\t{} -> {} [color=red];", spec_key(spec), spec_key(&dependency_spec))?;
    }
    let node = spec.build_node(dependencies)?;
    writeln!(out, "\t{} -> {} [color=green];", spec_key(spec), node_key(node.id()))?;
    Ok(node)
}

/// Resolve `spec` against a registry it was already built into.
fn replay_instantiation<W: Write>(
    out: &mut W,
    spec: &NodeSpecification,
    registry: &Registry,
) -> GraphResult<NodeRef> {
    write_spec(out, spec)?;
    let dependency_specs = spec.compute_dependencies();
    let node = if dependency_specs.is_empty() {
        spec.build_node(Vec::new())?
    } else {
        let mut dependencies = Vec::with_capacity(dependency_specs.len());
        for dependency_spec in &dependency_specs {
            dependencies.push(replay_instantiation(out, dependency_spec, registry)?);
            writeln!(out, "\t{} -> {} [color=red];", spec_key(spec), spec_key(dependency_spec))?;
        }
        registry
            .get(&RegistryKey::new(spec.node_type(), &dependencies))
            .ok_or_else(|| GraphError::MissingRegistryEntry {
                description: spec.description(),
            })?
    };
    writeln!(out, "\t{} -> {} [color=green];", spec_key(spec), node_key(node.id()))?;
    Ok(node)
}

/// Dot graph of everything reachable from `entry_point`.
pub fn debug_dag<W: Write>(
    out: &mut W,
    entry_point: &NodeRef,
    options: &DebugOptions,
) -> fmt::Result {
    writeln!(out, "digraph {{")?;
    write_dag_structure(out, std::slice::from_ref(entry_point), options)?;
    writeln!(out, "}}")
}

/// Dot graph of a registry: its keys, and every node reachable from them.
pub fn debug_registry<W: Write>(
    out: &mut W,
    registry: &Registry,
    options: &DebugOptions,
) -> fmt::Result {
    writeln!(out, "digraph {{")?;
    let nodes = write_registry_links(out, registry)?;
    write_dag_structure(out, &nodes, options)?;
    writeln!(out, "}}")
}

/// Build `spec` without reuse and draw both the specification tree and the
/// resulting graph. Returns the built node.
pub fn debug_node_spec_instantiation<W: Write>(
    out: &mut W,
    spec: &NodeSpecification,
    options: &DebugOptions,
) -> GraphResult<NodeRef> {
    writeln!(out, "digraph {{")?;
    let node = play_instantiation(out, spec)?;
    write_dag_structure(out, std::slice::from_ref(&node), options)?;
    writeln!(out, "}}")?;
    Ok(node)
}

/// Draw how `spec` maps onto the nodes of `registry`, which must already
/// hold every non-leaf node of the specification tree.
pub fn debug_node_spec_instantiation_in_registry<W: Write>(
    out: &mut W,
    spec: &NodeSpecification,
    registry: &Registry,
    options: &DebugOptions,
) -> GraphResult<NodeRef> {
    writeln!(out, "digraph {{")?;
    let node = replay_instantiation(out, spec, registry)?;
    write_dag_structure(out, std::slice::from_ref(&node), options)?;
    if options.show_registry_links {
        write_registry_links(out, registry)?;
    }
    writeln!(out, "}}")?;
    Ok(node)
}

/// One node of a [`GraphDescription`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: u64,
    pub description: String,
    pub value_type: String,
    pub valid: bool,
    pub constant: bool,
    /// Cached value, rendered with `Debug`.
    pub value: String,
}

/// Dependency edge: `from` reads `to` in slot `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub from: u64,
    pub to: u64,
    pub index: usize,
}

/// Serializable snapshot of a graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<EdgeRecord>,
}

impl GraphDescription {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Snapshot of everything reachable from `entry_points`, in visiting order.
pub fn describe_graph(entry_points: &[NodeRef], options: &DebugOptions) -> GraphDescription {
    let mut description = GraphDescription::default();
    for node in reachable(entry_points, options) {
        let from = node.id().raw();
        description.nodes.push(NodeRecord {
            id: from,
            description: node.description(),
            value_type: node.value_type().name().to_string(),
            valid: node.is_valid(),
            constant: node.is_constant(),
            value: node.debug_info(),
        });
        description.edges.extend(
            node.dependencies()
                .iter()
                .enumerate()
                .map(|(index, dependency)| EdgeRecord {
                    from,
                    to: dependency.id().raw(),
                    index,
                }),
        );
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Constant, Parameter};
    use crate::numeric::{Add, AddNode, Neg, NegNode};
    use crate::spec::{instantiate_node_spec_with_reuse, ExistingNode, FunctionSpec, ReductionSpec};

    #[test]
    fn escapes_record_characters() {
        assert_eq!(escape_label("Parameter<f64>"), "Parameter\\<f64\\>");
        assert_eq!(escape_label("a|b {c}"), "a\\|b\\ \\{c\\}");
    }

    #[test]
    fn dag_lists_nodes_and_indexed_edges() {
        let p = Parameter::create(1.0);
        let c = Constant::create(2.0);
        let sum = AddNode::create(vec![p.to_node(), c.to_node()]).unwrap();
        let options = DebugOptions {
            show_dependency_index: true,
            ..DebugOptions::default()
        };

        let mut dot = String::new();
        debug_dag(&mut dot, sum.as_node(), &options).unwrap();

        let s = node_key(sum.id());
        assert!(dot.starts_with("digraph {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains(&format!("{s} [color=blue,shape=record,label=\"{s}|Add\"];")));
        assert!(dot.contains(&format!("{s} -> {} [color=blue,label=\"0\"];", node_key(p.id()))));
        assert!(dot.contains(&format!("{s} -> {} [color=blue,label=\"1\"];", node_key(c.id()))));
        assert!(dot.contains("Parameter\\<f64\\>"));
    }

    #[test]
    fn upward_links_are_followed_on_request() {
        let p = Parameter::create(1.0);
        let neg = NegNode::create(vec![p.to_node()]).unwrap();

        let mut down = String::new();
        debug_dag(&mut down, &p.to_node(), &DebugOptions::default()).unwrap();
        assert!(!down.contains(&node_key(neg.id())));

        let mut up = String::new();
        let options = DebugOptions {
            follow_upward_links: true,
            ..DebugOptions::default()
        };
        debug_dag(&mut up, &p.to_node(), &options).unwrap();
        assert!(up.contains(&node_key(neg.id())));
    }

    #[test]
    fn registry_export_draws_keys() {
        let p = Parameter::create(1.0).to_node();
        let spec: NodeSpecification =
            FunctionSpec::<Neg>::new(vec![ExistingNode::new(p.clone()).into()]).into();
        let mut registry = Registry::new();
        let neg = instantiate_node_spec_with_reuse(&spec, &mut registry).unwrap();

        let mut dot = String::new();
        debug_registry(&mut dot, &registry, &DebugOptions::default()).unwrap();
        assert!(dot.contains(&format!("\tK0 -> {};", node_key(neg.id()))));
        assert!(dot.contains(&format!("{} }}}}\"];", node_key(p.id()))));
    }

    #[test]
    fn instantiation_exports_link_specs_to_nodes() {
        let p = Parameter::create(1.0).to_node();
        let spec: NodeSpecification =
            ReductionSpec::<Add>::new(vec![ExistingNode::new(p.clone()).into()]).into();

        let mut dot = String::new();
        let node = debug_node_spec_instantiation(&mut dot, &spec, &DebugOptions::default()).unwrap();
        assert!(dot.contains(&format!("{} -> {} [color=green];", spec_key(&spec), node_key(node.id()))));
        assert!(dot.contains("[color=red];"));
    }

    #[test]
    fn replay_requires_a_populated_registry() {
        let p = Parameter::create(1.0).to_node();
        let spec: NodeSpecification =
            ReductionSpec::<Add>::new(vec![ExistingNode::new(p.clone()).into()]).into();
        let mut registry = Registry::new();

        let mut dot = String::new();
        let options = DebugOptions::default();
        let err = debug_node_spec_instantiation_in_registry(&mut dot, &spec, &registry, &options)
            .unwrap_err();
        assert!(matches!(err, GraphError::MissingRegistryEntry { .. }));

        let built = instantiate_node_spec_with_reuse(&spec, &mut registry).unwrap();
        let options = DebugOptions {
            show_registry_links: true,
            ..DebugOptions::default()
        };
        let mut dot = String::new();
        let replayed =
            debug_node_spec_instantiation_in_registry(&mut dot, &spec, &registry, &options).unwrap();
        assert_eq!(replayed.id(), built.id());
        assert!(dot.contains("\tK0 -> "));
    }

    #[test]
    fn description_serializes_to_json() {
        let p = Parameter::create(3.0);
        let neg = NegNode::create(vec![p.to_node()]).unwrap();
        neg.get_value();

        let description = describe_graph(&[neg.to_node()], &DebugOptions::default());
        assert_eq!(description.nodes.len(), 2);
        assert_eq!(description.nodes[0].description, "Neg");
        assert_eq!(description.nodes[0].value, "-3.0");
        assert_eq!(
            description.edges,
            vec![EdgeRecord {
                from: neg.id().raw(),
                to: p.id().raw(),
                index: 0
            }]
        );

        let json = description.to_json().unwrap();
        let parsed: GraphDescription = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, description);
    }

    #[test]
    fn options_load_from_partial_config() {
        let options: DebugOptions = serde_json::from_str(r#"{"show_dependency_index": true}"#).unwrap();
        assert!(options.show_dependency_index);
        assert!(!options.follow_upward_links);
    }
}
