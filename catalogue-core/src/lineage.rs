//! Lineage graph assembly from declared source systems and edges

use crate::errors::LineageConfigError;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const SOURCE_LAYER: &str = "source";

fn default_source_layer() -> String {
    SOURCE_LAYER.to_string()
}

/// An upstream system that is not itself profiled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNode {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default = "default_source_layer")]
    pub layer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,
}

impl LineageEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            join: None,
            transform: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LineageConfig {
    pub sources: Vec<LineageNode>,
    pub edges: Vec<LineageEdge>,
}

impl LineageConfig {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.edges.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageNodeEntry {
    pub id: String,
    pub label: String,
    pub layer: String,
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
}

/// Validated lineage document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageMap {
    pub nodes: Vec<LineageNodeEntry>,
    pub edges: Vec<LineageEdge>,
    pub layers: BTreeMap<String, Vec<String>>,
}

impl LineageMap {
    pub fn node(&self, id: &str) -> Option<&LineageNodeEntry> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

struct LineageGraph {
    graph: DiGraph<LineageNode, usize>,
    id_to_node: HashMap<String, NodeIndex>,
}

impl LineageGraph {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            id_to_node: HashMap::new(),
        }
    }

    fn add_node(&mut self, node: LineageNode) -> Result<NodeIndex, LineageConfigError> {
        if self.id_to_node.contains_key(&node.id) {
            return Err(LineageConfigError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.id_to_node.insert(id, idx);
        Ok(idx)
    }

    fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.id_to_node.get(id).copied()
    }

    /// First back-edge found by a depth-first traversal, if any
    fn find_back_edge(&self) -> Option<(NodeIndex, NodeIndex)> {
        let outcome = depth_first_search(&self.graph, self.graph.node_indices(), |event| {
            if let DfsEvent::BackEdge(u, v) = event {
                return Control::Break((u, v));
            }
            Control::Continue
        });
        match outcome {
            Control::Break(edge) => Some(edge),
            _ => None,
        }
    }

    fn neighbours(&self, idx: NodeIndex, direction: Direction) -> Vec<String> {
        let mut ids: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Build the lineage map over the declared source systems plus the given
/// `(table, layer)` pairs. Dangling endpoints and cycles reject the whole
/// document.
pub fn build_lineage<'a, I>(
    tables: I,
    config: &LineageConfig,
) -> Result<LineageMap, LineageConfigError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut nodes: Vec<LineageNode> = config
        .sources
        .iter()
        .map(|source| LineageNode {
            id: source.id.clone(),
            label: if source.label.is_empty() {
                source.id.clone()
            } else {
                source.label.clone()
            },
            layer: source.layer.clone(),
        })
        .collect();
    nodes.extend(tables.into_iter().map(|(name, layer)| LineageNode {
        id: name.to_string(),
        label: name.to_string(),
        layer: layer.to_string(),
    }));
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut lineage = LineageGraph::new();
    for node in nodes {
        lineage.add_node(node)?;
    }

    let mut edges = config.edges.clone();
    edges.sort();
    edges.dedup_by(|a, b| a.from == b.from && a.to == b.to);

    for (position, edge) in edges.iter().enumerate() {
        let endpoint = |id: &str| {
            lineage
                .node_index(id)
                .ok_or_else(|| LineageConfigError::DanglingEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: id.to_string(),
                })
        };
        let from = endpoint(&edge.from)?;
        let to = endpoint(&edge.to)?;
        lineage.graph.add_edge(from, to, position);
    }

    if let Some((u, v)) = lineage.find_back_edge() {
        return Err(LineageConfigError::Cycle {
            from: lineage.graph[u].id.clone(),
            to: lineage.graph[v].id.clone(),
        });
    }

    let mut layers: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let entries = lineage
        .graph
        .node_indices()
        .map(|idx| {
            let node = &lineage.graph[idx];
            layers
                .entry(node.layer.clone())
                .or_default()
                .push(node.id.clone());
            LineageNodeEntry {
                id: node.id.clone(),
                label: node.label.clone(),
                layer: node.layer.clone(),
                upstream: lineage.neighbours(idx, Direction::Incoming),
                downstream: lineage.neighbours(idx, Direction::Outgoing),
            }
        })
        .collect::<Vec<_>>();

    debug!(
        "Lineage built: {} nodes, {} edges, {} layers",
        entries.len(),
        edges.len(),
        layers.len()
    );

    Ok(LineageMap {
        nodes: entries,
        edges,
        layers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str) -> LineageNode {
        LineageNode {
            id: id.to_string(),
            label: String::new(),
            layer: SOURCE_LAYER.to_string(),
        }
    }

    fn config(edges: &[(&str, &str)]) -> LineageConfig {
        LineageConfig {
            sources: vec![source("Oracle Core Banking DB")],
            edges: edges.iter().map(|(f, t)| LineageEdge::new(*f, *t)).collect(),
        }
    }

    const TABLES: [(&str, &str); 3] = [
        ("core_banking_customers", "bronze"),
        ("dim_customer", "gold"),
        ("dim_account", "gold"),
    ];

    #[test]
    fn test_builds_layered_dag() {
        let cfg = config(&[
            ("Oracle Core Banking DB", "core_banking_customers"),
            ("core_banking_customers", "dim_customer"),
            ("dim_customer", "dim_account"),
        ]);
        let map = build_lineage(TABLES, &cfg).unwrap();

        assert_eq!(map.nodes.len(), 4);
        assert_eq!(map.edges.len(), 3);
        assert_eq!(map.layers["gold"], vec!["dim_account", "dim_customer"]);
        assert_eq!(map.layers[SOURCE_LAYER], vec!["Oracle Core Banking DB"]);

        let customer = map.node("dim_customer").unwrap();
        assert_eq!(customer.upstream, vec!["core_banking_customers"]);
        assert_eq!(customer.downstream, vec!["dim_account"]);
        assert_eq!(
            map.node("Oracle Core Banking DB").unwrap().label,
            "Oracle Core Banking DB"
        );
    }

    #[test]
    fn test_dangling_edge_is_rejected() {
        let cfg = config(&[("salesforce_accounts", "dim_customer")]);
        let err = build_lineage(TABLES, &cfg).unwrap_err();
        assert_eq!(
            err,
            LineageConfigError::DanglingEdge {
                from: "salesforce_accounts".into(),
                to: "dim_customer".into(),
                missing: "salesforce_accounts".into(),
            }
        );
    }

    #[test]
    fn test_cycle_is_rejected() {
        let cfg = config(&[
            ("core_banking_customers", "dim_customer"),
            ("dim_customer", "dim_account"),
            ("dim_account", "core_banking_customers"),
        ]);
        assert!(matches!(
            build_lineage(TABLES, &cfg),
            Err(LineageConfigError::Cycle { .. })
        ));
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let cfg = config(&[("dim_customer", "dim_customer")]);
        assert_eq!(
            build_lineage(TABLES, &cfg).unwrap_err(),
            LineageConfigError::Cycle {
                from: "dim_customer".into(),
                to: "dim_customer".into(),
            }
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let cfg = config(&[
            ("core_banking_customers", "dim_customer"),
            ("core_banking_customers", "dim_account"),
            ("dim_customer", "dim_account"),
        ]);
        let map = build_lineage(TABLES, &cfg).unwrap();
        assert_eq!(
            map.node("dim_account").unwrap().upstream,
            vec!["core_banking_customers", "dim_customer"]
        );
    }

    #[test]
    fn test_source_colliding_with_table_is_duplicate() {
        let cfg = LineageConfig {
            sources: vec![source("dim_customer")],
            edges: vec![],
        };
        assert_eq!(
            build_lineage(TABLES, &cfg).unwrap_err(),
            LineageConfigError::DuplicateNode("dim_customer".into())
        );
    }

    #[test]
    fn test_edge_annotations_round_trip_from_yaml() {
        let yaml = r#"
sources:
  - id: Salesforce CRM
edges:
  - from: Salesforce CRM
    to: dim_customer
    join: "PersonEmail -> email"
    transform: CRM fields mapped
"#;
        let cfg: LineageConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.sources[0].layer, SOURCE_LAYER);
        let map = build_lineage([("dim_customer", "gold")], &cfg).unwrap();
        assert_eq!(map.edges[0].join.as_deref(), Some("PersonEmail -> email"));
    }
}
