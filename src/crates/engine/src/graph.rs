//! The immutable typed graph a session executes: nodes, edges, and the
//! closed set of node kinds. Deserialized straight from the wire schema
//! (`nodes[].type`, `nodes[].data.node_config`) and validated once up front;
//! everything downstream works off this typed form, never raw JSON.

use crate::error::{EngineError, Result};
use serde::Deserialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Input,
    Search,
    Llm,
    Condition,
    Loop,
    Splitter,
    Reduce,
    SelfConsistency,
    MoaProposer,
    MoaAggregator,
    Debate,
    Voting,
    Output,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Search => "search",
            NodeKind::Llm => "llm",
            NodeKind::Condition => "condition",
            NodeKind::Loop => "loop",
            NodeKind::Splitter => "splitter",
            NodeKind::Reduce => "reduce",
            NodeKind::SelfConsistency => "self-consistency",
            NodeKind::MoaProposer => "moa-proposer",
            NodeKind::MoaAggregator => "moa-aggregator",
            NodeKind::Debate => "debate",
            NodeKind::Voting => "voting",
            NodeKind::Output => "output",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    /// Open per-kind config map. Individual executors pull the keys they
    /// care about and fall back to documented defaults for the rest.
    pub config: Value,
}

impl Node {
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key)?.as_str()
    }

    pub fn config_f64(&self, key: &str, default: f64) -> f64 {
        self.config.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    pub fn config_u64(&self, key: &str, default: u64) -> u64 {
        self.config.get(key).and_then(Value::as_u64).unwrap_or(default)
    }

    pub fn config_usize(&self, key: &str, default: usize) -> usize {
        self.config_u64(key, default as u64) as usize
    }
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub source_handle: Option<String>,
    #[allow(dead_code)]
    pub target_handle: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub api_key: Option<String>,
}

impl Graph {
    /// Parse and validate the wire representation from §3/§6. Tolerates
    /// unknown object keys anywhere; rejects a `type` outside the closed
    /// node-kind set and any edge that references a node that doesn't exist.
    pub fn parse(raw: &str) -> Result<Self> {
        let wire: WireGraph = serde_json::from_str(raw)
            .map_err(|e| EngineError::Validation(format!("invalid graph JSON: {e}")))?;
        Self::from_wire(wire)
    }

    fn from_wire(wire: WireGraph) -> Result<Self> {
        let nodes: Vec<Node> = wire
            .nodes
            .into_iter()
            .map(|n| Node {
                id: n.id,
                kind: n.kind,
                config: n.data.and_then(|d| d.node_config).unwrap_or(Value::Object(Default::default())),
            })
            .collect();

        let edges: Vec<Edge> = wire
            .edges
            .into_iter()
            .map(|e| Edge {
                id: e.id,
                source: e.source,
                target: e.target,
                source_handle: e.source_handle,
                target_handle: e.target_handle,
            })
            .collect();

        let mut seen = HashSet::new();
        for node in &nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(EngineError::Validation(format!("duplicate node id: {}", node.id)));
            }
        }
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &edges {
            if !ids.contains(edge.source.as_str()) {
                return Err(EngineError::Validation(format!("edge {} references unknown source {}", edge.id, edge.source)));
            }
            if !ids.contains(edge.target.as_str()) {
                return Err(EngineError::Validation(format!("edge {} references unknown target {}", edge.id, edge.target)));
            }
        }

        let graph = Graph { nodes, edges, api_key: wire.api_key };
        graph.reject_if_no_entry_point()?;
        Ok(graph)
    }

    /// §4.1 resolved open question: a graph with at least one node but no
    /// node of in-degree zero has no entry point to seed `ready` and is
    /// rejected before scheduling begins.
    fn reject_if_no_entry_point(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let has_incoming: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        let has_root = self.nodes.iter().any(|n| !has_incoming.contains(n.id.as_str()));
        if has_root {
            Ok(())
        } else {
            Err(EngineError::Structural("Cycle detected or empty graph".to_string()))
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn parents_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.edges.iter().filter(move |e| e.target == id).map(|e| e.source.as_str())
    }

    pub fn incoming_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    pub fn outgoing_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn children_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> {
        self.outgoing_edges(id).map(|e| e.target.as_str())
    }

    pub fn roots(&self) -> Vec<&str> {
        let has_incoming: HashSet<&str> = self.edges.iter().map(|e| e.target.as_str()).collect();
        self.nodes.iter().map(|n| n.id.as_str()).filter(|id| !has_incoming.contains(id)).collect()
    }
}

#[derive(Deserialize)]
struct WireGraph {
    #[serde(default)]
    nodes: Vec<WireNode>,
    #[serde(default)]
    edges: Vec<WireEdge>,
    #[serde(default, rename = "apiKey")]
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct WireNode {
    id: String,
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    data: Option<WireNodeData>,
}

#[derive(Deserialize)]
struct WireNodeData {
    #[serde(default)]
    node_config: Option<Value>,
}

#[derive(Deserialize)]
struct WireEdge {
    id: String,
    source: String,
    target: String,
    #[serde(default, rename = "sourceHandle")]
    source_handle: Option<String>,
    #[serde(default, rename = "targetHandle")]
    target_handle: Option<String>,
}

/// Pre-computed adjacency used by the scheduler; kept alongside the graph so
/// readiness checks don't rescan the edge list on every dispatch.
pub struct Adjacency {
    pub parents: HashMap<String, Vec<String>>,
    pub children: HashMap<String, Vec<String>>,
}

impl Adjacency {
    /// Back edges (a loop body's edge returning to its `loop` node) are kept
    /// out of `parents`: otherwise a cycle's entry node would wait forever on
    /// a descendant that can only run once the entry node itself has already
    /// run. `scheduler::requeue_loop_targets` is what re-arms the cycle on
    /// every iteration after the first; `parents` only needs to gate the
    /// first, forward dispatch.
    pub fn build(graph: &Graph) -> Self {
        let back_edges = Self::back_edge_ids(graph);

        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for node in &graph.nodes {
            parents.entry(node.id.clone()).or_default();
            children.entry(node.id.clone()).or_default();
        }
        for edge in &graph.edges {
            children.entry(edge.source.clone()).or_default().push(edge.target.clone());
            if !back_edges.contains(&edge.id) {
                parents.entry(edge.target.clone()).or_default().push(edge.source.clone());
            }
        }
        Self { parents, children }
    }

    /// Classic DFS back-edge detection, run iteratively with an explicit
    /// frame stack (one frame per node currently on the DFS path, tracking
    /// how far through its outgoing edges it's gotten): an edge into a node
    /// still on that path closes a cycle and is a back edge; an edge into an
    /// already-finished node is an ordinary forward/cross edge (e.g. two
    /// condition branches reconverging on the same node) and is kept.
    fn back_edge_ids(graph: &Graph) -> HashSet<String> {
        #[derive(Clone, Copy, PartialEq)]
        enum State {
            Unvisited,
            OnStack,
            Done,
        }

        struct Frame {
            node: String,
            out_edges: Vec<Edge>,
            next: usize,
        }

        let mut state: HashMap<String, State> = graph.nodes.iter().map(|n| (n.id.clone(), State::Unvisited)).collect();
        let mut back_edges = HashSet::new();

        for start in &graph.nodes {
            if state[&start.id] != State::Unvisited {
                continue;
            }

            let mut stack = vec![Frame { node: start.id.clone(), out_edges: graph.outgoing_edges(&start.id).cloned().collect(), next: 0 }];
            state.insert(start.id.clone(), State::OnStack);

            while let Some(frame) = stack.last_mut() {
                if frame.next >= frame.out_edges.len() {
                    state.insert(frame.node.clone(), State::Done);
                    stack.pop();
                    continue;
                }
                let edge = frame.out_edges[frame.next].clone();
                frame.next += 1;

                match state.get(&edge.target).copied().unwrap_or(State::Unvisited) {
                    State::Unvisited => {
                        state.insert(edge.target.clone(), State::OnStack);
                        stack.push(Frame { node: edge.target.clone(), out_edges: graph.outgoing_edges(&edge.target).cloned().collect(), next: 0 });
                    }
                    State::OnStack => {
                        back_edges.insert(edge.id.clone());
                    }
                    State::Done => {}
                }
            }
        }
        back_edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_graph() -> &'static str {
        r#"{
            "nodes": [
                {"id": "a", "type": "input", "position": {"x": 0, "y": 0}, "data": {"node_config": {"inputValue": "hello"}}},
                {"id": "b", "type": "output", "position": {"x": 1, "y": 0}, "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b", "animated": true}
            ]
        }"#
    }

    #[test]
    fn parses_minimal_linear_graph() {
        let graph = Graph::parse(linear_graph()).unwrap();
        assert_eq!(graph.nodes.len(), 2);
        assert_eq!(graph.roots(), vec!["a"]);
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let raw = r#"{"nodes":[{"id":"a","type":"input","position":{"x":0,"y":0},"unexpected":true,"data":{"label":"A","node_config":{}}}],"edges":[],"extra":1}"#;
        assert!(Graph::parse(raw).is_ok());
    }

    #[test]
    fn unknown_kind_is_a_validation_error_not_a_panic() {
        let raw = r#"{"nodes":[{"id":"a","type":"teleport","data":{}}],"edges":[]}"#;
        let err = Graph::parse(raw).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn edge_to_unknown_node_is_rejected() {
        let raw = r#"{"nodes":[{"id":"a","type":"input","data":{}}],"edges":[{"id":"e1","source":"a","target":"ghost"}]}"#;
        assert!(Graph::parse(raw).is_err());
    }

    #[test]
    fn pure_cycle_with_no_entry_point_is_rejected() {
        let raw = r#"{
            "nodes": [
                {"id": "a", "type": "llm", "data": {}},
                {"id": "b", "type": "llm", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "a", "target": "b"},
                {"id": "e2", "source": "b", "target": "a"}
            ]
        }"#;
        let err = Graph::parse(raw).unwrap_err();
        assert!(matches!(err, EngineError::Structural(ref m) if m == "Cycle detected or empty graph"));
    }

    #[test]
    fn empty_graph_is_allowed() {
        assert!(Graph::parse(r#"{"nodes":[],"edges":[]}"#).is_ok());
    }

    #[test]
    fn loop_back_edge_is_excluded_from_parents_but_kept_in_children() {
        let raw = r#"{
            "nodes": [
                {"id": "start", "type": "input", "data": {}},
                {"id": "loop", "type": "loop", "data": {}},
                {"id": "body", "type": "llm", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "start", "target": "loop"},
                {"id": "e2", "source": "loop", "target": "body", "sourceHandle": "loop"},
                {"id": "e3", "source": "body", "target": "loop"}
            ]
        }"#;
        let graph = Graph::parse(raw).unwrap();
        let adjacency = Adjacency::build(&graph);
        assert_eq!(adjacency.parents.get("loop").unwrap(), &vec!["start".to_string()]);
        assert_eq!(adjacency.children.get("body").unwrap(), &vec!["loop".to_string()]);
    }

    #[test]
    fn loop_edge_back_to_an_already_reached_node_is_fine_given_a_root() {
        let raw = r#"{
            "nodes": [
                {"id": "start", "type": "input", "data": {}},
                {"id": "loop", "type": "loop", "data": {}},
                {"id": "body", "type": "llm", "data": {}}
            ],
            "edges": [
                {"id": "e1", "source": "start", "target": "loop"},
                {"id": "e2", "source": "loop", "target": "body", "sourceHandle": "loop"},
                {"id": "e3", "source": "body", "target": "loop"}
            ]
        }"#;
        assert!(Graph::parse(raw).is_ok());
    }
}
