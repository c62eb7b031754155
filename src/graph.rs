//! Signal graph: a DAG of typed nodes joined port to port.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::invariant_ppt::{assert_invariant, GRAPH_LEGALITY, GRAPH_REJECTS_INVALID};
use crate::node::{BinaryOp, UnaryOp};
use crate::store::Param;
use crate::telemetry::TelemetryKind;
use std::fmt;

/// Unique identifier for a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Unique identifier for a port on one side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

/// A named port.
#[derive(Debug, Clone, PartialEq)]
pub struct Port {
    /// Position of the port on its side of the node.
    pub id: PortId,
    /// Human-readable name, for diagnostics.
    pub name: &'static str,
}

const fn port(id: usize, name: &'static str) -> Port {
    Port {
        id: PortId(id),
        name,
    }
}

const PORTS_NONE: &[Port] = &[];
const PORTS_OUT: &[Port] = &[port(0, "out")];
const PORTS_IN: &[Port] = &[port(0, "in")];
const PORTS_BINARY_IN: &[Port] = &[port(0, "a"), port(1, "b")];
const PORTS_CLICK_OUT: &[Port] = &[port(0, "pulse"), port(1, "level")];
const PORTS_TRANSPORT_IN: &[Port] = &[
    port(0, "click"),
    port(1, "level"),
    port(2, "window"),
    port(3, "loop_len"),
    port(4, "speed"),
];
const PORTS_TRANSPORT_OUT: &[Port] = &[port(0, "gate"), port(1, "position")];
const PORTS_GRAIN_IN: &[Port] = &[
    port(0, "loop_len"),
    port(1, "trigger"),
    port(2, "playhead"),
    port(3, "pitch_offset"),
    port(4, "density"),
];
const PORTS_GRAIN_OUT: &[Port] = &[
    port(0, "left"),
    port(1, "through"),
    port(2, "gate"),
    port(3, "right"),
];
const PORTS_ONE_POLE_IN: &[Port] = &[port(0, "target"), port(1, "coef")];

/// Grain output plane carrying the left weighted sample.
pub const GRAIN_LEFT: PortId = PortId(0);
/// Grain output plane forwarding the trigger while the voice is busy.
pub const GRAIN_THROUGH: PortId = PortId(1);
/// Grain output plane carrying the right weighted sample.
pub const GRAIN_RIGHT: PortId = PortId(3);

/// How a node is evaluated within a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalMode {
    /// Stateless; four lanes per step, order free within data dependencies.
    Vector,
    /// Touches persistent state; one sample at a time, ascending.
    Scalar,
}

/// Types of nodes in the engine graph.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum NodeType {
    /// Constant broadcast over the block.
    Const(f32),
    /// Host control read from parameter memory.
    Param(Param),
    /// Two-input arithmetic.
    Binary(BinaryOp),
    /// One-input transform.
    Unary(UnaryOp),
    /// Passthrough that reports its input to telemetry at the decimated rate.
    Probe(TelemetryKind),
    /// Self-clearing click port with a latched level.
    Click,
    /// Dual ramps: click-level counter driving the gate, and the transport position.
    Transport,
    /// Wrapping phase accumulator.
    Phasor,
    /// Rising-edge detector on ramp discontinuities.
    RampToTrig,
    /// One grain voice.
    Grain {
        /// Voice index, 0..VOICE_COUNT.
        voice: usize,
    },
    /// One-pole smoother with state in the shared filter slot.
    OnePole,
    /// Writes into one output channel plane.
    Output {
        /// 0 = left, 1 = right.
        channel: usize,
    },
}

impl NodeType {
    /// Input ports of this node type.
    pub fn input_ports(&self) -> &'static [Port] {
        match self {
            NodeType::Const(_) | NodeType::Param(_) | NodeType::Click => PORTS_NONE,
            NodeType::Binary(_) => PORTS_BINARY_IN,
            NodeType::Unary(_)
            | NodeType::Probe(_)
            | NodeType::Phasor
            | NodeType::RampToTrig
            | NodeType::Output { .. } => PORTS_IN,
            NodeType::Transport => PORTS_TRANSPORT_IN,
            NodeType::Grain { .. } => PORTS_GRAIN_IN,
            NodeType::OnePole => PORTS_ONE_POLE_IN,
        }
    }

    /// Output ports of this node type.
    pub fn output_ports(&self) -> &'static [Port] {
        match self {
            NodeType::Const(_)
            | NodeType::Param(_)
            | NodeType::Binary(_)
            | NodeType::Unary(_)
            | NodeType::Probe(_)
            | NodeType::Phasor
            | NodeType::RampToTrig
            | NodeType::OnePole => PORTS_OUT,
            NodeType::Click => PORTS_CLICK_OUT,
            NodeType::Transport => PORTS_TRANSPORT_OUT,
            NodeType::Grain { .. } => PORTS_GRAIN_OUT,
            NodeType::Output { .. } => PORTS_NONE,
        }
    }

    /// Number of inputs that must be connected before the graph compiles.
    pub fn required_inputs(&self) -> usize {
        self.input_ports().len()
    }

    /// Evaluation mode, chosen by whether the node carries persistent state.
    pub fn eval_mode(&self) -> EvalMode {
        match self {
            NodeType::Const(_)
            | NodeType::Binary(_)
            | NodeType::Unary(_)
            | NodeType::Output { .. } => EvalMode::Vector,
            NodeType::Param(_)
            | NodeType::Probe(_)
            | NodeType::Click
            | NodeType::Transport
            | NodeType::Phasor
            | NodeType::RampToTrig
            | NodeType::Grain { .. }
            | NodeType::OnePole => EvalMode::Scalar,
        }
    }
}

/// An edge connecting an output port to an input port.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// The source node ID.
    pub from_node: NodeId,
    /// The source port ID.
    pub from_port: PortId,
    /// The destination node ID.
    pub to_node: NodeId,
    /// The destination port ID.
    pub to_port: PortId,
}

/// A node in the graph.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// The unique ID of this node.
    pub id: NodeId,
    /// The type of this node.
    pub node_type: NodeType,
}

/// The signal graph.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// All nodes, indexed by `NodeId`.
    pub nodes: Vec<NodeData>,
    /// All edges connecting nodes.
    pub edges: Vec<Edge>,
}

/// Errors that can occur when building the graph.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphError {
    /// Adding edge would create a cycle.
    CycleDetected,
    /// Port index out of bounds.
    InvalidPort,
    /// Node does not exist.
    InvalidNode,
    /// Input port already has a connection.
    PortAlreadyConnected,
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GraphError::CycleDetected => "edge would create a cycle",
            GraphError::InvalidPort => "port does not exist on node",
            GraphError::InvalidNode => "node does not exist",
            GraphError::PortAlreadyConnected => "input port already connected",
        };
        f.write_str(msg)
    }
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    pub fn add_node(&mut self, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData { id, node_type });
        id
    }

    /// Type of `id`, if it exists.
    pub fn node_type(&self, id: NodeId) -> Option<&NodeType> {
        self.nodes.get(id.0).map(|n| &n.node_type)
    }

    /// Shorthand for [`Graph::add_edge`].
    pub fn connect(
        &mut self,
        from_node: NodeId,
        from_port: usize,
        to_node: NodeId,
        to_port: usize,
    ) -> Result<(), GraphError> {
        self.add_edge(Edge {
            from_node,
            from_port: PortId(from_port),
            to_node,
            to_port: PortId(to_port),
        })
    }

    /// Add an edge, validating ports, single drivers and acyclicity.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), GraphError> {
        let from = self.node_type(edge.from_node).ok_or(GraphError::InvalidNode)?;
        let to = self.node_type(edge.to_node).ok_or(GraphError::InvalidNode)?;

        if !from.output_ports().iter().any(|p| p.id == edge.from_port) {
            return Err(GraphError::InvalidPort);
        }
        if !to.input_ports().iter().any(|p| p.id == edge.to_port) {
            return Err(GraphError::InvalidPort);
        }

        let cyclic = self.would_create_cycle(&edge);
        if cyclic {
            assert_invariant(
                GRAPH_REJECTS_INVALID,
                cyclic,
                "Cycle detected, rejecting",
                Some("add_edge"),
            );
            return Err(GraphError::CycleDetected);
        }

        if self
            .edges
            .iter()
            .any(|e| e.to_node == edge.to_node && e.to_port == edge.to_port)
        {
            return Err(GraphError::PortAlreadyConnected);
        }

        self.edges.push(edge);
        assert_invariant(GRAPH_LEGALITY, true, "Edge added, graph remains legal", Some("add_edge"));
        Ok(())
    }

    /// Edge driving input `port` of `node`, if connected.
    pub fn driver(&self, node: NodeId, port: PortId) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| e.to_node == node && e.to_port == port)
    }

    fn would_create_cycle(&self, edge: &Edge) -> bool {
        let mut visited = vec![false; self.nodes.len()];
        self.dfs(edge.to_node, edge.from_node, &mut visited)
    }

    fn dfs(&self, current: NodeId, target: NodeId, visited: &mut [bool]) -> bool {
        if current == target {
            return true;
        }
        if visited[current.0] {
            return false;
        }
        visited[current.0] = true;
        for edge in &self.edges {
            if edge.from_node == current && self.dfs(edge.to_node, target, visited) {
                return true;
            }
        }
        false
    }
}
