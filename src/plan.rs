//! Plan module: compile a graph into an ordered list of evaluation steps.

use crate::graph::{Edge, EvalMode, Graph, NodeId, PortId};
use crate::invariant_ppt::{assert_invariant, BUFFER_LIVENESS, PLAN_SOUNDNESS};
use std::collections::BTreeSet;
use std::fmt;

/// One node evaluation within a block.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub node: NodeId,
    pub mode: EvalMode,
    /// Buffer read by each input port, in port order.
    pub inputs: Vec<usize>,
    /// Buffer written by each output port, in port order.
    pub outputs: Vec<usize>,
}

/// The compiled plan: execution order and buffer assignment.
#[derive(Debug, Clone)]
pub struct Plan {
    pub order: Vec<NodeId>,
    pub steps: Vec<Step>,
    pub edges: Vec<Edge>,
    /// Number of block buffers the runtime must allocate.
    pub buffer_count: usize,
}

/// Errors during plan compilation.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    CycleDetected,
    /// A required input has no driver.
    UnconnectedInput { node: NodeId, port: PortId },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::CycleDetected => write!(f, "graph contains a cycle"),
            PlanError::UnconnectedInput { node, port } => {
                write!(f, "input {} of node {} is not connected", port.0, node.0)
            }
        }
    }
}

impl Plan {
    /// Create a plan from a graph.
    pub fn compile(graph: &Graph) -> Result<Self, PlanError> {
        let order = topo_sort(graph)?;

        // One buffer per output port, numbered in node order.
        let mut first_buffer = Vec::with_capacity(graph.nodes.len());
        let mut buffer_count = 0;
        for node in &graph.nodes {
            first_buffer.push(buffer_count);
            buffer_count += node.node_type.output_ports().len();
        }

        let mut steps = Vec::with_capacity(order.len());
        for &id in &order {
            let node_type = &graph.nodes[id.0].node_type;
            let mut inputs = Vec::with_capacity(node_type.required_inputs());
            for port in node_type.input_ports() {
                let edge = graph
                    .driver(id, port.id)
                    .ok_or(PlanError::UnconnectedInput { node: id, port: port.id })?;
                inputs.push(first_buffer[edge.from_node.0] + edge.from_port.0);
            }
            let outputs = (0..node_type.output_ports().len())
                .map(|p| first_buffer[id.0] + p)
                .collect();
            steps.push(Step {
                node: id,
                mode: node_type.eval_mode(),
                inputs,
                outputs,
            });
        }

        assert_invariant(
            PLAN_SOUNDNESS,
            order.len() == graph.nodes.len(),
            "every node is scheduled exactly once",
            Some("Plan::compile"),
        );
        assert_invariant(
            BUFFER_LIVENESS,
            producers_precede_consumers(&steps),
            "every input buffer is written before it is read",
            Some("Plan::compile"),
        );

        let vector_steps = steps.iter().filter(|s| s.mode == EvalMode::Vector).count();
        log::debug!(
            "compiled plan: {} steps ({} vector, {} scalar), {} buffers",
            steps.len(),
            vector_steps,
            steps.len() - vector_steps,
            buffer_count
        );

        Ok(Self {
            order,
            steps,
            edges: graph.edges.clone(),
            buffer_count,
        })
    }

    /// Position of `node` in the execution order.
    pub fn position(&self, node: NodeId) -> Option<usize> {
        self.order.iter().position(|&n| n == node)
    }
}

fn producers_precede_consumers(steps: &[Step]) -> bool {
    let max = steps
        .iter()
        .flat_map(|s| s.outputs.iter())
        .copied()
        .max()
        .map_or(0, |m| m + 1);
    let mut written = vec![false; max];
    for step in steps {
        if step.inputs.iter().any(|&b| !written.get(b).copied().unwrap_or(false)) {
            return false;
        }
        for &b in &step.outputs {
            written[b] = true;
        }
    }
    true
}

/// Topological sort; among ready nodes the lowest id runs first.
fn topo_sort(graph: &Graph) -> Result<Vec<NodeId>, PlanError> {
    let mut in_degree = vec![0; graph.nodes.len()];
    let mut adj: Vec<Vec<NodeId>> = vec![vec![]; graph.nodes.len()];

    for edge in &graph.edges {
        adj[edge.from_node.0].push(edge.to_node);
        in_degree[edge.to_node.0] += 1;
    }

    let mut ready: BTreeSet<NodeId> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| NodeId(i))
        .collect();

    let mut order = Vec::with_capacity(graph.nodes.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &neighbor in &adj[node.0] {
            in_degree[neighbor.0] -= 1;
            if in_degree[neighbor.0] == 0 {
                ready.insert(neighbor);
            }
        }
    }

    if order.len() == graph.nodes.len() {
        Ok(order)
    } else {
        Err(PlanError::CycleDetected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeType;
    use crate::node::BinaryOp;

    #[test]
    fn plan_stability() {
        let mut graph = Graph::new();
        let a = graph.add_node(NodeType::Const(1.0));
        let b = graph.add_node(NodeType::Const(2.0));
        let sum = graph.add_node(NodeType::Binary(BinaryOp::Add));
        graph.connect(a, 0, sum, 0).unwrap();
        graph.connect(b, 0, sum, 1).unwrap();

        let plan1 = Plan::compile(&graph).unwrap();
        let plan2 = Plan::compile(&graph).unwrap();
        assert_eq!(plan1.order, plan2.order);
        assert_eq!(plan1.steps, plan2.steps);
    }

    #[test]
    fn consumers_follow_producers_even_with_lower_ids() {
        let mut graph = Graph::new();
        let out = graph.add_node(NodeType::Output { channel: 0 });
        let src = graph.add_node(NodeType::Const(0.5));
        graph.connect(src, 0, out, 0).unwrap();
        let plan = Plan::compile(&graph).unwrap();
        assert_eq!(plan.order, vec![src, out]);
        assert_eq!(plan.steps[1].inputs, vec![plan.steps[0].outputs[0]]);
    }

    #[test]
    fn unconnected_input_is_rejected() {
        let mut graph = Graph::new();
        let sum = graph.add_node(NodeType::Binary(BinaryOp::Mul));
        let c = graph.add_node(NodeType::Const(1.0));
        graph.connect(c, 0, sum, 0).unwrap();
        assert_eq!(
            Plan::compile(&graph).unwrap_err(),
            PlanError::UnconnectedInput {
                node: sum,
                port: PortId(1)
            }
        );
    }

    #[test]
    fn one_buffer_per_output_port() {
        let mut graph = Graph::new();
        graph.add_node(NodeType::Click);
        graph.add_node(NodeType::Const(0.0));
        let plan = Plan::compile(&graph).unwrap();
        assert_eq!(plan.buffer_count, 3);
    }
}
