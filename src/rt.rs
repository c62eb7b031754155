//! RT module: real-time execution of a compiled plan.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::context::EngineContext;
use crate::graph::{EvalMode, Graph, NodeId, NodeType, PortId};
use crate::mixer::run_one_pole;
use crate::plan::Plan;
use crate::states::NodeState;
use crate::store::ParameterStore;
use crate::transport::{run_click, run_phasor, run_ramp_to_trig, run_transport};
use crate::voice::{run_grain, GrainInputs, GrainOutputs};
use crate::{BLOCK_SIZE, CHANNELS, LANES};

/// Most output ports on any node type.
const MAX_OUTPUTS: usize = 4;

/// The runtime engine.
#[derive(Debug)]
pub struct Runtime {
    plan: Plan,
    nodes: Vec<NodeType>,
    states: Vec<NodeState>,
    buffers: Vec<Vec<f32>>,
    scratch: [Vec<f32>; MAX_OUTPUTS],
}

impl Runtime {
    /// Create a new runtime from a plan and graph.
    pub fn new(plan: Plan, graph: &Graph) -> Self {
        let nodes: Vec<NodeType> = graph.nodes.iter().map(|n| n.node_type.clone()).collect();
        let states = nodes.iter().map(NodeState::for_node).collect();
        let buffers = vec![vec![0.0; BLOCK_SIZE]; plan.buffer_count];
        let scratch = std::array::from_fn(|_| vec![0.0; BLOCK_SIZE]);
        Self {
            plan,
            nodes,
            states,
            buffers,
            scratch,
        }
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Forget runtime-held node state and zero every buffer.
    pub fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
        for buffer in &mut self.buffers {
            buffer.fill(0.0);
        }
    }

    /// Contents of output `port` of `node` from the last block.
    pub fn buffer(&self, node: NodeId, port: PortId) -> Option<&[f32]> {
        let step = &self.plan.steps[self.plan.position(node)?];
        let index = *step.outputs.get(port.0)?;
        Some(&self.buffers[index])
    }

    /// Retriggers honoured by a grain node since construction or reset.
    pub fn retriggers(&self, node: NodeId) -> Option<u64> {
        match self.states.get(node.0)? {
            NodeState::Grain(state) => Some(state.retriggers),
            NodeState::Stateless => None,
        }
    }

    /// Process one block. `out` holds one `BLOCK_SIZE` plane per channel.
    pub fn process_block(
        &mut self,
        store: &mut ParameterStore,
        ctx: &mut EngineContext,
        out: &mut [f32],
    ) {
        debug_assert_eq!(out.len(), CHANNELS * BLOCK_SIZE);
        let Self {
            plan,
            nodes,
            states,
            buffers,
            scratch,
        } = self;

        for step in &plan.steps {
            // Move the step's output buffers aside so inputs can be borrowed alongside.
            for (k, &b) in step.outputs.iter().enumerate() {
                std::mem::swap(&mut scratch[k], &mut buffers[b]);
            }
            {
                let shared: &[Vec<f32>] = &buffers[..];
                let input = |k: usize| read_input(shared, &step.inputs, k);
                let node = &nodes[step.node.0];
                match step.mode {
                    EvalMode::Vector => run_vector(node, input, scratch, out),
                    EvalMode::Scalar => {
                        run_scalar(node, input, &mut states[step.node.0], scratch, store, ctx)
                    }
                }
            }
            for (k, &b) in step.outputs.iter().enumerate() {
                std::mem::swap(&mut scratch[k], &mut buffers[b]);
            }
        }
    }
}

#[inline]
fn read_input<'a>(buffers: &'a [Vec<f32>], inputs: &[usize], k: usize) -> &'a [f32] {
    &buffers[inputs[k]]
}

/// Stateless nodes, four lanes per step. Node kinds tagged scalar never reach this pass.
fn run_vector<'a>(
    node: &NodeType,
    input: impl Fn(usize) -> &'a [f32],
    scratch: &mut [Vec<f32>; MAX_OUTPUTS],
    out: &mut [f32],
) {
    let o0 = &mut scratch[0];
    match node {
        NodeType::Const(value) => {
            for o in o0.chunks_exact_mut(LANES) {
                o.copy_from_slice(&[*value; LANES]);
            }
        }
        NodeType::Binary(op) => op.eval_block(input(0), input(1), o0),
        NodeType::Unary(op) => op.eval_block(input(0), o0),
        NodeType::Output { channel } => {
            let start = channel * BLOCK_SIZE;
            if let Some(plane) = out.get_mut(start..start + BLOCK_SIZE) {
                for (o, x) in plane
                    .chunks_exact_mut(LANES)
                    .zip(input(0).chunks_exact(LANES))
                {
                    o.copy_from_slice(x);
                }
            }
        }
        _ => {}
    }
}

/// Stateful nodes, one sample at a time in ascending order. Node kinds
/// tagged vector never reach this pass.
fn run_scalar<'a>(
    node: &NodeType,
    input: impl Fn(usize) -> &'a [f32],
    state: &mut NodeState,
    scratch: &mut [Vec<f32>; MAX_OUTPUTS],
    store: &mut ParameterStore,
    ctx: &mut EngineContext,
) {
    let [o0, o1, o2, o3] = scratch;
    match node {
        NodeType::Param(param) => o0.fill(store.read(*param)),
        NodeType::Probe(kind) => {
            for (j, (o, &x)) in o0.iter_mut().zip(input(0)).enumerate() {
                ctx.probe(*kind, 0.0, x, j);
                *o = x;
            }
        }
        NodeType::Click => run_click(store, o0, o1),
        NodeType::Transport => run_transport(
            store,
            [input(0), input(1), input(2), input(3), input(4)],
            o0,
            o1,
        ),
        NodeType::Phasor => run_phasor(store, input(0), o0),
        NodeType::RampToTrig => run_ramp_to_trig(store, input(0), o0),
        NodeType::Grain { voice } => {
            if let NodeState::Grain(state) = state {
                let inputs = GrainInputs {
                    loop_len: input(0),
                    trigger: input(1),
                    playhead: input(2),
                    pitch_offset: input(3),
                    density: input(4),
                };
                let outputs = GrainOutputs {
                    left: o0,
                    through: o1,
                    gate: o2,
                    right: o3,
                };
                run_grain(*voice, store, ctx, state, inputs, outputs);
            }
        }
        NodeType::OnePole => run_one_pole(store, input(0), input(1), o0),
        _ => {}
    }
}

/// Run process_block with panic containment.
pub fn process_block_safe(
    runtime: &mut Runtime,
    store: &mut ParameterStore,
    ctx: &mut EngineContext,
    out: &mut [f32],
) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        runtime.process_block(store, ctx, out);
    }));
    if result.is_err() {
        // Fail closed: silence output
        out.fill(0.0);
    }
}
