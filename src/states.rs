//! Node state held by the runtime rather than in parameter memory.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::graph::NodeType;
use crate::BLOCK_SIZE;

/// Per-block scratch and edge memory of one grain voice.
#[derive(Debug, Clone)]
pub struct GrainState {
    /// Trigger value of the previous sample, for rising-edge detection.
    pub previous_trigger: f32,
    /// Retriggers honoured since construction.
    pub retriggers: u64,
    /// Grain length in samples, per sample of the current block.
    pub duration: [f32; BLOCK_SIZE],
    /// Unlatched pitch ratio, per sample of the current block.
    pub ratio: [f32; BLOCK_SIZE],
    /// Envelope gain, per sample of the current block.
    pub envelope: [f32; BLOCK_SIZE],
}

impl Default for GrainState {
    fn default() -> Self {
        Self {
            previous_trigger: 0.0,
            retriggers: 0,
            duration: [0.0; BLOCK_SIZE],
            ratio: [0.0; BLOCK_SIZE],
            envelope: [0.0; BLOCK_SIZE],
        }
    }
}

/// Node states for mutable data.
#[derive(Debug, Clone)]
pub enum NodeState {
    /// All persistent state, if any, lives in parameter memory.
    Stateless,
    /// Grain voice.
    Grain(Box<GrainState>),
}

impl NodeState {
    /// Initial state for a node of type `node_type`.
    pub fn for_node(node_type: &NodeType) -> Self {
        match node_type {
            NodeType::Grain { .. } => NodeState::Grain(Box::default()),
            _ => NodeState::Stateless,
        }
    }

    /// Forget edge history and counters.
    pub fn reset(&mut self) {
        if let NodeState::Grain(state) = self {
            state.previous_trigger = 0.0;
            state.retriggers = 0;
        }
    }
}
