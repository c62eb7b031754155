//! The fixed pitch-shifter topology.
//!
//! `build_patch` wires host controls through the rate, window and playhead
//! arithmetic into the transport, the trigger detector and the five grain
//! voices, then mixes the voices through the vactrol smoother.

use crate::config::{EngineConfig, TriggerRouting};
use crate::graph::{Graph, GraphError, NodeId, NodeType, GRAIN_LEFT, GRAIN_RIGHT, GRAIN_THROUGH};
use crate::invariant_ppt::{assert_invariant, PATCH_COMPLETE};
use crate::node::{BinaryOp, UnaryOp};
use crate::store::Param;
use crate::telemetry::TelemetryKind;
use crate::VOICE_COUNT;

/// Transport output carrying the gate.
const TRANSPORT_GATE: usize = 0;
/// Transport output carrying the position.
const TRANSPORT_POSITION: usize = 1;

/// The built graph plus handles to the nodes callers inspect.
#[derive(Debug, Clone)]
pub struct Patch {
    pub graph: Graph,
    /// Ramp-to-trigger detector feeding the first voice.
    pub trigger: NodeId,
    pub voices: [NodeId; VOICE_COUNT],
    /// Vactrol smoother whose output is the mixdown gain.
    pub smoother: NodeId,
}

struct Builder {
    graph: Graph,
}

impl Builder {
    fn node(&mut self, node_type: NodeType) -> NodeId {
        self.graph.add_node(node_type)
    }

    fn constant(&mut self, value: f32) -> NodeId {
        self.node(NodeType::Const(value))
    }

    fn param(&mut self, param: Param) -> NodeId {
        self.node(NodeType::Param(param))
    }

    fn binary(&mut self, op: BinaryOp, a: NodeId, b: NodeId) -> Result<NodeId, GraphError> {
        let id = self.node(NodeType::Binary(op));
        self.graph.connect(a, 0, id, 0)?;
        self.graph.connect(b, 0, id, 1)?;
        Ok(id)
    }

    fn binary_const(&mut self, op: BinaryOp, a: NodeId, b: f32) -> Result<NodeId, GraphError> {
        let c = self.constant(b);
        self.binary(op, a, c)
    }

    fn const_binary(&mut self, op: BinaryOp, a: f32, b: NodeId) -> Result<NodeId, GraphError> {
        let c = self.constant(a);
        self.binary(op, c, b)
    }

    fn unary(&mut self, op: UnaryOp, a: NodeId) -> Result<NodeId, GraphError> {
        self.single(NodeType::Unary(op), a)
    }

    fn probe(&mut self, kind: TelemetryKind, a: NodeId) -> Result<NodeId, GraphError> {
        self.single(NodeType::Probe(kind), a)
    }

    fn single(&mut self, node_type: NodeType, a: NodeId) -> Result<NodeId, GraphError> {
        let id = self.node(node_type);
        self.graph.connect(a, 0, id, 0)?;
        Ok(id)
    }
}

/// Build the fixed patch for `config`.
pub fn build_patch(config: &EngineConfig) -> Result<Patch, GraphError> {
    use BinaryOp::*;

    let mut b = Builder { graph: Graph::new() };

    let click = b.node(NodeType::Click);
    let speed_ctl = b.param(Param::PlaybackSpeed);
    let tempo = b.param(Param::Tempo);
    let rate_base = b.param(Param::RateBase);
    let rate_octaves = b.param(Param::RateOctaves);
    let gate_length = b.param(Param::GateLength);
    let loop_len = b.param(Param::LoopLength);
    let density_rate = b.param(Param::DensityRate);
    let density_scale = b.param(Param::DensityScale);
    let step = b.param(Param::PositionStep);
    let steps = b.param(Param::PositionSteps);
    let offset = b.param(Param::PositionOffset);
    let blend = b.param(Param::PositionBlend);
    let spread = b.param(Param::PositionSpread);

    // Playback rate.
    let octave_gain = b.unary(UnaryOp::Exp2, rate_octaves)?;
    let rate = b.binary(Mul, rate_base, octave_gain)?;
    let rate_seen = b.probe(TelemetryKind::Rate, rate)?;

    // Position step as a fraction of a rate-scaled bar.
    let step_count = b.binary_const(Mul, steps, 4.0)?;
    let step_count = b.binary_const(Max, step_count, 1.0)?;
    let step_index = b.binary(Mod, step, step_count)?;
    let rate_per_beat = b.binary(Div, rate, tempo)?;
    let rate_per_bar = b.binary_const(Mul, rate_per_beat, 32.0)?;
    let step_fraction = b.binary(Div, step_index, rate_per_bar)?;

    // Bar timing and the gate window.
    let loop_ms = b.unary(UnaryOp::SamplesToMs, loop_len)?;
    let beat = b.const_binary(Div, 960.0, tempo)?;
    let quarter = b.binary_const(Div, beat, 4.0)?;
    let eighth = b.binary_const(Div, quarter, 8.0)?;
    let eighth_ms = b.binary_const(Mul, eighth, 1000.0)?;
    let gate_fraction = b.binary_const(Div, gate_length, 1000.0)?;
    let window_ms = b.binary(Mul, eighth_ms, gate_fraction)?;
    let window = b.unary(UnaryOp::MsToSamples, window_ms)?;
    let loop_s = b.binary_const(Div, loop_ms, 1000.0)?;
    let bars_per_loop = b.binary(Div, quarter, loop_s)?;
    let scan = b.binary(Mul, step_fraction, bars_per_loop)?;
    let scan = b.probe(TelemetryKind::ScanRate, scan)?;

    // Position blend terms.
    let half_offset = b.binary_const(Mul, offset, 0.5)?;
    let direct_weight = b.const_binary(Sub, 1.0, blend)?;
    let spread_span = b.binary(Mul, spread, loop_len)?;

    // Grain density and the trigger phasor.
    let density = b.binary(Mul, density_rate, density_scale)?;
    let increment = b.binary_const(Div, density, crate::SAMPLE_RATE)?;
    let phasor = b.single(NodeType::Phasor, increment)?;

    // Transport.
    let tempo_ratio = b.binary(Div, tempo, rate_seen)?;
    let speed = b.binary(Mul, speed_ctl, tempo_ratio)?;
    let loop_seen = b.probe(TelemetryKind::LoopLength, loop_len)?;
    let transport = b.node(NodeType::Transport);
    b.graph.connect(click, 0, transport, 0)?;
    b.graph.connect(click, 1, transport, 1)?;
    b.graph.connect(window, 0, transport, 2)?;
    b.graph.connect(loop_len, 0, transport, 3)?;
    b.graph.connect(speed, 0, transport, 4)?;
    let voice_loop = b.probe(TelemetryKind::VoiceLoopLength, loop_len)?;
    let trigger = b.single(NodeType::RampToTrig, phasor)?;

    // Playhead target.
    let scanned = b.binary(Mul, scan, loop_len)?;
    let position = b.node(NodeType::Binary(Add));
    b.graph.connect(scanned, 0, position, 0)?;
    b.graph.connect(transport, TRANSPORT_POSITION, position, 1)?;
    let wrapped = b.binary(WrapMod, position, loop_seen)?;
    let from_bar = b.binary(Sub, bars_per_loop, wrapped)?;
    let from_bar = b.binary(Add, from_bar, half_offset)?;
    let blended = b.binary(Mul, from_bar, blend)?;
    let direct = b.binary(Mul, wrapped, direct_weight)?;
    let target = b.binary(Add, blended, direct)?;
    let target = b.binary(Add, target, spread_span)?;
    let target = b.binary(Add, target, offset)?;
    let playhead = b.probe(TelemetryKind::PlayheadTarget, target)?;

    // Voices.
    let pitch_offset = b.constant(0.0);
    let mut voices = [NodeId(0); VOICE_COUNT];
    for v in 0..VOICE_COUNT {
        let voice = b.node(NodeType::Grain { voice: v });
        let (source, port) = match config.trigger_routing {
            TriggerRouting::Cascade if v > 0 => (voices[v - 1], GRAIN_THROUGH.0),
            _ => (trigger, 0),
        };
        b.graph.connect(voice_loop, 0, voice, 0)?;
        b.graph.connect(source, port, voice, 1)?;
        b.graph.connect(playhead, 0, voice, 2)?;
        b.graph.connect(pitch_offset, 0, voice, 3)?;
        b.graph.connect(density, 0, voice, 4)?;
        voices[v] = voice;
    }

    // Vactrol smoother driven by the transport gate.
    let closed = b.node(NodeType::Binary(Sub));
    let one = b.constant(1.0);
    b.graph.connect(one, 0, closed, 0)?;
    b.graph.connect(transport, TRANSPORT_GATE, closed, 1)?;
    let rise = b.node(NodeType::Binary(Mul));
    let rise_ms = b.constant(config.vactrol_rise_ms);
    b.graph.connect(rise_ms, 0, rise, 0)?;
    b.graph.connect(transport, TRANSPORT_GATE, rise, 1)?;
    let fall = b.binary_const(Mul, closed, config.vactrol_fall_ms)?;
    let decay_ms = b.binary(Add, rise, fall)?;
    let decay = b.unary(UnaryOp::MsToSamples, decay_ms)?;
    let decay = b.binary_const(Max, decay, 1.0)?;
    let coef = b.unary(UnaryOp::T60, decay)?;
    let smoother = b.node(NodeType::OnePole);
    b.graph.connect(transport, TRANSPORT_GATE, smoother, 0)?;
    b.graph.connect(coef, 0, smoother, 1)?;

    // Mixdown.
    for (channel, plane) in [GRAIN_LEFT, GRAIN_RIGHT].into_iter().enumerate() {
        let mut sum = b.node(NodeType::Binary(Add));
        b.graph.connect(voices[0], plane.0, sum, 0)?;
        b.graph.connect(voices[1], plane.0, sum, 1)?;
        for &voice in &voices[2..] {
            let next = b.node(NodeType::Binary(Add));
            b.graph.connect(sum, 0, next, 0)?;
            b.graph.connect(voice, plane.0, next, 1)?;
            sum = next;
        }
        let gained = b.binary(Mul, sum, smoother)?;
        let mixed = b.binary_const(Div, gained, config.mix_divisor)?;
        b.single(NodeType::Output { channel }, mixed)?;
    }

    let graph = b.graph;
    assert_invariant(
        PATCH_COMPLETE,
        voices.iter().all(|&v| {
            graph.node_type(v).map_or(false, |t| {
                t.input_ports().iter().all(|p| graph.driver(v, p.id).is_some())
            })
        }),
        "every voice input is driven",
        Some("build_patch"),
    );

    log::debug!(
        "built patch: {} nodes, {} edges, {:?} trigger routing",
        graph.nodes.len(),
        graph.edges.len(),
        config.trigger_routing
    );

    Ok(Patch {
        graph,
        trigger,
        voices,
        smoother,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EvalMode, PortId};
    use crate::plan::Plan;

    #[test]
    fn patch_compiles() {
        let patch = build_patch(&EngineConfig::default()).unwrap();
        let plan = Plan::compile(&patch.graph).unwrap();
        assert_eq!(plan.order.len(), patch.graph.nodes.len());
        assert!(plan.steps.iter().any(|s| s.mode == EvalMode::Vector));
        assert!(plan.steps.iter().any(|s| s.mode == EvalMode::Scalar));
    }

    #[test]
    fn voices_run_in_index_order() {
        let patch = build_patch(&EngineConfig::default()).unwrap();
        let plan = Plan::compile(&patch.graph).unwrap();
        let positions: Vec<usize> = patch
            .voices
            .iter()
            .map(|&v| plan.position(v).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(plan.position(patch.trigger).unwrap() < positions[0]);
    }

    #[test]
    fn cascade_chains_through_planes() {
        let patch = build_patch(&EngineConfig::default()).unwrap();
        let edge = patch.graph.driver(patch.voices[3], PortId(1)).unwrap();
        assert_eq!(edge.from_node, patch.voices[2]);
        assert_eq!(edge.from_port, GRAIN_THROUGH);
        let first = patch.graph.driver(patch.voices[0], PortId(1)).unwrap();
        assert_eq!(first.from_node, patch.trigger);
    }

    #[test]
    fn broadcast_feeds_every_voice_directly() {
        let config = EngineConfig::default().with_trigger_routing(TriggerRouting::Broadcast);
        let patch = build_patch(&config).unwrap();
        for &voice in &patch.voices {
            let edge = patch.graph.driver(voice, PortId(1)).unwrap();
            assert_eq!(edge.from_node, patch.trigger);
        }
    }
}
