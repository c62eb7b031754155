use grainline::config::{EngineConfig, TriggerRouting};
use grainline::graph::NodeType;
use grainline::node::BinaryOp;
use grainline::patch::build_patch;
use grainline::plan::Plan;

#[test]
fn plan_determinism() {
    let config = EngineConfig::default();
    let plan1 = Plan::compile(&build_patch(&config).unwrap().graph).unwrap();
    let plan2 = Plan::compile(&build_patch(&config).unwrap().graph).unwrap();
    assert_eq!(plan1.order, plan2.order);
    assert_eq!(plan1.steps, plan2.steps);
    assert_eq!(plan1.edges, plan2.edges);
}

#[test]
fn routing_changes_only_trigger_edges() {
    let cascade = build_patch(&EngineConfig::default()).unwrap();
    let broadcast = build_patch(
        &EngineConfig::default().with_trigger_routing(TriggerRouting::Broadcast),
    )
    .unwrap();
    assert_eq!(cascade.graph.nodes.len(), broadcast.graph.nodes.len());
    assert_eq!(cascade.graph.edges.len(), broadcast.graph.edges.len());
    let differing = cascade
        .graph
        .edges
        .iter()
        .filter(|e| !broadcast.graph.edges.contains(e))
        .count();
    assert_eq!(differing, grainline::VOICE_COUNT - 1);
}

#[test]
fn plan_isolation() {
    let original = build_patch(&EngineConfig::default()).unwrap().graph;
    let plan_a = Plan::compile(&original).unwrap();

    // Mutate a copy
    let mut mutated = original.clone();
    let extra = mutated.add_node(NodeType::Binary(BinaryOp::Add));
    let one = mutated.add_node(NodeType::Const(1.0));
    mutated.connect(one, 0, extra, 0).unwrap();
    mutated.connect(one, 0, extra, 1).unwrap();
    let plan_b = Plan::compile(&mutated).unwrap();
    assert_eq!(plan_b.order.len(), plan_a.order.len() + 2);

    // Plan A remains unchanged
    let plan_a_check = Plan::compile(&original).unwrap();
    assert_eq!(plan_a.order, plan_a_check.order);
    assert_eq!(plan_a.edges, plan_a_check.edges);
}
